use crate::config::ProviderOptions;
use crate::config::options::{
    COMMAND_TIMEOUT, ENABLE_RETRY_ON_FAILURE, RETRY_COUNT, RETRY_DELAY_SECONDS,
};
use crate::error::ProviderError;
use backon::ExponentialBuilder;
use std::time::Duration;

pub const DEFAULT_RETRY_COUNT: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECONDS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub count: u32,
    pub delay_seconds: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            count: DEFAULT_RETRY_COUNT,
            delay_seconds: DEFAULT_RETRY_DELAY_SECONDS,
        }
    }
}

impl RetryPolicy {
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds.into())
    }

    /// Backoff schedule: at most `count` retries, each delay capped at `delay_seconds`.
    pub fn backoff(&self) -> ExponentialBuilder {
        let max_delay = self.max_delay();
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(1).min(max_delay))
            .with_max_delay(max_delay)
            .with_max_times(self.count as usize)
            .with_jitter()
    }
}

/// Timeout and retry settings applied to every statement issued through the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResiliencyPolicy {
    /// Seconds; `None` keeps the driver default.
    pub command_timeout: Option<u32>,
    /// `None` when retries are disabled.
    pub retry: Option<RetryPolicy>,
}

impl ResiliencyPolicy {
    pub fn resolve(options: &ProviderOptions<'_>) -> Result<Self, ProviderError> {
        let command_timeout = options.get_u32(COMMAND_TIMEOUT)?;

        let retry = if options.get_flag(ENABLE_RETRY_ON_FAILURE) {
            Some(RetryPolicy {
                count: options
                    .get_u32(RETRY_COUNT)?
                    .unwrap_or(DEFAULT_RETRY_COUNT),
                delay_seconds: options
                    .get_u32(RETRY_DELAY_SECONDS)?
                    .unwrap_or(DEFAULT_RETRY_DELAY_SECONDS),
            })
        } else {
            None
        };

        Ok(Self {
            command_timeout,
            retry,
        })
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry.is_some()
    }
}
