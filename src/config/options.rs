use crate::error::ProviderError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SCHEMA: &str = "default-schema";
pub const COMMAND_TIMEOUT: &str = "command-timeout";
pub const ENABLE_RETRY_ON_FAILURE: &str = "enable-retry-on-failure";
pub const RETRY_COUNT: &str = "retry-count";
pub const RETRY_DELAY_SECONDS: &str = "retry-delay-seconds";
pub const ENABLE_SENSITIVE_DATA_LOGGING: &str = "EnableSensitiveDataLogging";
/// Prefix of options that override a raw connection-string keyword.
pub const BUILDER_PREFIX: &str = "builder:";

/// One externally supplied configuration knob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub key: String,
    pub value: String,
}

impl OptionEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Typed, read-only view over the option entries.
///
/// Keys are compared case-insensitively and the first matching entry wins.
#[derive(Debug, Clone, Copy)]
pub struct ProviderOptions<'a> {
    entries: &'a [OptionEntry],
}

impl<'a> ProviderOptions<'a> {
    pub fn new(entries: &'a [OptionEntry]) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }

    /// Unsigned integer option; absent yields `None`, garbage is a configuration error.
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, ProviderError> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<u32>().map_err(|_| {
                    ProviderError::configuration(format!(
                        "option `{key}` must be a non-negative integer, got `{raw}`"
                    ))
                })
            })
            .transpose()
    }

    /// Permissive boolean: `true`, `1` or `yes` in any case. Everything else is false.
    pub fn get_flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    /// `(keyword, value)` pairs of every `builder:` override, in entry order.
    pub fn builder_overrides(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let entries = self.entries;
        entries.iter().filter_map(|entry| {
            let prefix = entry.key.get(..BUILDER_PREFIX.len())?;
            prefix
                .eq_ignore_ascii_case(BUILDER_PREFIX)
                .then(|| (&entry.key[BUILDER_PREFIX.len()..], entry.value.as_str()))
        })
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    ["true", "1", "yes"]
        .iter()
        .any(|accepted| value.eq_ignore_ascii_case(accepted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<OptionEntry> {
        pairs.iter().map(|(k, v)| OptionEntry::new(*k, *v)).collect()
    }

    #[test]
    fn lookup_is_case_insensitive_and_first_match_wins() {
        let list = entries(&[("Command-Timeout", "30"), ("command-timeout", "90")]);
        let opts = ProviderOptions::new(&list);
        assert_eq!(opts.get(COMMAND_TIMEOUT), Some("30"));
        assert_eq!(opts.get("missing"), None);
    }

    #[test]
    fn integers_report_key_and_value() {
        let list = entries(&[("command-timeout", "abc"), ("retry-count", " 7 ")]);
        let opts = ProviderOptions::new(&list);
        assert_eq!(opts.get_u32(RETRY_COUNT).unwrap(), Some(7));
        assert_eq!(opts.get_u32("absent").unwrap(), None);

        let err = opts.get_u32(COMMAND_TIMEOUT).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        let msg = err.to_string();
        assert!(msg.contains("command-timeout"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn permissive_flags() {
        for value in ["true", "TRUE", "1", "yes", "Yes", " true "] {
            let list = entries(&[("flag", value)]);
            assert!(ProviderOptions::new(&list).get_flag("flag"), "{value:?}");
        }
        for value in ["false", "0", "no", "on", "y", ""] {
            let list = entries(&[("flag", value)]);
            assert!(!ProviderOptions::new(&list).get_flag("flag"), "{value:?}");
        }
        assert!(!ProviderOptions::new(&[]).get_flag("flag"));
    }

    #[test]
    fn builder_overrides_strip_prefix_in_order() {
        let list = entries(&[
            ("BUILDER:SearchPath", "public"),
            ("command-timeout", "60"),
            ("builder:Host", "replica"),
            ("builder", "ignored"),
        ]);
        let overrides: Vec<_> = ProviderOptions::new(&list).builder_overrides().collect();
        assert_eq!(overrides, vec![("SearchPath", "public"), ("Host", "replica")]);
    }
}
