use sqlx::Error as SqlxError;
use sqlx::migrate::MigrateError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ProviderError {
    #[error("invalid database configuration: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("maintenance step `{step}` failed: {source}")]
    Maintenance {
        step: String,
        #[source]
        source: SqlxError,
    },

    #[error("failed to purge tables: {0}")]
    Purge(#[source] SqlxError),

    #[error(
        "{0} is not supported by the PostgreSQL provider; use external tooling such as pg_dump/pg_restore instead"
    )]
    Unsupported(&'static str),

    #[error("failed to apply migrations: {0}")]
    Migration(#[from] MigrateError),

    #[error("database error: {0}")]
    Database(#[from] SqlxError),

    #[error("failed to load configuration: {0}")]
    ConfigLoad(#[from] figment::Error),

    #[error("invalid provider state: {0}")]
    InvalidState(&'static str),

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        ProviderError::Configuration(message.into())
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        ProviderError::Argument(message.into())
    }

    pub(crate) fn maintenance(step: impl Into<String>, source: SqlxError) -> Self {
        ProviderError::Maintenance {
            step: step.into(),
            source,
        }
    }
}

/// Errors that may succeed when the same call is issued again.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;

    /// The connection that produced the error is unusable; a retry needs a fresh one.
    fn is_connection_lost(&self) -> bool;
}

impl IsRetryable for SqlxError {
    fn is_retryable(&self) -> bool {
        match self {
            SqlxError::Io(_) | SqlxError::PoolTimedOut => true,
            SqlxError::Database(db) => db.code().is_some_and(|code| is_transient_sqlstate(&code)),
            _ => false,
        }
    }

    fn is_connection_lost(&self) -> bool {
        match self {
            SqlxError::Io(_) => true,
            SqlxError::Database(db) => db
                .code()
                .is_some_and(|code| is_lost_connection_sqlstate(&code)),
            _ => false,
        }
    }
}

/// Connection exceptions, resource exhaustion, serialization failures, deadlocks and
/// server restarts are worth retrying; everything else is a real failure.
fn is_transient_sqlstate(code: &str) -> bool {
    matches!(code.get(..2), Some("08" | "53" | "58"))
        || matches!(
            code,
            "40001" | "40P01" | "55P03" | "55006" | "57P01" | "57P02" | "57P03"
        )
}

/// Connection exceptions and administrator/crash shutdowns leave the session dead.
fn is_lost_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}
