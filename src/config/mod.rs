//! Provider configuration: the raw connection string plus the option entries.
//!
//! Loaded from a TOML file with `figment`; `PGSQL_CONNECTION_STRING` in the environment
//! replaces the file's connection string.

pub mod options;

pub use options::{OptionEntry, ProviderOptions};

use crate::connection::ConnectionDescriptor;
use crate::error::ProviderError;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const ENV_PREFIX: &str = "PGSQL_";

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfiguration {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl DatabaseConfiguration {
    pub fn new(connection_string: impl Into<String>, options: Vec<OptionEntry>) -> Self {
        Self {
            connection_string: connection_string.into(),
            options,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        Self::figment(path.as_ref())
            .extract()
            .map_err(ProviderError::from)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).only(&["connection_string"]))
    }

    pub fn options(&self) -> ProviderOptions<'_> {
        ProviderOptions::new(&self.options)
    }
}

impl fmt::Debug for DatabaseConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The password must never reach a log line through `{:?}`.
        let connection_string =
            match ConnectionDescriptor::build(&self.connection_string, &ProviderOptions::new(&[]))
            {
                Ok(descriptor) => descriptor.redacted().to_connection_string(),
                Err(_) => "[REDACTED]".to_string(),
            };
        f.debug_struct("DatabaseConfiguration")
            .field("connection_string", &connection_string)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn loads_connection_string_and_options_from_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "database.toml",
                r#"
                connection_string = "Host=db;Database=jf;Username=u;Password=p"

                [[options]]
                key = "command-timeout"
                value = "60"

                [[options]]
                key = "builder:SearchPath"
                value = "public"
                "#,
            )?;
            let cfg = DatabaseConfiguration::load("database.toml").expect("load config");
            assert_eq!(cfg.connection_string, "Host=db;Database=jf;Username=u;Password=p");
            assert_eq!(cfg.options.len(), 2);
            assert_eq!(cfg.options().get("COMMAND-TIMEOUT"), Some("60"));
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_connection_string() {
        Jail::expect_with(|jail| {
            jail.create_file("database.toml", r#"connection_string = "Host=file""#)?;
            jail.set_env("PGSQL_CONNECTION_STRING", "Host=env;Database=jf");
            let cfg = DatabaseConfiguration::load("database.toml").expect("load config");
            assert_eq!(cfg.connection_string, "Host=env;Database=jf");
            assert!(cfg.options.is_empty());
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        Jail::expect_with(|jail| {
            jail.create_file("database.toml", "options = 3")?;
            let err = DatabaseConfiguration::load("database.toml").unwrap_err();
            assert!(matches!(err, ProviderError::ConfigLoad(_)));
            Ok(())
        });
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = DatabaseConfiguration::new(
            "Host=db;Database=jf;Username=u;Password=super_secret_password_123",
            Vec::new(),
        );
        let debug_output = format!("{cfg:?}");
        assert!(debug_output.contains("Password=***"));
        assert!(!debug_output.contains("super_secret_password_123"));

        let broken = DatabaseConfiguration::new("Password=hunter2;garbage", Vec::new());
        let debug_output = format!("{broken:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }
}
