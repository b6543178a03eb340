//! Schema session: connection descriptor, resiliency policy and migration settings
//! resolved from the provider configuration.

pub mod migrations;
pub mod resiliency;

pub use migrations::MigrationCatalog;
pub use resiliency::{ResiliencyPolicy, RetryPolicy};

use crate::config::DatabaseConfiguration;
use crate::config::options::{DEFAULT_SCHEMA, ENABLE_SENSITIVE_DATA_LOGGING};
use crate::connection::{ConnectionDescriptor, Keyword};
use crate::db::{PgPool, quote_identifier};
use crate::error::ProviderError;
use log::LevelFilter;
use sqlx::ConnectOptions;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Identifier under which this provider's migrations are registered.
pub const PROVIDER_ID: &str = "pgsql";

/// Schema used for migration bookkeeping when `default-schema` is not set.
pub const BACKEND_DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone)]
pub struct SchemaSession {
    descriptor: ConnectionDescriptor,
    policy: ResiliencyPolicy,
    history_schema: Option<String>,
    sensitive_data_logging: bool,
}

impl SchemaSession {
    /// Resolve the configuration into a session. Nothing touches the network.
    pub fn configure(config: &DatabaseConfiguration) -> Result<Self, ProviderError> {
        let options = config.options();
        let descriptor = ConnectionDescriptor::build(&config.connection_string, &options)?;
        let policy = ResiliencyPolicy::resolve(&options)?;

        let history_schema = options
            .get(DEFAULT_SCHEMA)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let sensitive_data_logging = options.get_flag(ENABLE_SENSITIVE_DATA_LOGGING);
        if sensitive_data_logging {
            warn!(
                "EnableSensitiveDataLogging is set: SQL statements will be written to the log. \
                 This is unsafe for production use."
            );
        }

        let session = Self {
            descriptor,
            policy,
            history_schema,
            sensitive_data_logging,
        };
        session.validate()?;

        let redacted = session.descriptor.redacted();
        info!(
            host = redacted.host().unwrap_or("<default>"),
            database = redacted.database().unwrap_or("<default>"),
            username = redacted.username().unwrap_or("<default>"),
            "PostgreSQL provider configured"
        );

        Ok(session)
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn policy(&self) -> &ResiliencyPolicy {
        &self.policy
    }

    pub fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    /// Schema holding the migration history table.
    pub fn history_schema(&self) -> &str {
        self.history_schema
            .as_deref()
            .unwrap_or(BACKEND_DEFAULT_SCHEMA)
    }

    pub fn sensitive_data_logging(&self) -> bool {
        self.sensitive_data_logging
    }

    /// Statement timeout in seconds: the `command-timeout` option wins over the
    /// `Command Timeout` keyword.
    pub fn statement_timeout(&self) -> Result<Option<u32>, ProviderError> {
        match self.policy.command_timeout {
            Some(secs) => Ok(Some(secs)),
            None => self.typed_keyword(Keyword::CommandTimeout),
        }
    }

    /// Schema search path for every connection. With a history schema configured it
    /// leads the path, so migrated objects resolve through the pool as well; the
    /// `Search Path` keyword (or `public`) follows.
    pub fn search_path(&self) -> Result<Option<String>, ProviderError> {
        let mut schemas: Vec<String> = self
            .descriptor
            .get(Keyword::SearchPath)
            .map(|path| {
                path.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(schema) = self.history_schema.as_deref() {
            let quoted = quote_identifier(schema)?;
            if schemas.is_empty() {
                schemas.push(BACKEND_DEFAULT_SCHEMA.to_string());
            }
            schemas.retain(|s| *s != quoted && s != schema);
            schemas.insert(0, quoted);
        }

        Ok((!schemas.is_empty()).then(|| schemas.join(",")))
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, ProviderError> {
        let mut opts = PgConnectOptions::new_without_pgpass();
        let mut server_settings: Vec<(&str, String)> = Vec::new();

        for (keyword, value) in self.descriptor.keywords() {
            opts = match keyword {
                Keyword::Host => opts.host(value),
                Keyword::Port => opts.port(parse_keyword(keyword, value)?),
                Keyword::Database => opts.database(value),
                Keyword::Username => opts.username(value),
                Keyword::Password => opts.password(value),
                Keyword::SslMode => opts.ssl_mode(parse_ssl_mode(value)?),
                Keyword::ApplicationName => opts.application_name(value),
                _ => opts,
            };
        }

        if let Some(path) = self.search_path()? {
            server_settings.push(("search_path", path));
        }
        if let Some(secs) = self.statement_timeout()? {
            server_settings.push(("statement_timeout", format!("{secs}s")));
        }
        if !server_settings.is_empty() {
            opts = opts.options(
                server_settings
                    .into_iter()
                    .map(|(name, value)| (name, startup_value(&value))),
            );
        }

        if self.sensitive_data_logging {
            opts = opts
                .log_statements(LevelFilter::Info)
                .log_slow_statements(LevelFilter::Warn, Duration::from_secs(1));
        }
        Ok(opts)
    }

    pub fn pool_options(&self) -> Result<PgPoolOptions, ProviderError> {
        let mut pool = PgPoolOptions::new();
        if let Some(max) = self.typed_keyword::<u32>(Keyword::MaxPoolSize)? {
            pool = pool.max_connections(max);
        }
        if let Some(min) = self.typed_keyword::<u32>(Keyword::MinPoolSize)? {
            pool = pool.min_connections(min);
        }
        if let Some(secs) = self.typed_keyword::<u64>(Keyword::Timeout)? {
            pool = pool.acquire_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.typed_keyword::<u64>(Keyword::ConnectionIdleLifetime)? {
            pool = pool.idle_timeout(Duration::from_secs(secs));
        }
        Ok(pool)
    }

    /// Pool that connects on first use.
    pub fn connect_lazy(&self) -> Result<PgPool, ProviderError> {
        Ok(self.pool_options()?.connect_lazy_with(self.connect_options()?))
    }

    /// Run `migrator` with its history table in [`history_schema`](Self::history_schema).
    pub async fn apply_migrations(
        &self,
        pool: &PgPool,
        migrator: &Migrator,
    ) -> Result<(), ProviderError> {
        match self.history_schema.as_deref() {
            None => migrator.run(pool).await?,
            Some(schema) => {
                let pool = self.migration_pool(schema)?;
                let applied = migrator.run(&pool).await;
                pool.close().await;
                applied?;
            }
        }
        info!(
            provider = PROVIDER_ID,
            schema = self.history_schema(),
            migrations = migrator.iter().count(),
            "migrations applied"
        );
        Ok(())
    }

    /// Single-connection pool that creates `schema` and pins the search path before the
    /// migrator takes its lock.
    fn migration_pool(&self, schema: &str) -> Result<PgPool, ProviderError> {
        let mut setup = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema)?);
        if let Some(path) = self.search_path()? {
            setup.push_str(&format!("; SET search_path TO {path}"));
        }

        let pool = self
            .pool_options()?
            .max_connections(1)
            .min_connections(0)
            .after_connect(move |conn, _meta| {
                let setup = setup.clone();
                Box::pin(async move {
                    sqlx::Executor::execute(conn, setup.as_str()).await?;
                    Ok(())
                })
            })
            .connect_lazy_with(self.connect_options()?);
        Ok(pool)
    }

    fn typed_keyword<T: FromStr>(&self, keyword: Keyword) -> Result<Option<T>, ProviderError> {
        self.descriptor
            .get(keyword)
            .map(|value| parse_keyword(keyword, value))
            .transpose()
    }

    /// Surface every bad keyword value now instead of at first connect.
    fn validate(&self) -> Result<(), ProviderError> {
        self.connect_options()?;
        self.pool_options()?;
        for (keyword, _) in self.descriptor.keywords() {
            if matches!(
                keyword,
                Keyword::Pooling
                    | Keyword::IncludeErrorDetail
                    | Keyword::TrustServerCertificate
                    | Keyword::Keepalive
            ) {
                warn!(%keyword, "connection keyword has no effect with this driver; ignoring");
            }
        }
        Ok(())
    }
}

fn parse_keyword<T: FromStr>(keyword: Keyword, value: &str) -> Result<T, ProviderError> {
    value.trim().parse().map_err(|_| invalid_keyword(keyword, value))
}

fn parse_ssl_mode(value: &str) -> Result<PgSslMode, ProviderError> {
    let normalized: String = value
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    match normalized.as_str() {
        "disable" => Ok(PgSslMode::Disable),
        "allow" => Ok(PgSslMode::Allow),
        "prefer" => Ok(PgSslMode::Prefer),
        "require" => Ok(PgSslMode::Require),
        "verifyca" => Ok(PgSslMode::VerifyCa),
        "verifyfull" => Ok(PgSslMode::VerifyFull),
        _ => Err(invalid_keyword(Keyword::SslMode, value)),
    }
}

/// Backslash-escape whitespace and backslashes for the startup `options` packet.
fn startup_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_whitespace() || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn invalid_keyword(keyword: Keyword, value: impl Display) -> ProviderError {
    ProviderError::configuration(format!(
        "connection keyword `{keyword}` has invalid value `{value}`"
    ))
}
