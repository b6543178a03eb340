//! The capability set a host expects from a database backend.

pub mod pgsql;

pub use pgsql::PgsqlProvider;

use crate::config::DatabaseConfiguration;
use crate::error::ProviderError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Resolve the configuration, open the pool and bring the schema up to date.
    async fn initialize(&mut self, config: &DatabaseConfiguration) -> Result<(), ProviderError>;

    /// Periodic housekeeping requested by the host scheduler.
    async fn run_scheduled_maintenance(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// Remove every row from the given tables and reset their identity sequences.
    async fn purge_tables(
        &self,
        tables: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// Release all pooled connections.
    async fn shutdown(&mut self) -> Result<(), ProviderError>;

    /// Take a fast backup before migrating; returns the backup key.
    async fn backup(&self) -> Result<String, ProviderError>;

    async fn restore_backup(&self, key: &str) -> Result<(), ProviderError>;

    async fn delete_backup(&self, key: &str) -> Result<(), ProviderError>;
}
