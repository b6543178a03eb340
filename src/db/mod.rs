//! Database access used by the lifecycle operations.
//!
//! Layout:
//! - `identifier.rs`: quoting of dynamic identifiers
//! - `statements.rs`: maintenance and purge SQL text
//! - `postgres.rs`: `ConnectionFactory` backed by a sqlx `PgPool`

pub mod identifier;
pub mod postgres;
pub mod statements;

pub use identifier::quote_identifier;
pub use postgres::{PgConnectionFactory, PgPool};

use async_trait::async_trait;
use sqlx::Error as SqlxError;

/// Source of live connections for one provider.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Check out a connection. Dropping it hands it back.
    async fn open(&self) -> Result<Box<dyn ProviderConnection>, SqlxError>;

    /// Release every pooled connection. Calling it again is a no-op.
    async fn close_all(&self);
}

#[async_trait]
pub trait ProviderConnection: Send {
    /// Name of the database this connection is attached to.
    async fn database_name(&mut self) -> Result<String, SqlxError>;

    /// Run raw SQL outside of any transaction; returns the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64, SqlxError>;
}
