pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod provider;
pub mod session;

pub use config::{DatabaseConfiguration, OptionEntry};
pub use connection::ConnectionDescriptor;
pub use error::ProviderError;
pub use provider::{DatabaseProvider, PgsqlProvider};
pub use session::{MigrationCatalog, PROVIDER_ID, SchemaSession};
