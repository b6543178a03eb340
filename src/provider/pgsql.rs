use super::DatabaseProvider;
use crate::config::DatabaseConfiguration;
use crate::db::statements::{maintenance_commands, purge_statement};
use crate::db::{ConnectionFactory, PgConnectionFactory};
use crate::error::ProviderError;
use crate::session::{MigrationCatalog, PROVIDER_ID, SchemaSession};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

enum ProviderState {
    Uninitialized,
    Ready(Ready),
    ShutDown,
}

struct Ready {
    session: Arc<SchemaSession>,
    factory: Arc<dyn ConnectionFactory>,
}

/// PostgreSQL implementation of [`DatabaseProvider`].
///
/// `initialize` and `shutdown` borrow the provider mutably, so no operation can be in
/// flight while either runs. Maintenance and purge only need `&self` and may overlap;
/// each checks out its own connection.
pub struct PgsqlProvider {
    migrations: MigrationCatalog,
    state: ProviderState,
}

impl PgsqlProvider {
    pub fn new(migrations: MigrationCatalog) -> Self {
        Self {
            migrations,
            state: ProviderState::Uninitialized,
        }
    }

    /// Provider that is already initialized against a caller-supplied connection source.
    /// No migrations are applied.
    pub fn with_factory(session: SchemaSession, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            migrations: MigrationCatalog::new(),
            state: ProviderState::Ready(Ready {
                session: Arc::new(session),
                factory,
            }),
        }
    }

    pub fn session(&self) -> Option<Arc<SchemaSession>> {
        match &self.state {
            ProviderState::Ready(ready) => Some(Arc::clone(&ready.session)),
            _ => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, ProviderState::Ready(_))
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(self.state, ProviderState::ShutDown)
    }

    fn ready(&self) -> Result<&Ready, ProviderError> {
        match &self.state {
            ProviderState::Ready(ready) => Ok(ready),
            ProviderState::Uninitialized => {
                Err(ProviderError::InvalidState("provider is not initialized"))
            }
            ProviderState::ShutDown => Err(ProviderError::InvalidState("provider has been shut down")),
        }
    }
}

/// Race `fut` against `cancel`; an already-cancelled token wins before `fut` is polled.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ProviderError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        out = fut => Ok(out),
    }
}

#[async_trait]
impl DatabaseProvider for PgsqlProvider {
    async fn initialize(&mut self, config: &DatabaseConfiguration) -> Result<(), ProviderError> {
        match self.state {
            ProviderState::Uninitialized => {}
            ProviderState::Ready(_) => {
                return Err(ProviderError::InvalidState("provider is already initialized"));
            }
            ProviderState::ShutDown => {
                return Err(ProviderError::InvalidState("provider has been shut down"));
            }
        }

        let session = SchemaSession::configure(config)?;
        let factory = PgConnectionFactory::new(session.connect_lazy()?, session.policy().retry);

        match self.migrations.for_provider(PROVIDER_ID) {
            Some(migrator) => {
                if let Err(e) = session.apply_migrations(factory.pool(), migrator).await {
                    factory.close_all().await;
                    return Err(e);
                }
            }
            None if self.migrations.is_empty() => {
                debug!(provider = PROVIDER_ID, "no migrations registered; schema left as is")
            }
            None => debug!(
                provider = PROVIDER_ID,
                "migrations registered only for other providers; schema left as is"
            ),
        }

        self.state = ProviderState::Ready(Ready {
            session: Arc::new(session),
            factory: Arc::new(factory),
        });
        Ok(())
    }

    async fn run_scheduled_maintenance(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let ready = match &self.state {
            ProviderState::Uninitialized => {
                debug!("no connection factory yet; skipping scheduled maintenance");
                return Ok(());
            }
            _ => self.ready()?,
        };

        let mut conn = cancellable(cancel, ready.factory.open())
            .await?
            .map_err(|e| ProviderError::maintenance("open connection", e))?;
        let database = cancellable(cancel, conn.database_name())
            .await?
            .map_err(|e| ProviderError::maintenance("resolve database name", e))?;

        for command in maintenance_commands(&database)? {
            let started = Instant::now();
            cancellable(cancel, conn.execute(&command))
                .await?
                .map_err(|e| ProviderError::maintenance(command.as_str(), e))?;
            info!(
                %command,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "maintenance command executed"
            );
        }
        Ok(())
    }

    async fn purge_tables(
        &self,
        tables: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let ready = self.ready()?;
        let Some(statement) = purge_statement(tables)? else {
            debug!("purge requested for an empty table list; nothing to do");
            return Ok(());
        };

        let mut conn = cancellable(cancel, ready.factory.open())
            .await?
            .map_err(ProviderError::Purge)?;
        cancellable(cancel, conn.execute(&statement))
            .await?
            .map_err(ProviderError::Purge)?;

        info!(tables = tables.len(), "tables purged");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ProviderError> {
        match std::mem::replace(&mut self.state, ProviderState::ShutDown) {
            ProviderState::Ready(ready) => {
                ready.factory.close_all().await;
                info!("PostgreSQL provider shut down; connection pool released");
            }
            ProviderState::Uninitialized | ProviderState::ShutDown => {
                debug!("shutdown requested with no open pool");
            }
        }
        Ok(())
    }

    async fn backup(&self) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported("backup"))
    }

    async fn restore_backup(&self, _key: &str) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported("restoring a backup"))
    }

    async fn delete_backup(&self, _key: &str) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported("deleting a backup"))
    }
}
