use super::{ConnectionFactory, ProviderConnection};
use crate::error::IsRetryable;
use crate::session::RetryPolicy;
use async_trait::async_trait;
use backon::{BackoffBuilder, Retryable};
use sqlx::pool::PoolConnection;
use sqlx::{Error as SqlxError, Pool, Postgres};
use tracing::{debug, warn};

pub type PgPool = Pool<Postgres>;

/// Pool-backed connection source. The retry policy, when present, is applied here and
/// only here: to checking out a connection and to each statement. A statement that
/// loses its connection is retried on a freshly acquired one.
#[derive(Clone)]
pub struct PgConnectionFactory {
    pool: PgPool,
    retry: Option<RetryPolicy>,
}

impl PgConnectionFactory {
    pub fn new(pool: PgPool, retry: Option<RetryPolicy>) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, SqlxError> {
        let Some(retry) = self.retry else {
            return self.pool.acquire().await;
        };
        (|| self.pool.acquire())
            .retry(retry.backoff())
            .when(|e: &SqlxError| e.is_retryable())
            .notify(|e: &SqlxError, delay| {
                warn!(error = %e, ?delay, "acquiring a PostgreSQL connection failed; retrying");
            })
            .await
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn open(&self) -> Result<Box<dyn ProviderConnection>, SqlxError> {
        let conn = self.acquire().await?;
        Ok(Box::new(PgProviderConnection {
            factory: self.clone(),
            conn: Some(conn),
        }))
    }

    async fn close_all(&self) {
        if self.pool.is_closed() {
            return;
        }
        debug!(
            size = self.pool.size(),
            idle = self.pool.num_idle(),
            "closing PostgreSQL pool"
        );
        self.pool.close().await;
    }
}

/// Checked-out connection. `conn` is `None` only between dropping a lost connection and
/// acquiring its replacement.
struct PgProviderConnection {
    factory: PgConnectionFactory,
    conn: Option<PoolConnection<Postgres>>,
}

impl PgProviderConnection {
    async fn live(&mut self) -> Result<&mut PoolConnection<Postgres>, SqlxError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.factory.acquire().await?,
        };
        Ok(self.conn.insert(conn))
    }

    /// Detached so the pool never hands the dead session out again.
    fn discard(&mut self) {
        if let Some(dead) = self.conn.take() {
            drop(dead.detach());
            debug!("discarded a lost PostgreSQL connection");
        }
    }
}

#[async_trait]
impl ProviderConnection for PgProviderConnection {
    async fn database_name(&mut self) -> Result<String, SqlxError> {
        let conn = self.live().await?;
        sqlx::query_scalar::<_, String>("SELECT current_database()::text")
            .fetch_one(&mut **conn)
            .await
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, SqlxError> {
        let mut backoff = self.factory.retry.map(|r| r.backoff().build());
        loop {
            let conn = self.live().await?;
            let err = match sqlx::Executor::execute(&mut **conn, sql).await {
                Ok(done) => return Ok(done.rows_affected()),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };
            let Some(delay) = backoff.as_mut().and_then(Iterator::next) else {
                return Err(err);
            };
            // A lost session is replaced; conflicts are retried on the same one.
            if err.is_connection_lost() {
                self.discard();
            }
            warn!(error = %err, ?delay, "statement failed with a transient error; retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
