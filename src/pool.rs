//! Thin `deadpool` integration: the pool evicts connections that reported
//! [`TableSqlError::BadConnection`] and resets the rest before reuse.

use std::sync::Arc;

use deadpool::managed::{self, Metrics, Object, PoolError, RecycleError, RecycleResult};
use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::conn::Connection;
use crate::connector::Connector;
use crate::context::ExecContext;
use crate::error::TableSqlError;
use crate::retry::{AttemptState, wait};
use crate::tx::TxOptions;

#[derive(Debug, Clone)]
pub struct ConnectionManager {
    connector: Arc<Connector>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(connector: Arc<Connector>) -> Self {
        Self { connector }
    }

    #[must_use]
    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }
}

impl managed::Manager for ConnectionManager {
    type Type = Connection;
    type Error = TableSqlError;

    async fn create(&self) -> Result<Connection, TableSqlError> {
        self.connector.connect(&ExecContext::default()).await
    }

    async fn recycle(&self, conn: &mut Connection, _metrics: &Metrics) -> RecycleResult<TableSqlError> {
        if conn.is_bad() {
            debug!(session_id = conn.session_id(), "evicting bad connection");
            return Err(RecycleError::Backend(TableSqlError::BadConnection));
        }
        conn.reset_session(&ExecContext::default())
            .await
            .map_err(RecycleError::Backend)
    }
}

pub type ConnectionPool = managed::Pool<ConnectionManager>;
pub type PooledConnection = Object<ConnectionManager>;

impl Connector {
    /// Pool of connections from this connector.
    ///
    /// # Errors
    ///
    /// Returns [`TableSqlError::PoolError`] if the pool cannot be built.
    pub fn pool(self: &Arc<Self>, max_size: usize) -> Result<ConnectionPool, TableSqlError> {
        managed::Pool::builder(ConnectionManager::new(Arc::clone(self)))
            .max_size(max_size)
            .build()
            .map_err(|e| TableSqlError::PoolError(format!("failed to build pool: {e}")))
    }
}

fn from_pool_error(err: PoolError<TableSqlError>) -> TableSqlError {
    match err {
        PoolError::Backend(err) => err,
        other => TableSqlError::PoolError(other.to_string()),
    }
}

/// # Errors
///
/// The connector's failure when a new connection had to be created, otherwise
/// [`TableSqlError::PoolError`].
pub async fn get_connection(pool: &ConnectionPool) -> Result<PooledConnection, TableSqlError> {
    pool.get().await.map_err(from_pool_error)
}

async fn attempt<R, F>(
    pool: &ConnectionPool,
    ctx: &ExecContext,
    opts: TxOptions,
    f: &mut F,
) -> Result<R, TableSqlError>
where
    F: for<'c> FnMut(&'c mut Connection) -> BoxFuture<'c, Result<R, TableSqlError>>,
{
    let mut conn = get_connection(pool).await?;
    conn.begin_tx(ctx, opts).await?;
    match f(&mut *conn).await {
        Ok(value) => {
            conn.commit_tx(ctx).await?;
            Ok(value)
        }
        Err(err) => {
            if conn.in_transaction()
                && let Err(rollback_err) = conn.rollback_tx(ctx).await
            {
                warn!(error = %rollback_err, "rollback after failed transaction body");
            }
            Err(err)
        }
    }
}

/// Run `f` inside a fresh transaction, re-running the whole transaction on retryable
/// failures.
///
/// Each attempt takes a pooled connection, begins a transaction with `opts`, runs `f` and
/// commits. `f` receives the connection with the transaction open; statements it issues run
/// inside that transaction. Ambiguous failures are retried only when `ctx` is idempotent.
///
/// ```rust,no_run
/// use table_sql_middleware::prelude::*;
///
/// # async fn demo(pool: ConnectionPool) -> Result<(), TableSqlError> {
/// let ctx = ExecContext::default();
/// do_tx(&pool, &ctx, TxOptions::default(), |conn| {
///     Box::pin(async move {
///         conn.exec(&ExecContext::default(), "UPDATE t SET v = v + 1 WHERE id = $id",
///             &[NamedArg::named("id", 1_u64)]).await?;
///         Ok(())
///     })
/// })
/// .await?;
/// # Ok(()) }
/// ```
///
/// # Errors
///
/// [`TableSqlError::Cancelled`], [`TableSqlError::BadConnection`], or the last non-retryable
/// error from begin, `f` or commit.
pub async fn do_tx<R, F>(
    pool: &ConnectionPool,
    ctx: &ExecContext,
    opts: TxOptions,
    mut f: F,
) -> Result<R, TableSqlError>
where
    F: for<'c> FnMut(&'c mut Connection) -> BoxFuture<'c, Result<R, TableSqlError>>,
{
    let policy = pool.manager().connector().options().retry.clone();
    let mut state = AttemptState::default();
    loop {
        let outcome = tokio::select! {
            biased;
            () = ctx.cancellation().cancelled() => return Err(TableSqlError::Cancelled),
            res = attempt(pool, ctx, opts, &mut f) => res,
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                let delay = state.on_failure(err, ctx.idempotent(), &policy)?;
                wait(ctx, delay).await?;
            }
        }
    }
}
