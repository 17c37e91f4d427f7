use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::backend::{DataQueryOption, ScanQueryOption, Session, TxControl};
use crate::conn::Statement;
use crate::context::ExecContext;
use crate::error::TableSqlError;
use crate::mode::{QueryMode, classify};
use crate::params::{NamedArg, check_named_value, to_query_parameters, to_scheme_options};
use crate::results::ExecResult;
use crate::retry::{RetryPolicy, retry};
use crate::rows::{BufferedRows, Rows, SingleRow, StreamRows};
use crate::tx::{Transaction, TxKind, TxOptions};

/// Per-connection defaults inherited from the connector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionDefaults {
    pub tx_control: TxControl,
    pub data_options: Vec<DataQueryOption>,
    pub scan_options: Vec<ScanQueryOption>,
}

/// One backend session plus at most one open transaction.
///
/// Calls take `&mut self`; a connection serves one caller at a time.
pub struct Connection {
    session: Box<dyn Session>,
    tx: Option<Transaction>,
    defaults: ConnectionDefaults,
    retry: RetryPolicy,
    /// Shared with statements prepared on this session.
    bad: Arc<AtomicBool>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.session.id())
            .field("tx", &self.tx)
            .field("bad", &self.is_bad())
            .finish_non_exhaustive()
    }
}

impl Connection {
    #[must_use]
    pub fn new(session: Box<dyn Session>, defaults: ConnectionDefaults, retry: RetryPolicy) -> Self {
        Self {
            session,
            tx: None,
            defaults,
            retry,
            bad: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    #[must_use]
    pub fn defaults(&self) -> &ConnectionDefaults {
        &self.defaults
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    #[must_use]
    pub fn transaction_kind(&self) -> Option<TxKind> {
        self.tx.as_ref().and_then(Transaction::kind)
    }

    /// Server-side id of the open read-write transaction.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        self.tx.as_ref().and_then(Transaction::id)
    }

    /// Set once any call reported [`TableSqlError::BadConnection`]; the pool discards it.
    #[must_use]
    pub fn is_bad(&self) -> bool {
        self.bad.load(Ordering::Acquire)
    }

    fn track<T>(&mut self, res: Result<T, TableSqlError>) -> Result<T, TableSqlError> {
        if let Err(TableSqlError::BadConnection) = &res
            && !self.bad.swap(true, Ordering::AcqRel)
        {
            warn!(session_id = self.session.id(), "connection marked bad");
        }
        res
    }

    /// # Errors
    ///
    /// See [`check_named_value`].
    pub fn check_named_value(&self, arg: &mut NamedArg) -> Result<(), TableSqlError> {
        check_named_value(arg)
    }

    /// Begin a transaction. Read-only committed levels open nothing on the backend.
    ///
    /// # Errors
    ///
    /// [`TableSqlError::ActiveTransaction`] if one is already open (no backend call is made),
    /// [`TableSqlError::UnsupportedIsolation`], or a mapped backend failure.
    pub async fn begin_tx(
        &mut self,
        ctx: &ExecContext,
        opts: TxOptions,
    ) -> Result<TxHandle<'_>, TableSqlError> {
        if self.tx.is_some() {
            return Err(TableSqlError::ActiveTransaction);
        }
        let res = Transaction::begin(self.session.as_ref(), ctx, opts).await;
        let tx = self.track(res)?;
        self.tx = Some(tx);
        Ok(TxHandle { conn: self })
    }

    /// Commit the open transaction and free the slot. A failed commit keeps it.
    ///
    /// # Errors
    ///
    /// [`TableSqlError::NoActiveTransaction`] or a mapped backend failure.
    pub async fn commit_tx(&mut self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        let res = match self.tx.as_mut() {
            Some(tx) => tx.commit(ctx).await,
            None => return Err(TableSqlError::NoActiveTransaction),
        };
        self.track(res)?;
        self.tx = None;
        Ok(())
    }

    /// # Errors
    ///
    /// [`TableSqlError::NoActiveTransaction`] or a mapped backend failure.
    pub async fn rollback_tx(&mut self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        let res = match self.tx.as_mut() {
            Some(tx) => tx.rollback(ctx).await,
            None => return Err(TableSqlError::NoActiveTransaction),
        };
        self.track(res)?;
        self.tx = None;
        Ok(())
    }

    /// Execute without returning rows.
    ///
    /// Inside a transaction the statement runs there; otherwise Data and Scheme modes are
    /// accepted and run under the retry engine.
    ///
    /// # Errors
    ///
    /// Parameter or mode errors before any backend call, [`TableSqlError::Cancelled`], or the
    /// mapped backend failure.
    pub async fn exec(
        &mut self,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
    ) -> Result<ExecResult, TableSqlError> {
        let res = self.exec_inner(ctx, query, args).await;
        self.track(res)
    }

    async fn exec_inner(
        &self,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
    ) -> Result<ExecResult, TableSqlError> {
        let data_options = ctx.data_options_over(&self.defaults.data_options);
        if let Some(tx) = &self.tx {
            return tx.exec(ctx, query, args, &data_options).await;
        }
        let session = self.session.as_ref();
        match classify(query, ctx.mode()) {
            QueryMode::Data => {
                let params = to_query_parameters(args)?;
                let tx_control = ctx.tx_control_or(&self.defaults.tx_control);
                let (params, data_options) = (&params, &data_options);
                retry(ctx, ctx.idempotent(), &self.retry, move || async move {
                    session
                        .execute(tx_control, query, params, data_options)
                        .await
                        .map_err(TableSqlError::Backend)
                })
                .await
                .map_err(TableSqlError::mapped)?;
                Ok(ExecResult::default())
            }
            QueryMode::Scheme => {
                let options = to_scheme_options(args)?;
                let options = &options;
                retry(ctx, ctx.idempotent(), &self.retry, move || async move {
                    session
                        .execute_scheme(query, options)
                        .await
                        .map_err(TableSqlError::Backend)
                })
                .await
                .map_err(TableSqlError::mapped)?;
                Ok(ExecResult::default())
            }
            mode => Err(TableSqlError::UnsupportedQueryMode {
                mode,
                operation: "exec",
            }),
        }
    }

    /// Execute and return rows: buffered for Data, streaming for Scan, a single
    /// `AST`/`Plan` row for Explain.
    ///
    /// # Errors
    ///
    /// Parameter or mode errors before any backend call, [`TableSqlError::Cancelled`], or the
    /// mapped backend failure.
    pub async fn query(
        &mut self,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
    ) -> Result<Rows, TableSqlError> {
        let res = self.query_inner(ctx, query, args).await;
        self.track(res)
    }

    async fn query_inner(
        &self,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
    ) -> Result<Rows, TableSqlError> {
        let data_options = ctx.data_options_over(&self.defaults.data_options);
        let session = self.session.as_ref();
        if let Some(tx) = &self.tx {
            return tx.query(session, ctx, query, args, &data_options).await;
        }
        match classify(query, ctx.mode()) {
            QueryMode::Data => {
                let params = to_query_parameters(args)?;
                let tx_control = ctx.tx_control_or(&self.defaults.tx_control);
                let (params, data_options) = (&params, &data_options);
                let result = retry(ctx, ctx.idempotent(), &self.retry, move || async move {
                    session
                        .execute(tx_control, query, params, data_options)
                        .await
                        .map_err(TableSqlError::Backend)
                })
                .await
                .map_err(TableSqlError::mapped)?;
                Ok(Rows::Buffered(BufferedRows::new(result)))
            }
            QueryMode::Scan => {
                let params = to_query_parameters(args)?;
                let scan_options = ctx.scan_options_over(&self.defaults.scan_options);
                let (params, scan_options) = (&params, &scan_options);
                let stream = retry(ctx, ctx.idempotent(), &self.retry, move || async move {
                    session
                        .stream_execute_scan(query, params, scan_options)
                        .await
                        .map_err(TableSqlError::Backend)
                })
                .await
                .map_err(TableSqlError::mapped)?;
                let rows = StreamRows::open(stream, ctx.cancellation().clone()).await?;
                Ok(Rows::Stream(rows))
            }
            QueryMode::Explain => {
                let explanation = retry(ctx, true, &self.retry, move || async move {
                    session.explain(query).await.map_err(TableSqlError::Backend)
                })
                .await
                .map_err(TableSqlError::mapped)?;
                Ok(Rows::Single(SingleRow::explanation(explanation)))
            }
            mode @ QueryMode::Scheme => Err(TableSqlError::UnsupportedQueryMode {
                mode,
                operation: "query",
            }),
        }
    }

    /// Prepare a statement on this connection's session.
    ///
    /// # Errors
    ///
    /// [`TableSqlError::Cancelled`] or the mapped backend failure.
    pub async fn prepare(
        &mut self,
        ctx: &ExecContext,
        query: &str,
    ) -> Result<Statement, TableSqlError> {
        let session = self.session.as_ref();
        let res = retry(ctx, true, &self.retry, move || async move {
            session.prepare(query).await.map_err(TableSqlError::Backend)
        })
        .await
        .map_err(TableSqlError::mapped);
        let prepared = self.track(res)?;
        Ok(Statement::new(
            prepared,
            self.defaults.clone(),
            self.retry.clone(),
            Arc::clone(&self.bad),
        ))
    }

    /// Session keep-alive. Not retried.
    ///
    /// # Errors
    ///
    /// [`TableSqlError::BadConnection`] when the session is gone.
    pub async fn ping(&mut self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        let res = ctx.run(self.session.keep_alive()).await;
        self.track(res)
    }

    /// Prepare the connection for reuse by another caller, rolling back a leaked transaction.
    ///
    /// # Errors
    ///
    /// [`TableSqlError::BadConnection`] if the rollback fails; the connection is then
    /// unusable.
    pub async fn reset_session(&mut self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        if self.is_bad() {
            return Err(TableSqlError::BadConnection);
        }
        if let Some(mut tx) = self.tx.take() {
            debug!(session_id = self.session.id(), "rolling back leaked transaction");
            if let Err(err) = tx.rollback(ctx).await {
                warn!(session_id = self.session.id(), error = %err, "rollback on reset failed");
                self.bad.store(true, Ordering::Release);
                return Err(TableSqlError::BadConnection);
            }
        }
        Ok(())
    }

    /// Close the session, rolling back an open transaction first.
    ///
    /// # Errors
    ///
    /// The mapped failure from closing the session. A failed rollback is only logged.
    pub async fn close(mut self) -> Result<(), TableSqlError> {
        let ctx = ExecContext::default();
        if let Some(mut tx) = self.tx.take() {
            if let Err(err) = tx.rollback(&ctx).await {
                warn!(session_id = self.session.id(), error = %err, "rollback on close failed");
            }
        }
        debug!(session_id = self.session.id(), "closing session");
        ctx.run(self.session.close()).await
    }

    /// Context-free prepare from the pre-context API.
    ///
    /// # Errors
    ///
    /// Always [`TableSqlError::Deprecated`].
    pub fn legacy_prepare(&self, _query: &str) -> Result<Statement, TableSqlError> {
        Err(TableSqlError::Deprecated)
    }

    /// # Errors
    ///
    /// Always [`TableSqlError::Deprecated`].
    pub fn legacy_begin(&self) -> Result<TxHandle<'_>, TableSqlError> {
        Err(TableSqlError::Deprecated)
    }
}

/// Borrowed view of a connection with an open transaction.
///
/// Dropping the handle leaves the transaction open on the connection; finish it with
/// [`TxHandle::commit`] / [`TxHandle::rollback`] or the connection's `commit_tx` /
/// `rollback_tx`.
#[derive(Debug)]
pub struct TxHandle<'c> {
    conn: &'c mut Connection,
}

impl TxHandle<'_> {
    #[must_use]
    pub fn kind(&self) -> Option<TxKind> {
        self.conn.transaction_kind()
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.conn.transaction_id()
    }

    /// # Errors
    ///
    /// See [`Connection::exec`].
    pub async fn exec(
        &mut self,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
    ) -> Result<ExecResult, TableSqlError> {
        self.conn.exec(ctx, query, args).await
    }

    /// # Errors
    ///
    /// See [`Connection::query`].
    pub async fn query(
        &mut self,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
    ) -> Result<Rows, TableSqlError> {
        self.conn.query(ctx, query, args).await
    }

    /// # Errors
    ///
    /// See [`Connection::commit_tx`].
    pub async fn commit(self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        self.conn.commit_tx(ctx).await
    }

    /// # Errors
    ///
    /// See [`Connection::rollback_tx`].
    pub async fn rollback(self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        self.conn.rollback_tx(ctx).await
    }
}
