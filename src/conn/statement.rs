use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::backend::{PreparedStatement, QueryResult};
use crate::conn::ConnectionDefaults;
use crate::context::ExecContext;
use crate::error::TableSqlError;
use crate::mode::{QueryMode, classify};
use crate::params::{NamedArg, check_named_value, to_query_parameters};
use crate::results::ExecResult;
use crate::retry::{RetryPolicy, retry};
use crate::rows::{BufferedRows, Rows};

/// Prepared data query. Other modes are rejected.
///
/// A [`TableSqlError::BadConnection`] outcome marks the preparing connection bad.
pub struct Statement {
    inner: Box<dyn PreparedStatement>,
    defaults: ConnectionDefaults,
    retry: RetryPolicy,
    conn_bad: Arc<AtomicBool>,
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("text", &self.inner.text())
            .field("num_input", &self.inner.num_input())
            .finish_non_exhaustive()
    }
}

impl Statement {
    pub(crate) fn new(
        inner: Box<dyn PreparedStatement>,
        defaults: ConnectionDefaults,
        retry: RetryPolicy,
        conn_bad: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner,
            defaults,
            retry,
            conn_bad,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.inner.text()
    }

    #[must_use]
    pub fn num_input(&self) -> usize {
        self.inner.num_input()
    }

    /// # Errors
    ///
    /// See [`check_named_value`].
    pub fn check_named_value(&self, arg: &mut NamedArg) -> Result<(), TableSqlError> {
        check_named_value(arg)
    }

    fn ensure_data(&self, ctx: &ExecContext, operation: &'static str) -> Result<(), TableSqlError> {
        match classify(self.inner.text(), ctx.mode()) {
            QueryMode::Data => Ok(()),
            mode => Err(TableSqlError::UnsupportedQueryMode { mode, operation }),
        }
    }

    async fn run(
        &self,
        ctx: &ExecContext,
        args: &[NamedArg],
    ) -> Result<QueryResult, TableSqlError> {
        let params = to_query_parameters(args)?;
        let data_options = ctx.data_options_over(&self.defaults.data_options);
        let tx_control = ctx.tx_control_or(&self.defaults.tx_control);
        let inner = self.inner.as_ref();
        let (params, data_options) = (&params, &data_options);
        let res = retry(ctx, ctx.idempotent(), &self.retry, move || async move {
            inner
                .execute(tx_control, params, data_options)
                .await
                .map_err(TableSqlError::Backend)
        })
        .await
        .map_err(TableSqlError::mapped);
        if let Err(TableSqlError::BadConnection) = &res
            && !self.conn_bad.swap(true, Ordering::AcqRel)
        {
            warn!(statement = self.inner.text(), "connection marked bad by prepared statement");
        }
        res
    }

    /// # Errors
    ///
    /// [`TableSqlError::UnsupportedQueryMode`] outside Data mode, parameter errors, or the
    /// mapped backend failure.
    pub async fn exec(
        &self,
        ctx: &ExecContext,
        args: &[NamedArg],
    ) -> Result<ExecResult, TableSqlError> {
        self.ensure_data(ctx, "prepared exec")?;
        self.run(ctx, args).await?;
        Ok(ExecResult::default())
    }

    /// # Errors
    ///
    /// Same as [`Statement::exec`].
    pub async fn query(&self, ctx: &ExecContext, args: &[NamedArg]) -> Result<Rows, TableSqlError> {
        self.ensure_data(ctx, "prepared query")?;
        let result = self.run(ctx, args).await?;
        Ok(Rows::Buffered(BufferedRows::new(result)))
    }

    /// # Errors
    ///
    /// Always [`TableSqlError::Deprecated`].
    pub fn legacy_exec(&self, _args: &[NamedArg]) -> Result<ExecResult, TableSqlError> {
        Err(TableSqlError::Deprecated)
    }

    /// # Errors
    ///
    /// Always [`TableSqlError::Deprecated`].
    pub fn legacy_query(&self, _args: &[NamedArg]) -> Result<Rows, TableSqlError> {
        Err(TableSqlError::Deprecated)
    }
}
