//! Transaction state machine.
//!
//! A [`Transaction`] is created by [`Connection::begin_tx`](crate::Connection::begin_tx) and
//! lives in the connection's transaction slot until a successful commit or rollback.
//! Read-only transactions at the committed levels never open a server-side transaction; each
//! statement carries its own control block instead.

use std::fmt;

use tracing::debug;

use crate::backend::{self, DataQueryOption, Session, TxControl};
use crate::context::ExecContext;
use crate::error::TableSqlError;
use crate::mode::{QueryMode, classify};
use crate::params::{NamedArg, to_query_parameters};
use crate::results::ExecResult;
use crate::rows::{BufferedRows, Rows, SingleRow};

pub mod isolation;

pub use isolation::{IsolationLevel, TxOptions, TxStrategy, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    ReadOnly,
    ReadWrite,
}

enum TxState {
    ReadOnly { control: TxControl },
    ReadWrite { handle: Box<dyn backend::Transaction> },
    Closed,
}

pub struct Transaction {
    state: TxState,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .finish()
    }
}

impl Transaction {
    /// # Errors
    ///
    /// Unsupported isolation options fail before any backend call; a failed begin is mapped
    /// through [`map_backend_error`](crate::error::map_backend_error).
    pub(crate) async fn begin(
        session: &dyn Session,
        ctx: &ExecContext,
        opts: TxOptions,
    ) -> Result<Self, TableSqlError> {
        let state = match resolve(opts)? {
            TxStrategy::PerCall(control) => {
                debug!(isolation = %opts.isolation, "read-only transaction with per-call control");
                TxState::ReadOnly { control }
            }
            TxStrategy::Explicit(settings) => {
                let handle = ctx.run(session.begin_transaction(&settings)).await?;
                debug!(tx_id = handle.id(), isolation = %opts.isolation, "transaction begun");
                TxState::ReadWrite { handle }
            }
        };
        Ok(Self { state })
    }

    /// `None` once committed or rolled back.
    #[must_use]
    pub fn kind(&self) -> Option<TxKind> {
        match self.state {
            TxState::ReadOnly { .. } => Some(TxKind::ReadOnly),
            TxState::ReadWrite { .. } => Some(TxKind::ReadWrite),
            TxState::Closed => None,
        }
    }

    /// Server-side transaction id, only for read-write transactions.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match &self.state {
            TxState::ReadWrite { handle } => Some(handle.id()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, TxState::Closed)
    }

    pub(crate) async fn exec(
        &self,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
        data_options: &[DataQueryOption],
    ) -> Result<ExecResult, TableSqlError> {
        match &self.state {
            TxState::Closed => Err(TableSqlError::NoActiveTransaction),
            TxState::ReadOnly { .. } => Err(TableSqlError::ExecOnReadOnlyTx),
            TxState::ReadWrite { handle } => match classify(query, ctx.mode()) {
                QueryMode::Data => {
                    let params = to_query_parameters(args)?;
                    ctx.run(handle.execute(query, &params, data_options)).await?;
                    Ok(ExecResult::default())
                }
                mode => Err(TableSqlError::UnsupportedQueryMode {
                    mode,
                    operation: "exec in transaction",
                }),
            },
        }
    }

    pub(crate) async fn query(
        &self,
        session: &dyn Session,
        ctx: &ExecContext,
        query: &str,
        args: &[NamedArg],
        data_options: &[DataQueryOption],
    ) -> Result<Rows, TableSqlError> {
        let mode = classify(query, ctx.mode());
        match (&self.state, mode) {
            (TxState::Closed, _) => Err(TableSqlError::NoActiveTransaction),
            (_, QueryMode::Explain) => {
                let explanation = ctx.run(session.explain(query)).await?;
                Ok(Rows::Single(SingleRow::explanation(explanation)))
            }
            (TxState::ReadOnly { control }, QueryMode::Data) => {
                let params = to_query_parameters(args)?;
                let result = ctx
                    .run(session.execute(control, query, &params, data_options))
                    .await?;
                Ok(Rows::Buffered(BufferedRows::new(result)))
            }
            (TxState::ReadWrite { handle }, QueryMode::Data) => {
                let params = to_query_parameters(args)?;
                let result = ctx.run(handle.execute(query, &params, data_options)).await?;
                Ok(Rows::Buffered(BufferedRows::new(result)))
            }
            (_, mode) => Err(TableSqlError::UnsupportedQueryMode {
                mode,
                operation: "query in transaction",
            }),
        }
    }

    /// Commit. On failure the transaction stays open so the caller may still roll back.
    pub(crate) async fn commit(&mut self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        match &self.state {
            TxState::Closed => return Err(TableSqlError::NoActiveTransaction),
            TxState::ReadOnly { .. } => {}
            TxState::ReadWrite { handle } => {
                ctx.run(handle.commit()).await?;
                debug!(tx_id = handle.id(), "transaction committed");
            }
        }
        self.state = TxState::Closed;
        Ok(())
    }

    pub(crate) async fn rollback(&mut self, ctx: &ExecContext) -> Result<(), TableSqlError> {
        match &self.state {
            TxState::Closed => return Err(TableSqlError::NoActiveTransaction),
            TxState::ReadOnly { .. } => {}
            TxState::ReadWrite { handle } => {
                ctx.run(handle.rollback()).await?;
                debug!(tx_id = handle.id(), "transaction rolled back");
            }
        }
        self.state = TxState::Closed;
        Ok(())
    }
}
