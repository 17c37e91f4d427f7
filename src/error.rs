use thiserror::Error;

use crate::backend::BackendError;
use crate::mode::QueryMode;
use crate::retry::check::{Classification, classify};
use crate::tx::IsolationLevel;

/// Boxed error produced by user-supplied value resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TableSqlError {
    /// Raw backend failure that did not map to a connection-level signal.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The connection must be discarded by the pool and replaced.
    #[error("bad connection")]
    BadConnection,

    #[error("operation cancelled")]
    Cancelled,

    #[error("only named parameters are supported (argument #{ordinal} has no name)")]
    InvalidParameter { ordinal: usize },

    #[error("unsupported parameter type {type_name} for argument {name}")]
    UnsupportedParameterType {
        name: String,
        type_name: &'static str,
    },

    #[error("failed to resolve value of argument {name}: {source}")]
    ParameterResolutionFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("argument {name} is not a scheme query option")]
    InvalidSchemeArgument { name: String },

    #[error("unsupported transaction options: isolation={level} read_only={read_only}")]
    UnsupportedIsolation {
        level: IsolationLevel,
        read_only: bool,
    },

    #[error("unsupported query mode {mode} for {operation}")]
    UnsupportedQueryMode {
        mode: QueryMode,
        operation: &'static str,
    },

    #[error("can not begin tx within active tx")]
    ActiveTransaction,

    #[error("no active tx to work with")]
    NoActiveTransaction,

    #[error("cannot execute query on read-only tx")]
    ExecOnReadOnlyTx,

    #[error("deprecated entry point; use the context-aware variant")]
    Deprecated,

    #[error("not supported: {0}")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Pool error: {0}")]
    PoolError(String),

    #[error("connector is closed")]
    ConnectorClosed,
}

impl TableSqlError {
    /// True for the sentinel that tells the pool to evict the connection.
    #[must_use]
    pub fn is_bad_connection(&self) -> bool {
        matches!(self, Self::BadConnection)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    #[must_use]
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }

    /// Retry classification of this failure.
    ///
    /// Only backend failures and the bad-connection sentinel carry a classification; caller
    /// misuse and cancellation are never retried.
    #[must_use]
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Self::Backend(err) => Some(classify(err)),
            Self::BadConnection => Some(Classification::must_delete_session()),
            _ => None,
        }
    }

    /// Run a raw backend failure through [`map_backend_error`]; other variants pass through.
    #[must_use]
    pub fn mapped(self) -> Self {
        match self {
            Self::Backend(err) => map_backend_error(err),
            other => other,
        }
    }
}

/// Map a backend failure onto what the calling runtime understands.
///
/// Failures that leave the session unusable, and the overloaded/unavailable family, become
/// [`TableSqlError::BadConnection`] so the pool recycles the connection. Everything else is
/// surfaced unchanged.
#[must_use]
pub fn map_backend_error(err: BackendError) -> TableSqlError {
    let class = classify(&err);
    if class.is_must_delete_session()
        || err.is_overloaded()
        || err.is_unavailable()
        || err.is_resource_exhausted()
    {
        TableSqlError::BadConnection
    } else {
        TableSqlError::Backend(err)
    }
}
