//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::backend::{
    Backend, BackendError, DataQueryOption, ScanQueryOption, SchemeOption, StatusCode,
    TransportCode, TxControl, TxSettings, Value,
};
pub use crate::conn::{Connection, ConnectionDefaults, Statement, TxHandle};
pub use crate::connector::{Connector, ConnectorOptions, ConnectorOptionsBuilder, Driver};
pub use crate::context::ExecContext;
pub use crate::error::TableSqlError;
pub use crate::mode::{QueryMode, data_query, explain_query, scan_query, scheme_query};
pub use crate::params::{ArgValue, NamedArg, Valuer};
pub use crate::pool::{ConnectionPool, do_tx, get_connection};
pub use crate::results::{ExecResult, ResultSet, Row};
pub use crate::retry::{Backoff, RetryPolicy};
pub use crate::rows::Rows;
pub use crate::tx::{IsolationLevel, TxKind, TxOptions};
