//! Relational-client adapter for session-oriented, transactional table services.
//!
//! The crate sits between an application speaking a generic "connect / prepare / execute /
//! begin transaction" contract and a backend SDK that exposes sessions, explicit transactions,
//! scheme queries, scan streams and explain requests. It owns:
//!
//! - query-mode classification ([`mode`]),
//! - parameter coercion into typed backend values ([`params`]),
//! - isolation-level mapping and the transaction state machine ([`tx`]),
//! - the idempotency-aware retry engine ([`retry`]),
//! - the connection/statement adapter and its result adapters ([`conn`], [`rows`]).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use table_sql_middleware::prelude::*;
//!
//! # async fn demo(backend: Arc<dyn Backend>) -> Result<(), TableSqlError> {
//! let driver = Driver::new(backend);
//! let connector = driver.open_connector("grpc://localhost:2136/local");
//! let mut conn = connector.connect(&ExecContext::default()).await?;
//!
//! let ctx = ExecContext::default();
//! conn.exec(
//!     &ctx,
//!     "UPSERT INTO users (id, name) VALUES ($id, $name)",
//!     &[NamedArg::named("id", 1_u64), NamedArg::named("name", "alice")],
//! )
//! .await?;
//!
//! let mut rows = conn.query(&ctx, &scan_query("SELECT * FROM users"), &[]).await?;
//! while let Some(row) = rows.next().await? {
//!     println!("{row:?}");
//! }
//! # Ok(()) }
//! ```

pub mod backend;
pub mod conn;
pub mod connector;
pub mod context;
pub mod error;
pub mod mode;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod retry;
pub mod rows;
pub mod tx;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use conn::{Connection, Statement, TxHandle};
pub use connector::{Connector, ConnectorOptions, Driver};
pub use context::ExecContext;
pub use error::TableSqlError;
pub use mode::QueryMode;
pub use rows::Rows;
