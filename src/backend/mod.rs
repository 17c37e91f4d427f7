//! Boundary to the table-service SDK.
//!
//! The adapter never talks to the network itself; it drives these traits. A production
//! deployment plugs in an SDK-backed [`Backend`], tests plug in
//! [`MockBackend`](crate::test_utils::MockBackend).

use std::sync::Arc;

use async_trait::async_trait;

pub mod control;
pub mod error;
pub mod options;
pub mod value;

pub use control::{TxControl, TxSelector, TxSettings};
pub use error::{BackendError, BackendErrorKind, StatusCode, TransportCode};
pub use options::{DataQueryOption, ScanQueryOption, SchemeOption, StatsMode};
pub use value::{Decimal, Value};

use crate::connector::ConnectorOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// One materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSetData {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    /// The backend cut the set short at its row limit.
    pub truncated: bool,
}

impl ResultSetData {
    #[must_use]
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            truncated: false,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Every result set produced by a data query, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub result_sets: Vec<ResultSetData>,
}

impl QueryResult {
    #[must_use]
    pub fn new(result_sets: Vec<ResultSetData>) -> Self {
        Self { result_sets }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Explanation {
    pub ast: String,
    pub plan: String,
}

/// Named, typed parameter; `name` carries the `$` bind sigil.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters(Vec<Param>);

impl QueryParameters {
    #[must_use]
    pub fn new(params: Vec<Param>) -> Self {
        Self(params)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Param> {
        self.0
    }
}

/// Builds the shared client for a connector.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn open(&self, options: &ConnectorOptions) -> Result<Arc<dyn TableClient>, BackendError>;
}

/// Long-lived client shared by every connection of one connector.
#[async_trait]
pub trait TableClient: Send + Sync {
    async fn create_session(&self) -> Result<Box<dyn Session>, BackendError>;
    async fn close(&self) -> Result<(), BackendError>;
}

/// Server-side session bound to one connection.
#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> &str;

    async fn execute(
        &self,
        tx_control: &TxControl,
        query: &str,
        params: &QueryParameters,
        options: &[DataQueryOption],
    ) -> Result<QueryResult, BackendError>;

    async fn execute_scheme(
        &self,
        query: &str,
        options: &[SchemeOption],
    ) -> Result<(), BackendError>;

    async fn explain(&self, query: &str) -> Result<Explanation, BackendError>;

    async fn stream_execute_scan(
        &self,
        query: &str,
        params: &QueryParameters,
        options: &[ScanQueryOption],
    ) -> Result<Box<dyn ScanStream>, BackendError>;

    async fn begin_transaction(
        &self,
        settings: &TxSettings,
    ) -> Result<Box<dyn Transaction>, BackendError>;

    async fn prepare(&self, query: &str) -> Result<Box<dyn PreparedStatement>, BackendError>;

    async fn keep_alive(&self) -> Result<(), BackendError>;

    async fn close(&self) -> Result<(), BackendError>;
}

/// Explicit server-side transaction.
#[async_trait]
pub trait Transaction: Send + Sync {
    fn id(&self) -> &str;

    async fn execute(
        &self,
        query: &str,
        params: &QueryParameters,
        options: &[DataQueryOption],
    ) -> Result<QueryResult, BackendError>;

    async fn commit(&self) -> Result<(), BackendError>;

    async fn rollback(&self) -> Result<(), BackendError>;
}

#[async_trait]
pub trait PreparedStatement: Send + Sync {
    fn text(&self) -> &str;

    /// Number of declared parameters.
    fn num_input(&self) -> usize;

    async fn execute(
        &self,
        tx_control: &TxControl,
        params: &QueryParameters,
        options: &[DataQueryOption],
    ) -> Result<QueryResult, BackendError>;
}

/// Live scan stream; parts share one implicit result set.
#[async_trait]
pub trait ScanStream: Send {
    /// Next part, or `None` once the stream is drained.
    async fn next_part(&mut self) -> Result<Option<ResultSetData>, BackendError>;

    async fn close(&mut self) -> Result<(), BackendError>;
}
