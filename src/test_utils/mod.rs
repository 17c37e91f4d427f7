//! Scriptable in-memory backend for tests and benchmarks.
//!
//! Every backend call is appended to a journal before it completes, so tests can assert
//! exactly which round trips happened. Failures are scripted per [`Op`] and consumed in order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{
    Backend, BackendError, DataQueryOption, Explanation, PreparedStatement, QueryParameters,
    QueryResult, ResultSetData, ScanQueryOption, ScanStream, SchemeOption, Session, TableClient,
    Transaction, TxControl, TxSettings,
};
use crate::conn::Connection;
use crate::connector::{ConnectorOptions, Driver};
use crate::retry::{Backoff, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    OpenClient,
    CloseClient,
    CreateSession,
    CloseSession,
    KeepAlive,
    Execute,
    ExecuteScheme,
    Explain,
    StreamScan,
    ScanPart,
    CloseScan,
    BeginTx,
    TxExecute,
    Commit,
    Rollback,
    Prepare,
    StatementExecute,
}

/// One recorded backend round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OpenClient,
    CloseClient,
    CreateSession {
        session: String,
    },
    CloseSession {
        session: String,
    },
    KeepAlive {
        session: String,
    },
    Execute {
        session: String,
        query: String,
        tx_control: TxControl,
        params: QueryParameters,
        options: Vec<DataQueryOption>,
    },
    ExecuteScheme {
        session: String,
        query: String,
        options: Vec<SchemeOption>,
    },
    Explain {
        session: String,
        query: String,
    },
    StreamScan {
        session: String,
        query: String,
        params: QueryParameters,
        options: Vec<ScanQueryOption>,
    },
    ScanPart,
    CloseScan,
    BeginTx {
        session: String,
        settings: TxSettings,
        tx: String,
    },
    TxExecute {
        tx: String,
        query: String,
        params: QueryParameters,
    },
    Commit {
        tx: String,
    },
    Rollback {
        tx: String,
    },
    Prepare {
        session: String,
        query: String,
    },
    StatementExecute {
        query: String,
        tx_control: TxControl,
        params: QueryParameters,
    },
}

impl Call {
    #[must_use]
    pub fn op(&self) -> Op {
        match self {
            Self::OpenClient => Op::OpenClient,
            Self::CloseClient => Op::CloseClient,
            Self::CreateSession { .. } => Op::CreateSession,
            Self::CloseSession { .. } => Op::CloseSession,
            Self::KeepAlive { .. } => Op::KeepAlive,
            Self::Execute { .. } => Op::Execute,
            Self::ExecuteScheme { .. } => Op::ExecuteScheme,
            Self::Explain { .. } => Op::Explain,
            Self::StreamScan { .. } => Op::StreamScan,
            Self::ScanPart => Op::ScanPart,
            Self::CloseScan => Op::CloseScan,
            Self::BeginTx { .. } => Op::BeginTx,
            Self::TxExecute { .. } => Op::TxExecute,
            Self::Commit { .. } => Op::Commit,
            Self::Rollback { .. } => Op::Rollback,
            Self::Prepare { .. } => Op::Prepare,
            Self::StatementExecute { .. } => Op::StatementExecute,
        }
    }

    /// Whether this call touched an explicit transaction.
    #[must_use]
    pub fn is_transactional(&self) -> bool {
        matches!(
            self.op(),
            Op::BeginTx | Op::TxExecute | Op::Commit | Op::Rollback
        )
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<BackendError>>,
    hanging: HashSet<Op>,
    results: VecDeque<QueryResult>,
    scan_parts: Vec<ResultSetData>,
    explanation: Explanation,
    sessions: u64,
    transactions: u64,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record `call`, then apply whatever is scripted for its op.
async fn enter(state: &Shared, call: Call) -> Result<(), BackendError> {
    let op = call.op();
    let (hang, failure) = {
        let mut s = lock(state);
        s.calls.push(call);
        (
            s.hanging.contains(&op),
            s.failures.get_mut(&op).and_then(VecDeque::pop_front),
        )
    };
    if hang {
        std::future::pending::<()>().await;
    }
    failure.map_or(Ok(()), Err)
}

fn next_result(state: &Shared) -> QueryResult {
    lock(state).results.pop_front().unwrap_or_default()
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Shared,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &lock(&self.state).calls.len())
            .finish()
    }
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call of `op` with `err`. Repeated calls queue further failures.
    pub fn fail(&self, op: Op, err: BackendError) {
        lock(&self.state)
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn fail_times(&self, op: Op, err: &BackendError, times: usize) {
        for _ in 0..times {
            self.fail(op, err.clone());
        }
    }

    /// Calls of `op` never complete; useful for cancellation tests.
    pub fn hang(&self, op: Op) {
        lock(&self.state).hanging.insert(op);
    }

    /// Queue a result for the next data execution (session, transaction or statement).
    pub fn push_result(&self, result: QueryResult) {
        lock(&self.state).results.push_back(result);
    }

    /// Parts served by every scan stream opened afterwards.
    pub fn set_scan_parts(&self, parts: Vec<ResultSetData>) {
        lock(&self.state).scan_parts = parts;
    }

    pub fn set_explanation(&self, ast: &str, plan: &str) {
        lock(&self.state).explanation = Explanation {
            ast: ast.to_owned(),
            plan: plan.to_owned(),
        };
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    #[must_use]
    pub fn count(&self, op: Op) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    /// Calls that touched explicit transactions, in order.
    #[must_use]
    pub fn transactional_calls(&self) -> Vec<Call> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.is_transactional())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    #[must_use]
    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::new(self.clone())
    }

    #[must_use]
    pub fn driver(&self) -> Driver {
        Driver::new(self.backend())
    }

    /// Options with millisecond backoff so retry tests stay fast.
    #[must_use]
    pub fn options() -> ConnectorOptions {
        ConnectorOptions::builder()
            .endpoint("mock://local")
            .database("/local")
            .retry_policy(fast_retry_policy())
            .finish()
    }

    /// Connection on a fresh session, bypassing the connector. Not recorded as a client open.
    ///
    /// # Panics
    ///
    /// Panics if a session failure was scripted.
    pub async fn connection(&self) -> Connection {
        let client = MockClient {
            state: Arc::clone(&self.state),
        };
        let session = client
            .create_session()
            .await
            .expect("scripted session failure in MockBackend::connection");
        let opts = Self::options();
        Connection::new(session, opts.connection_defaults(), opts.retry)
    }
}

/// Deterministic, millisecond-scale retry policy.
#[must_use]
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_fast(Backoff::new(Duration::from_millis(1), 3, 1.0))
        .with_slow(Backoff::new(Duration::from_millis(4), 3, 1.0))
}

#[async_trait]
impl Backend for MockBackend {
    async fn open(&self, _options: &ConnectorOptions) -> Result<Arc<dyn TableClient>, BackendError> {
        enter(&self.state, Call::OpenClient).await?;
        Ok(Arc::new(MockClient {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockClient {
    state: Shared,
}

#[async_trait]
impl TableClient for MockClient {
    async fn create_session(&self) -> Result<Box<dyn Session>, BackendError> {
        let id = {
            let mut s = lock(&self.state);
            s.sessions += 1;
            format!("session-{}", s.sessions)
        };
        enter(&self.state, Call::CreateSession { session: id.clone() }).await?;
        Ok(Box::new(MockSession {
            id,
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<(), BackendError> {
        enter(&self.state, Call::CloseClient).await
    }
}

struct MockSession {
    id: String,
    state: Shared,
}

#[async_trait]
impl Session for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        tx_control: &TxControl,
        query: &str,
        params: &QueryParameters,
        options: &[DataQueryOption],
    ) -> Result<QueryResult, BackendError> {
        enter(
            &self.state,
            Call::Execute {
                session: self.id.clone(),
                query: query.to_owned(),
                tx_control: tx_control.clone(),
                params: params.clone(),
                options: options.to_vec(),
            },
        )
        .await?;
        Ok(next_result(&self.state))
    }

    async fn execute_scheme(
        &self,
        query: &str,
        options: &[SchemeOption],
    ) -> Result<(), BackendError> {
        enter(
            &self.state,
            Call::ExecuteScheme {
                session: self.id.clone(),
                query: query.to_owned(),
                options: options.to_vec(),
            },
        )
        .await
    }

    async fn explain(&self, query: &str) -> Result<Explanation, BackendError> {
        enter(
            &self.state,
            Call::Explain {
                session: self.id.clone(),
                query: query.to_owned(),
            },
        )
        .await?;
        Ok(lock(&self.state).explanation.clone())
    }

    async fn stream_execute_scan(
        &self,
        query: &str,
        params: &QueryParameters,
        options: &[ScanQueryOption],
    ) -> Result<Box<dyn ScanStream>, BackendError> {
        enter(
            &self.state,
            Call::StreamScan {
                session: self.id.clone(),
                query: query.to_owned(),
                params: params.clone(),
                options: options.to_vec(),
            },
        )
        .await?;
        let parts = lock(&self.state).scan_parts.clone().into();
        Ok(Box::new(MockScanStream {
            parts,
            state: Arc::clone(&self.state),
        }))
    }

    async fn begin_transaction(
        &self,
        settings: &TxSettings,
    ) -> Result<Box<dyn Transaction>, BackendError> {
        let id = {
            let mut s = lock(&self.state);
            s.transactions += 1;
            format!("tx-{}", s.transactions)
        };
        enter(
            &self.state,
            Call::BeginTx {
                session: self.id.clone(),
                settings: *settings,
                tx: id.clone(),
            },
        )
        .await?;
        Ok(Box::new(MockTransaction {
            id,
            state: Arc::clone(&self.state),
        }))
    }

    async fn prepare(&self, query: &str) -> Result<Box<dyn PreparedStatement>, BackendError> {
        enter(
            &self.state,
            Call::Prepare {
                session: self.id.clone(),
                query: query.to_owned(),
            },
        )
        .await?;
        Ok(Box::new(MockStatement {
            text: query.to_owned(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn keep_alive(&self) -> Result<(), BackendError> {
        enter(
            &self.state,
            Call::KeepAlive {
                session: self.id.clone(),
            },
        )
        .await
    }

    async fn close(&self) -> Result<(), BackendError> {
        enter(
            &self.state,
            Call::CloseSession {
                session: self.id.clone(),
            },
        )
        .await
    }
}

struct MockTransaction {
    id: String,
    state: Shared,
}

#[async_trait]
impl Transaction for MockTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        query: &str,
        params: &QueryParameters,
        _options: &[DataQueryOption],
    ) -> Result<QueryResult, BackendError> {
        enter(
            &self.state,
            Call::TxExecute {
                tx: self.id.clone(),
                query: query.to_owned(),
                params: params.clone(),
            },
        )
        .await?;
        Ok(next_result(&self.state))
    }

    async fn commit(&self) -> Result<(), BackendError> {
        enter(&self.state, Call::Commit { tx: self.id.clone() }).await
    }

    async fn rollback(&self) -> Result<(), BackendError> {
        enter(&self.state, Call::Rollback { tx: self.id.clone() }).await
    }
}

struct MockStatement {
    text: String,
    state: Shared,
}

#[async_trait]
impl PreparedStatement for MockStatement {
    fn text(&self) -> &str {
        &self.text
    }

    fn num_input(&self) -> usize {
        let mut names: Vec<&str> = self
            .text
            .split('$')
            .skip(1)
            .map(|rest| {
                let end = rest
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                &rest[..end]
            })
            .filter(|name| !name.is_empty())
            .collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }

    async fn execute(
        &self,
        tx_control: &TxControl,
        params: &QueryParameters,
        _options: &[DataQueryOption],
    ) -> Result<QueryResult, BackendError> {
        enter(
            &self.state,
            Call::StatementExecute {
                query: self.text.clone(),
                tx_control: tx_control.clone(),
                params: params.clone(),
            },
        )
        .await?;
        Ok(next_result(&self.state))
    }
}

struct MockScanStream {
    parts: VecDeque<ResultSetData>,
    state: Shared,
}

#[async_trait]
impl ScanStream for MockScanStream {
    async fn next_part(&mut self) -> Result<Option<ResultSetData>, BackendError> {
        enter(&self.state, Call::ScanPart).await?;
        Ok(self.parts.pop_front())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.parts.clear();
        enter(&self.state, Call::CloseScan).await
    }
}
