use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, DataQueryOption, ScanQueryOption, TxControl};
use crate::error::{TableSqlError, map_backend_error};
use crate::mode::QueryMode;

/// Per-call execution settings: cancellation plus the overrides a caller may layer on top of
/// the connection defaults.
///
/// ```rust
/// use table_sql_middleware::prelude::*;
///
/// let ctx = ExecContext::default()
///     .with_mode(QueryMode::Scan)
///     .with_idempotent(true);
/// assert_eq!(ctx.mode(), Some(QueryMode::Scan));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    cancel: CancellationToken,
    mode: Option<QueryMode>,
    tx_control: Option<TxControl>,
    data_options: Vec<DataQueryOption>,
    scan_options: Vec<ScanQueryOption>,
    idempotent: bool,
}

impl ExecContext {
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Force a query mode, ignoring any directive in the query text.
    #[must_use]
    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Replace the connection's default transaction control for this call.
    #[must_use]
    pub fn with_tx_control(mut self, tx_control: TxControl) -> Self {
        self.tx_control = Some(tx_control);
        self
    }

    /// Append data-query options after the connection defaults.
    #[must_use]
    pub fn with_data_options(mut self, options: impl IntoIterator<Item = DataQueryOption>) -> Self {
        self.data_options.extend(options);
        self
    }

    #[must_use]
    pub fn with_scan_options(mut self, options: impl IntoIterator<Item = ScanQueryOption>) -> Self {
        self.scan_options.extend(options);
        self
    }

    /// Mark the work as safe to repeat after an ambiguous failure.
    #[must_use]
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn mode(&self) -> Option<QueryMode> {
        self.mode
    }

    #[must_use]
    pub fn tx_control(&self) -> Option<&TxControl> {
        self.tx_control.as_ref()
    }

    #[must_use]
    pub fn idempotent(&self) -> bool {
        self.idempotent
    }

    pub(crate) fn tx_control_or<'a>(&'a self, default: &'a TxControl) -> &'a TxControl {
        self.tx_control.as_ref().unwrap_or(default)
    }

    pub(crate) fn data_options_over(&self, defaults: &[DataQueryOption]) -> Vec<DataQueryOption> {
        defaults.iter().chain(&self.data_options).cloned().collect()
    }

    pub(crate) fn scan_options_over(&self, defaults: &[ScanQueryOption]) -> Vec<ScanQueryOption> {
        defaults.iter().chain(&self.scan_options).cloned().collect()
    }

    /// Await a single backend call, racing it against cancellation. Failures are mapped.
    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, TableSqlError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TableSqlError::Cancelled),
            res = fut => res.map_err(map_backend_error),
        }
    }
}
