use std::collections::VecDeque;
use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::backend::{ScanStream, Value};
use crate::error::{TableSqlError, map_backend_error};

/// Rows pulled lazily from a live scan stream.
///
/// Parts are fetched on demand and belong to a single implicit result set. Column order
/// follows the first part and is unspecified for wildcard projections.
pub struct StreamRows {
    stream: Box<dyn ScanStream>,
    cancel: CancellationToken,
    columns: Vec<String>,
    buffered: VecDeque<Vec<Value>>,
    drained: bool,
}

impl fmt::Debug for StreamRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRows")
            .field("columns", &self.columns)
            .field("buffered", &self.buffered.len())
            .field("drained", &self.drained)
            .finish_non_exhaustive()
    }
}

impl StreamRows {
    /// Wrap `stream`, reading the first part so the columns are known up front.
    pub(crate) async fn open(
        stream: Box<dyn ScanStream>,
        cancel: CancellationToken,
    ) -> Result<Self, TableSqlError> {
        let mut rows = Self {
            stream,
            cancel,
            columns: Vec::new(),
            buffered: VecDeque::new(),
            drained: false,
        };
        if let Err(err) = rows.fetch_part().await {
            if let Err(close_err) = rows.stream.close().await {
                warn!(error = %close_err, "closing scan stream after failed first part");
            }
            return Err(err);
        }
        Ok(rows)
    }

    async fn fetch_part(&mut self) -> Result<bool, TableSqlError> {
        if self.drained {
            return Ok(false);
        }
        let part = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(TableSqlError::Cancelled),
            part = self.stream.next_part() => part.map_err(map_backend_error)?,
        };
        match part {
            Some(part) => {
                if self.columns.is_empty() {
                    self.columns = part.column_names();
                }
                self.buffered.extend(part.rows);
                Ok(true)
            }
            None => {
                self.drained = true;
                Ok(false)
            }
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// # Errors
    ///
    /// [`TableSqlError::Cancelled`] when the scan's context is cancelled while waiting for a
    /// part; stream failures are mapped like any backend failure.
    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>, TableSqlError> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Ok(Some(row));
            }
            if !self.fetch_part().await? {
                return Ok(None);
            }
        }
    }

    /// # Errors
    ///
    /// Mapped backend failure from closing the stream.
    pub async fn close(mut self) -> Result<(), TableSqlError> {
        self.stream.close().await.map_err(map_backend_error)
    }
}
