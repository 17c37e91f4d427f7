//! Result adapters returned by `query`.

pub mod buffered;
pub mod single;
pub mod stream;

pub use buffered::BufferedRows;
pub use single::SingleRow;
pub use stream::StreamRows;

use crate::backend::Value;
use crate::error::TableSqlError;
use crate::results::ResultSet;

#[derive(Debug)]
pub enum Rows {
    /// Explain output.
    Single(SingleRow),
    /// Data query response.
    Buffered(BufferedRows),
    /// Scan query stream.
    Stream(StreamRows),
}

impl Rows {
    /// Column names of the current result set.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        match self {
            Self::Single(rows) => rows.columns().to_vec(),
            Self::Buffered(rows) => rows.columns(),
            Self::Stream(rows) => rows.columns().to_vec(),
        }
    }

    /// Next row of the current result set, `None` when it is exhausted.
    ///
    /// # Errors
    ///
    /// Only streaming rows can fail, see [`StreamRows::next_row`].
    pub async fn next(&mut self) -> Result<Option<Vec<Value>>, TableSqlError> {
        match self {
            Self::Single(rows) => Ok(rows.next_row()),
            Self::Buffered(rows) => Ok(rows.next_row()),
            Self::Stream(rows) => rows.next_row().await,
        }
    }

    /// Advance to the next result set. Single rows and streams have exactly one.
    pub fn next_result_set(&mut self) -> bool {
        match self {
            Self::Buffered(rows) => rows.next_result_set(),
            Self::Single(_) | Self::Stream(_) => false,
        }
    }

    #[must_use]
    pub fn has_next_result_set(&self) -> bool {
        match self {
            Self::Buffered(rows) => rows.has_next_result_set(),
            Self::Single(_) | Self::Stream(_) => false,
        }
    }

    /// Drain the rest of the current result set.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Rows::next`].
    pub async fn collect(&mut self) -> Result<ResultSet, TableSqlError> {
        let mut set = ResultSet::new(self.columns());
        if let Self::Buffered(rows) = self {
            set.truncated = rows.is_truncated();
        }
        while let Some(values) = self.next().await? {
            set.add_row_values(values);
        }
        Ok(set)
    }

    /// Drain every remaining result set.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Rows::next`].
    pub async fn collect_all(&mut self) -> Result<Vec<ResultSet>, TableSqlError> {
        let mut sets = Vec::new();
        loop {
            sets.push(self.collect().await?);
            if !self.next_result_set() {
                return Ok(sets);
            }
        }
    }

    /// Release the rows. Streams are closed on the backend.
    ///
    /// # Errors
    ///
    /// Mapped backend failure from closing a stream.
    pub async fn close(self) -> Result<(), TableSqlError> {
        match self {
            Self::Stream(rows) => rows.close().await,
            Self::Single(_) | Self::Buffered(_) => Ok(()),
        }
    }
}
