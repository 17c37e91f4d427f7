pub mod result_set;
pub mod row;

pub use result_set::ResultSet;
pub use row::Row;

use crate::error::TableSqlError;

/// Outcome of `exec`. The table service reports neither counter for data or scheme queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: Option<u64>,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    #[must_use]
    pub fn new(rows_affected: Option<u64>, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    /// # Errors
    ///
    /// [`TableSqlError::Unsupported`] unless the backend reported the count.
    pub fn rows_affected(&self) -> Result<u64, TableSqlError> {
        self.rows_affected
            .ok_or(TableSqlError::Unsupported("rows affected"))
    }

    /// # Errors
    ///
    /// [`TableSqlError::Unsupported`] unless the backend reported an id.
    pub fn last_insert_id(&self) -> Result<i64, TableSqlError> {
        self.last_insert_id
            .ok_or(TableSqlError::Unsupported("last insert id"))
    }
}
