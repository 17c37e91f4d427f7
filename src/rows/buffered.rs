use std::collections::VecDeque;

use crate::backend::{QueryResult, ResultSetData, Value};

/// Fully materialized multi-result-set response of a data query.
///
/// Positioned on the first result set when created.
#[derive(Debug, Clone, Default)]
pub struct BufferedRows {
    current: Option<ResultSetData>,
    cursor: VecDeque<Vec<Value>>,
    remaining: VecDeque<ResultSetData>,
}

impl BufferedRows {
    #[must_use]
    pub fn new(result: QueryResult) -> Self {
        let mut rows = Self {
            current: None,
            cursor: VecDeque::new(),
            remaining: result.result_sets.into(),
        };
        rows.advance();
        rows
    }

    fn advance(&mut self) -> bool {
        match self.remaining.pop_front() {
            Some(mut set) => {
                self.cursor = std::mem::take(&mut set.rows).into();
                self.current = Some(set);
                true
            }
            None => {
                self.current = None;
                self.cursor.clear();
                false
            }
        }
    }

    /// Column names of the current result set; empty once every set is consumed.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.current
            .as_ref()
            .map(ResultSetData::column_names)
            .unwrap_or_default()
    }

    pub fn next_row(&mut self) -> Option<Vec<Value>> {
        self.cursor.pop_front()
    }

    /// Move to the following result set. `false` at the end, never an error.
    pub fn next_result_set(&mut self) -> bool {
        self.advance()
    }

    #[must_use]
    pub fn has_next_result_set(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Whether the current result set was cut short by the backend.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.current.as_ref().is_some_and(|set| set.truncated)
    }
}
