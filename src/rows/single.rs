use crate::backend::{Explanation, Value};

/// Exactly one row of fixed, ordered, named values.
#[derive(Debug, Clone)]
pub struct SingleRow {
    columns: Vec<String>,
    values: Option<Vec<Value>>,
}

impl SingleRow {
    #[must_use]
    pub fn new(named: Vec<(String, Value)>) -> Self {
        let (columns, values) = named.into_iter().unzip();
        Self {
            columns,
            values: Some(values),
        }
    }

    /// `AST` and `Plan` columns of an explain request.
    #[must_use]
    pub fn explanation(explanation: Explanation) -> Self {
        Self::new(vec![
            ("AST".to_owned(), Value::Utf8(explanation.ast)),
            ("Plan".to_owned(), Value::Utf8(explanation.plan)),
        ])
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn next_row(&mut self) -> Option<Vec<Value>> {
        self.values.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_once() {
        let mut row = SingleRow::explanation(Explanation {
            ast: "(select)".into(),
            plan: "{}".into(),
        });
        assert_eq!(row.columns(), ["AST", "Plan"]);
        let values = row.next_row().expect("one row");
        assert_eq!(values[0], Value::Utf8("(select)".into()));
        assert!(row.next_row().is_none());
    }
}
