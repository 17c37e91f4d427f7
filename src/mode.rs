use std::fmt;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reserved comment token that selects a query mode from inside the query text.
pub const DIRECTIVE_PREFIX: &str = "--mode:";

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"--mode:[ \t]*([A-Za-z]+)").expect("mode directive pattern is valid")
});

/// Execution channel a query is routed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Transactional data query (DML / SELECT).
    #[default]
    Data,
    /// Read-only streaming scan.
    Scan,
    /// Schema definition (DDL).
    Scheme,
    /// Plan without executing.
    Explain,
}

impl QueryMode {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Scan => "SCAN",
            Self::Scheme => "SCHEME",
            Self::Explain => "EXPLAIN",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decide the mode for `query`.
///
/// An explicit override wins. Otherwise the first `--mode:` directive in the text selects
/// the mode by name, case-insensitively; a missing or unknown name means [`QueryMode::Data`].
#[must_use]
pub fn classify(query: &str, explicit: Option<QueryMode>) -> QueryMode {
    if let Some(mode) = explicit {
        return mode;
    }
    DIRECTIVE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|name| QueryMode::from_str(name.as_str(), true).ok())
        .unwrap_or_default()
}

fn with_directive(mode: QueryMode, query: &str) -> String {
    format!("{DIRECTIVE_PREFIX}{mode}\n{query}")
}

#[must_use]
pub fn data_query(query: &str) -> String {
    with_directive(QueryMode::Data, query)
}

#[must_use]
pub fn scan_query(query: &str) -> String {
    with_directive(QueryMode::Scan, query)
}

#[must_use]
pub fn scheme_query(query: &str) -> String {
    with_directive(QueryMode::Scheme, query)
}

#[must_use]
pub fn explain_query(query: &str) -> String {
    with_directive(QueryMode::Explain, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_data() {
        assert_eq!(classify("SELECT 1", None), QueryMode::Data);
        assert_eq!(classify("", None), QueryMode::Data);
    }

    #[test]
    fn directive_selects_mode() {
        assert_eq!(classify("--mode:SCAN\nSELECT 1", None), QueryMode::Scan);
        assert_eq!(classify("--mode:scheme\nCREATE TABLE t", None), QueryMode::Scheme);
        assert_eq!(classify("--mode: Explain\nSELECT 1", None), QueryMode::Explain);
        assert_eq!(
            classify("-- leading note\n--mode:DATA\nSELECT 1", None),
            QueryMode::Data
        );
    }

    #[test]
    fn unknown_directive_falls_back_to_data() {
        assert_eq!(classify("--mode:BULK\nSELECT 1", None), QueryMode::Data);
        assert_eq!(classify("--mode:\nSELECT 1", None), QueryMode::Data);
    }

    #[test]
    fn override_beats_directive() {
        assert_eq!(
            classify("--mode:SCAN\nSELECT 1", Some(QueryMode::Explain)),
            QueryMode::Explain
        );
    }

    #[test]
    fn helpers_round_through_classifier() {
        assert_eq!(classify(&scan_query("SELECT 1"), None), QueryMode::Scan);
        assert_eq!(classify(&scheme_query("DROP TABLE t"), None), QueryMode::Scheme);
        assert_eq!(classify(&explain_query("SELECT 1"), None), QueryMode::Explain);
        assert_eq!(classify(&data_query("SELECT 1"), None), QueryMode::Data);
    }

    #[test]
    fn parses_like_a_cli_value() {
        assert_eq!(QueryMode::from_str("scan", true), Ok(QueryMode::Scan));
        assert!(QueryMode::from_str("bulk", true).is_err());
    }
}
