use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::{DataQueryOption, ScanQueryOption, TxControl};
use crate::conn::ConnectionDefaults;
use crate::error::TableSqlError;
use crate::retry::RetryPolicy;

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Credentials {
    #[default]
    Anonymous,
    AccessToken(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

/// Connector configuration.
///
/// Every field has a default, so a JSON document only needs the keys it changes:
/// ```rust
/// use table_sql_middleware::ConnectorOptions;
///
/// let opts = ConnectorOptions::from_json(
///     r#"{ "endpoint": "grpcs://db.example:2135", "database": "/prod/main",
///          "retry": { "max_attempts": 5 } }"#,
/// )?;
/// assert_eq!(opts.retry.max_attempts, Some(5));
/// # Ok::<(), table_sql_middleware::TableSqlError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorOptions {
    pub connection_string: Option<String>,
    pub endpoint: Option<String>,
    pub database: Option<String>,
    pub credentials: Credentials,
    /// Control block for data queries outside a transaction.
    pub default_tx_control: TxControl,
    pub data_query_options: Vec<DataQueryOption>,
    pub scan_query_options: Vec<ScanQueryOption>,
    pub retry: RetryPolicy,
}

impl ConnectorOptions {
    #[must_use]
    pub fn builder() -> ConnectorOptionsBuilder {
        ConnectorOptionsBuilder::default()
    }

    /// # Errors
    ///
    /// Returns [`TableSqlError::ConfigError`] for malformed JSON, unknown enum values or a
    /// retry policy rejected by [`RetryPolicy::validate`].
    pub fn from_json(text: &str) -> Result<Self, TableSqlError> {
        let options: Self = serde_json::from_str(text)
            .map_err(|e| TableSqlError::ConfigError(format!("invalid connector options: {e}")))?;
        options.retry.validate()?;
        Ok(options)
    }

    #[must_use]
    pub fn connection_defaults(&self) -> ConnectionDefaults {
        ConnectionDefaults {
            tx_control: self.default_tx_control.clone(),
            data_options: self.data_query_options.clone(),
            scan_options: self.scan_query_options.clone(),
        }
    }
}

/// Fluent builder for [`ConnectorOptions`].
#[derive(Debug, Clone, Default)]
pub struct ConnectorOptionsBuilder {
    opts: ConnectorOptions,
}

impl ConnectorOptionsBuilder {
    #[must_use]
    pub fn connection_string(mut self, dsn: impl Into<String>) -> Self {
        self.opts.connection_string = Some(dsn.into());
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.opts.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.opts.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.opts.credentials = Credentials::AccessToken(token.into());
        self
    }

    #[must_use]
    pub fn anonymous_credentials(mut self) -> Self {
        self.opts.credentials = Credentials::Anonymous;
        self
    }

    #[must_use]
    pub fn default_tx_control(mut self, control: TxControl) -> Self {
        self.opts.default_tx_control = control;
        self
    }

    #[must_use]
    pub fn data_query_option(mut self, option: DataQueryOption) -> Self {
        self.opts.data_query_options.push(option);
        self
    }

    #[must_use]
    pub fn scan_query_option(mut self, option: ScanQueryOption) -> Self {
        self.opts.scan_query_options.push(option);
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.opts.retry = policy;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectorOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::{StatsMode, TxSettings};

    #[test]
    fn json_fills_in_defaults() {
        let opts = ConnectorOptions::from_json(r#"{ "database": "/local" }"#).expect("parse");
        assert_eq!(opts.database.as_deref(), Some("/local"));
        assert_eq!(opts.default_tx_control, TxControl::default());
        assert_eq!(opts.retry, RetryPolicy::default());
    }

    #[test]
    fn json_accepts_nested_settings() {
        let opts = ConnectorOptions::from_json(
            r#"{
                "credentials": { "kind": "access_token", "value": "secret" },
                "default_tx_control": {
                    "selector": { "begin": { "online_read_only": { "allow_inconsistent_reads": true } } },
                    "commit": true
                },
                "data_query_options": [ { "keep_in_cache": true }, { "collect_stats": "full" } ],
                "retry": { "fast": { "slot": { "secs": 0, "nanos": 1000000 }, "ceiling": 3, "jitter_limit": 1.0 } }
            }"#,
        )
        .expect("parse");
        assert_eq!(
            opts.default_tx_control.settings(),
            Some(TxSettings::OnlineReadOnly {
                allow_inconsistent_reads: true
            })
        );
        assert_eq!(
            opts.data_query_options,
            vec![
                DataQueryOption::KeepInCache(true),
                DataQueryOption::CollectStats(StatsMode::Full)
            ]
        );
        assert_eq!(opts.retry.fast.slot, Duration::from_millis(1));
        assert!(!format!("{:?}", opts.credentials).contains("secret"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ConnectorOptions::from_json("{ not json").unwrap_err();
        assert!(matches!(err, TableSqlError::ConfigError(_)));
    }

    #[test]
    fn json_rejects_unusable_retry_values() {
        let negative_jitter = r#"{ "retry": { "slow": { "slot": { "secs": 1, "nanos": 0 }, "ceiling": 6, "jitter_limit": -1.0 } } }"#;
        let err = ConnectorOptions::from_json(negative_jitter).unwrap_err();
        assert!(matches!(&err, TableSqlError::ConfigError(msg) if msg.contains("slow")));

        let zero_budget = r#"{ "retry": { "max_attempts": 0 } }"#;
        let err = ConnectorOptions::from_json(zero_budget).unwrap_err();
        assert!(matches!(&err, TableSqlError::ConfigError(msg) if msg.contains("max_attempts")));

        let ok = ConnectorOptions::from_json(r#"{ "retry": { "max_attempts": 1 } }"#).expect("parse");
        assert_eq!(ok.retry.max_attempts, Some(1));
    }

    #[test]
    fn builder_accumulates() {
        let opts = ConnectorOptions::builder()
            .endpoint("grpc://localhost:2136")
            .database("/local")
            .data_query_option(DataQueryOption::KeepInCache(true))
            .scan_query_option(ScanQueryOption::CollectStats(StatsMode::Basic))
            .finish();
        let defaults = opts.connection_defaults();
        assert_eq!(defaults.data_options.len(), 1);
        assert_eq!(defaults.scan_options.len(), 1);
    }
}
