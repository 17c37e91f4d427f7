use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Level of execution statistics the backend collects for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsMode {
    #[default]
    None,
    Basic,
    Full,
    Profile,
}

/// Per-call options for data queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQueryOption {
    KeepInCache(bool),
    CollectStats(StatsMode),
    OperationTimeout(Duration),
}

/// Per-call options for scan queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanQueryOption {
    CollectStats(StatsMode),
}

/// Options accepted by scheme (DDL) execution. Passed as query arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeOption {
    OperationTimeout(Duration),
    CancelAfter(Duration),
}
