use serde::{Deserialize, Serialize};

/// Concurrency settings for a transaction the backend begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxSettings {
    #[default]
    SerializableReadWrite,
    OnlineReadOnly {
        #[serde(default)]
        allow_inconsistent_reads: bool,
    },
    StaleReadOnly,
    SnapshotReadOnly,
}

impl TxSettings {
    #[must_use]
    pub fn is_read_only(self) -> bool {
        !matches!(self, Self::SerializableReadWrite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxSelector {
    /// Begin a new transaction with these settings.
    Begin(TxSettings),
    /// Continue an already-open transaction by id.
    Existing(String),
}

/// Transaction-control block attached to a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxControl {
    pub selector: TxSelector,
    /// Commit once the statement completes.
    pub commit: bool,
}

impl TxControl {
    #[must_use]
    pub fn begin(settings: TxSettings) -> Self {
        Self {
            selector: TxSelector::Begin(settings),
            commit: false,
        }
    }

    pub fn existing(tx_id: impl Into<String>) -> Self {
        Self {
            selector: TxSelector::Existing(tx_id.into()),
            commit: false,
        }
    }

    #[must_use]
    pub fn with_commit(mut self) -> Self {
        self.commit = true;
        self
    }

    /// Settings this control begins with, `None` when it continues an existing transaction.
    #[must_use]
    pub fn settings(&self) -> Option<TxSettings> {
        match &self.selector {
            TxSelector::Begin(settings) => Some(*settings),
            TxSelector::Existing(_) => None,
        }
    }
}

impl Default for TxControl {
    /// Serializable read-write, committed with the statement.
    fn default() -> Self {
        Self::begin(TxSettings::SerializableReadWrite).with_commit()
    }
}
