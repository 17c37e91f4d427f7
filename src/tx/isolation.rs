use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::backend::{TxControl, TxSettings};
use crate::error::TableSqlError;

/// Isolation level a caller may request when beginning a transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

impl IsolationLevel {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::ReadUncommitted => "Read Uncommitted",
            Self::ReadCommitted => "Read Committed",
            Self::WriteCommitted => "Write Committed",
            Self::RepeatableRead => "Repeatable Read",
            Self::Snapshot => "Snapshot",
            Self::Serializable => "Serializable",
            Self::Linearizable => "Linearizable",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    #[must_use]
    pub fn new(isolation: IsolationLevel) -> Self {
        Self {
            isolation,
            read_only: false,
        }
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// How a requested transaction is realized on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStrategy {
    /// Open a server-side transaction with these settings.
    Explicit(TxSettings),
    /// No server-side transaction; every statement carries this control block.
    PerCall(TxControl),
}

/// Map caller transaction options onto a backend strategy.
///
/// # Errors
///
/// Returns [`TableSqlError::UnsupportedIsolation`] for combinations the backend cannot honor.
pub fn resolve(opts: TxOptions) -> Result<TxStrategy, TableSqlError> {
    match (opts.isolation, opts.read_only) {
        (IsolationLevel::Default | IsolationLevel::Serializable | IsolationLevel::Linearizable, _) => {
            Ok(TxStrategy::Explicit(TxSettings::SerializableReadWrite))
        }
        (IsolationLevel::ReadUncommitted, true) => Ok(TxStrategy::PerCall(
            TxControl::begin(TxSettings::OnlineReadOnly {
                allow_inconsistent_reads: true,
            })
            .with_commit(),
        )),
        (IsolationLevel::ReadCommitted, true) => Ok(TxStrategy::PerCall(
            TxControl::begin(TxSettings::OnlineReadOnly {
                allow_inconsistent_reads: false,
            })
            .with_commit(),
        )),
        (level, read_only) => Err(TableSqlError::UnsupportedIsolation { level, read_only }),
    }
}
