//! Operation kinds and their selection weights.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of simulated business work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
    Transaction,
}

impl OperationKind {
    /// All kinds, in reporting order.
    pub const ALL: [Self; 3] = [Self::Read, Self::Write, Self::Transaction];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Transaction => "transaction",
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::Transaction => 2,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative selection weights for each operation kind.
///
/// Valid weights sum to exactly 100; [`OperationWeights::total`] is checked
/// during configuration validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationWeights {
    pub read: u32,
    pub write: u32,
    pub transaction: u32,
}

impl OperationWeights {
    pub const REQUIRED_TOTAL: u32 = 100;

    #[must_use]
    pub const fn new(read: u32, write: u32, transaction: u32) -> Self {
        Self {
            read,
            write,
            transaction,
        }
    }

    #[must_use]
    pub const fn get(&self, kind: OperationKind) -> u32 {
        match kind {
            OperationKind::Read => self.read,
            OperationKind::Write => self.write,
            OperationKind::Transaction => self.transaction,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.read
            .saturating_add(self.write)
            .saturating_add(self.transaction)
    }
}

impl Default for OperationWeights {
    fn default() -> Self {
        Self::new(70, 20, 10)
    }
}
