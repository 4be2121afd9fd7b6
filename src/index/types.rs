//! Core types for the per-type index

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense document number within an index, assigned in commit order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocNo(pub u32);

impl DocNo {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DocNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc_{}", self.0)
    }
}

/// Parsed value of a Numeric or DateTime field
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Number(f64),
    /// Epoch milliseconds, UTC
    DateTime(i64),
}

impl FieldValue {
    /// Value on a common numeric axis for range checks
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Number(n) => *n,
            FieldValue::DateTime(ms) => *ms as f64,
        }
    }
}

/// Outcome of a successful commit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Generation of the snapshot now visible to readers
    pub generation: u64,
    pub added: usize,
    pub deleted: usize,
    pub doc_count: u64,
    /// False when nothing was staged and the commit was a no-op
    pub flushed: bool,
}
