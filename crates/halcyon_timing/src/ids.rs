//! Opaque ID newtype for timing graph nodes.

use serde::{Deserialize, Serialize};

/// Opaque, copyable ID for a node in the timing graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TimingNodeId(u32);

impl TimingNodeId {
    /// Creates an ID from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize` for arena access.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TimingNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
