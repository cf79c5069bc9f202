use std::fmt;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// On-ledger project number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub u64);

impl ProjectId {
    pub fn as_u256(self) -> U256 {
        U256::from(self.0)
    }

    /// Indexed event topic carrying this id.
    pub fn topic(self) -> B256 {
        B256::from(self.as_u256().to_be_bytes::<32>())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An addressable contract exposing named operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub label: String,
    pub address: Address,
}

impl Endpoint {
    pub fn new(label: impl Into<String>, address: Address) -> Self {
        Self {
            label: label.into(),
            address,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.label, self.address)
    }
}
