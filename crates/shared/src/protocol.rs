use std::fmt;

use alloy_primitives::{ruint::UintTryFrom, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Canonical ABI type of a call argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "of", rename_all = "snake_case")]
pub enum AbiType {
    Uint(u16),
    Address,
    Bool,
    FixedBytes32,
    String,
    Bytes,
    Tuple(Vec<AbiType>),
    Array(Box<AbiType>),
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Address => f.write_str("address"),
            Self::Bool => f.write_str("bool"),
            Self::FixedBytes32 => f.write_str("bytes32"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::Tuple(components) => {
                f.write_str("(")?;
                for (idx, component) in components.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{component}")?;
                }
                f.write_str(")")
            }
            Self::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// A typed argument for an endpoint operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallArg {
    Uint { bits: u16, value: U256 },
    Address(Address),
    Bool(bool),
    FixedBytes32(B256),
    String(String),
    Bytes(Bytes),
    Tuple(Vec<CallArg>),
    Array { element: AbiType, items: Vec<CallArg> },
}

impl CallArg {
    pub fn uint256<T>(value: T) -> Self
    where
        U256: UintTryFrom<T>,
    {
        Self::uint(256, value)
    }

    /// Width is checked at encoding time, not here.
    pub fn uint<T>(bits: u16, value: T) -> Self
    where
        U256: UintTryFrom<T>,
    {
        Self::Uint {
            bits,
            value: U256::from(value),
        }
    }

    pub fn array(element: AbiType, items: Vec<CallArg>) -> Self {
        Self::Array { element, items }
    }

    pub fn abi_type(&self) -> AbiType {
        match self {
            Self::Uint { bits, .. } => AbiType::Uint(*bits),
            Self::Address(_) => AbiType::Address,
            Self::Bool(_) => AbiType::Bool,
            Self::FixedBytes32(_) => AbiType::FixedBytes32,
            Self::String(_) => AbiType::String,
            Self::Bytes(_) => AbiType::Bytes,
            Self::Tuple(components) => {
                AbiType::Tuple(components.iter().map(CallArg::abi_type).collect())
            }
            Self::Array { element, .. } => AbiType::Array(Box::new(element.clone())),
        }
    }
}

impl From<U256> for CallArg {
    fn from(value: U256) -> Self {
        Self::uint256(value)
    }
}

impl From<u64> for CallArg {
    fn from(value: u64) -> Self {
        Self::uint256(U256::from(value))
    }
}

impl From<Address> for CallArg {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<bool> for CallArg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<B256> for CallArg {
    fn from(value: B256) -> Self {
        Self::FixedBytes32(value)
    }
}

impl From<&str> for CallArg {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CallArg {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// An event record emitted by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
}

/// The ledger's record that a submitted write was finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub status: bool,
    pub logs: Vec<LogRecord>,
}

impl TransactionReceipt {
    pub fn topic(&self, log_index: usize, topic_index: usize) -> Option<B256> {
        self.logs.get(log_index)?.topics.get(topic_index).copied()
    }
}
