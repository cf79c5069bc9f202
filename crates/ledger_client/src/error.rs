use std::time::Duration;

use alloy_primitives::{B256, U256};
use shared::{error::ProviderError, protocol::AbiType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("value {value} does not fit in uint{bits}")]
    Overflow { bits: u16, value: U256 },
    #[error("unsupported integer width uint{0}")]
    InvalidWidth(u16),
    #[error("negative value {0} cannot be encoded as an unsigned integer")]
    Negative(String),
    #[error("invalid unsigned integer literal '{0}'")]
    InvalidLiteral(String),
    #[error("array element type mismatch: expected {expected}, got {actual}")]
    ArrayElementMismatch { expected: AbiType, actual: AbiType },
    #[error("'{0}' does not fit in bytes32")]
    Bytes32TooLong(String),
    #[error("invalid operation name '{0}'")]
    InvalidOperation(String),
    #[error("abi encoding failed: {0}")]
    Abi(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("response too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("invalid {0} word")]
    InvalidWord(&'static str),
    #[error("abi decoding failed: {0}")]
    Abi(String),
}

impl From<alloy_dyn_abi::Error> for DecodeError {
    fn from(err: alloy_dyn_abi::Error) -> Self {
        Self::Abi(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to encode call: {0}")]
    Encode(#[from] EncodeError),
    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("signing request rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("no receipt for {hash} after {after:?}")]
    Timeout { hash: B256, after: Duration },
}

impl SubmitError {
    /// Classifies a provider failure, separating user rejection from other errors.
    pub fn from_rpc(err: RpcError) -> Self {
        match err {
            RpcError::Provider(provider) if provider.is_user_rejection() => {
                Self::Rejected(provider.message)
            }
            other => Self::Rpc(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("metadata store returned an empty content id")]
    EmptyContentId,
    #[error("metadata store is unavailable")]
    Unavailable,
}
