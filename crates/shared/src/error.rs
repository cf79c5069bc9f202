use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    UserRejected,
    Unauthorized,
    Unsupported,
    Disconnected,
    ChainDisconnected,
    Other,
}

impl ProviderErrorCode {
    /// Maps an EIP-1193 / JSON-RPC error code.
    pub fn from_rpc_code(code: i64) -> Self {
        match code {
            4001 => Self::UserRejected,
            4100 => Self::Unauthorized,
            4200 => Self::Unsupported,
            4900 => Self::Disconnected,
            4901 => Self::ChainDisconnected,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?} ({raw_code}): {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub raw_code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(raw_code: i64, message: impl Into<String>) -> Self {
        Self {
            code: ProviderErrorCode::from_rpc_code(raw_code),
            raw_code,
            message: message.into(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == ProviderErrorCode::UserRejected
    }
}
