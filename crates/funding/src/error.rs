use ledger_client::error::{EncodeError, MetadataError};
use thiserror::Error;

use crate::contracts::ContractName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WadError {
    #[error("amount is empty")]
    Empty,
    #[error("'{0}' is not a decimal amount")]
    Invalid(String),
    #[error("'{0}' has more than 18 fractional digits")]
    TooPrecise(String),
    #[error("'{0}' is too large")]
    Overflow(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractsError {
    #[error("no address configured for {0}")]
    Missing(ContractName),
    #[error("unknown contract name '{0}'")]
    UnknownName(String),
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("project name is required")]
    MissingName,
    #[error("invalid project handle: {0}")]
    InvalidHandle(#[source] EncodeError),
    #[error(transparent)]
    Contracts(#[from] ContractsError),
    #[error("failed to serialize project metadata: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to upload project metadata: {0}")]
    Metadata(#[from] MetadataError),
}
