pub mod abi;
pub mod error;
pub mod metadata;
pub mod provider;
pub mod reader;
pub mod rpc;
pub mod transactor;

pub use error::{DecodeError, EncodeError, MetadataError, ReadError, RpcError, SubmitError};
pub use provider::{EventSource, LogFilter, ReadEndpoint, SigningConnection, TopicFilter};
pub use reader::{RefreshTrigger, StateReader, WatchedValue};
pub use transactor::{
    CancelReason, TransactionRequest, Transactor, TxLifecycle, TxObserver, TxOptions,
};
