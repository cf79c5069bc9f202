use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::protocol::{LogRecord, TransactionReceipt};

use crate::{
    abi::event_topic,
    error::{ReadError, SubmitError},
};

/// Positional topic constraint of a log filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    Any,
    Exact(B256),
    OneOf(Vec<B256>),
}

impl TopicFilter {
    pub fn matches(&self, topic: Option<&B256>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => topic == Some(expected),
            Self::OneOf(candidates) => topic.is_some_and(|topic| candidates.contains(topic)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    /// `topics[0]` is the event topic; the rest follow indexed parameters.
    pub topics: Vec<TopicFilter>,
}

impl LogFilter {
    pub fn event(address: Address, event_signature: &str) -> Self {
        Self {
            address,
            topics: vec![TopicFilter::Exact(event_topic(event_signature))],
        }
    }

    pub fn with_indexed(mut self, indexed: impl IntoIterator<Item = TopicFilter>) -> Self {
        self.topics.extend(indexed);
        self
    }

    pub fn matches(&self, log: &LogRecord) -> bool {
        log.address == self.address
            && self
                .topics
                .iter()
                .enumerate()
                .all(|(idx, filter)| filter.matches(log.topics.get(idx)))
    }
}

/// A state-changing call handed to the signing agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCall {
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

#[async_trait]
pub trait ReadEndpoint: Send + Sync {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ReadError>;
}

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self, filter: LogFilter) -> Result<BoxStream<'static, LogRecord>, ReadError>;
}

#[async_trait]
pub trait SigningConnection: Send + Sync {
    fn account(&self) -> Address;
    async fn send_transaction(&self, call: TxCall) -> Result<B256, SubmitError>;
    async fn wait_for_receipt(&self, hash: B256) -> Result<TransactionReceipt, SubmitError>;
}

pub struct MissingEventSource;

#[async_trait]
impl EventSource for MissingEventSource {
    async fn subscribe(&self, _filter: LogFilter) -> Result<BoxStream<'static, LogRecord>, ReadError> {
        Err(ReadError::Unavailable("event source is unavailable".into()))
    }
}
