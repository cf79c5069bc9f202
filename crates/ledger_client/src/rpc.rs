use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_json_rpc::{Id, Request, Response, ResponsePayload};
use alloy_primitives::{Address, Bytes, B256, U64};
use alloy_rpc_types_eth::{
    Filter, Log, Topic, TransactionInput, TransactionReceipt as RpcReceipt, TransactionRequest,
};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{
    error::ProviderError,
    protocol::{LogRecord, TransactionReceipt},
};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{ReadError, RpcError, SubmitError},
    provider::{EventSource, LogFilter, ReadEndpoint, SigningConnection, TopicFilter, TxCall},
};

const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub request_timeout: Duration,
    pub log_poll_interval: Duration,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            log_poll_interval: Duration::from_secs(4),
            receipt_poll_interval: Duration::from_secs(1),
            receipt_timeout: Duration::from_secs(300),
        }
    }
}

fn log_record(log: Log) -> LogRecord {
    let topics = log.inner.data.topics().to_vec();
    LogRecord {
        address: log.inner.address,
        topics,
        data: log.inner.data.data,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    }
}

fn receipt_record(receipt: RpcReceipt) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        status: receipt.inner.status(),
        logs: receipt.inner.logs().iter().cloned().map(log_record).collect(),
    }
}

fn topic_set(topic: &TopicFilter) -> Topic {
    match topic {
        TopicFilter::Any => Topic::default(),
        TopicFilter::Exact(hash) => Topic::from(*hash),
        TopicFilter::OneOf(hashes) => Topic::from(hashes.clone()),
    }
}

/// JSON-RPC 2.0 client over HTTP.
pub struct JsonRpcClient {
    http: Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, RpcError> {
        let url = Url::parse(url)?;
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method.to_string(), Id::Number(id), params);

        let response: Response = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.payload {
            ResponsePayload::Success(raw) => serde_json::from_str(raw.get())
                .map_err(|err| RpcError::InvalidResponse(format!("{method}: {err}"))),
            ResponsePayload::Failure(error) => {
                Err(ProviderError::new(error.code, error.message.to_string()).into())
            }
        }
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let number: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    pub async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogRecord>, RpcError> {
        let mut query = Filter::new()
            .address(filter.address)
            .from_block(from_block)
            .to_block(to_block);
        for (slot, topic) in query.topics.iter_mut().zip(&filter.topics) {
            *slot = topic_set(topic);
        }

        let logs: Vec<Log> = self.request("eth_getLogs", json!([query])).await?;
        Ok(logs.into_iter().map(log_record).collect())
    }

    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(receipt.map(receipt_record))
    }
}

/// Read endpoint and event source backed by a ledger node.
pub struct RpcProvider {
    client: Arc<JsonRpcClient>,
    config: ProviderConfig,
}

impl RpcProvider {
    pub fn connect(url: &str, config: ProviderConfig) -> Result<Self, RpcError> {
        let client = JsonRpcClient::new(url, config.request_timeout)?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    pub fn client(&self) -> Arc<JsonRpcClient> {
        Arc::clone(&self.client)
    }

    /// Signing connection for an account managed by the node or wallet.
    pub fn signer(&self, account: Address) -> RpcSigner {
        RpcSigner {
            client: Arc::clone(&self.client),
            account,
            receipt_poll_interval: self.config.receipt_poll_interval,
            receipt_timeout: self.config.receipt_timeout,
        }
    }
}

#[async_trait]
impl ReadEndpoint for RpcProvider {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ReadError> {
        let call = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::both(data));
        let result: Bytes = self
            .client
            .request("eth_call", json!([call, "latest"]))
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl EventSource for RpcProvider {
    async fn subscribe(&self, filter: LogFilter) -> Result<BoxStream<'static, LogRecord>, ReadError> {
        let head = self.client.block_number().await?;
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        tokio::spawn(poll_logs(
            Arc::clone(&self.client),
            filter,
            head + 1,
            self.config.log_poll_interval,
            tx,
        ));
        Ok(ReceiverStream::new(rx).boxed())
    }
}

async fn poll_logs(
    client: Arc<JsonRpcClient>,
    filter: LogFilter,
    mut next_block: u64,
    every: Duration,
    tx: mpsc::Sender<LogRecord>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            debug!("rpc: log subscriber gone address={}", filter.address);
            return;
        }

        let head = match client.block_number().await {
            Ok(head) => head,
            Err(err) => {
                warn!("rpc: block number poll failed: {err}");
                continue;
            }
        };
        if head < next_block {
            continue;
        }

        match client.get_logs(&filter, next_block, head).await {
            Ok(logs) => {
                for log in logs.into_iter().filter(|log| filter.matches(log)) {
                    if tx.send(log).await.is_err() {
                        return;
                    }
                }
                next_block = head + 1;
            }
            Err(err) => warn!(
                "rpc: log poll failed address={} from={next_block} to={head}: {err}",
                filter.address
            ),
        }
    }
}

pub struct RpcSigner {
    client: Arc<JsonRpcClient>,
    account: Address,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

fn transaction_object(from: Address, call: &TxCall) -> TransactionRequest {
    let mut tx = TransactionRequest::default()
        .from(from)
        .to(call.to)
        .input(TransactionInput::both(call.data.clone()));
    if let Some(value) = call.value {
        tx = tx.value(value);
    }
    if let Some(gas) = call.gas_limit {
        tx = tx.gas_limit(gas);
    }
    if let Some(fee) = call.max_fee_per_gas {
        tx = tx.max_fee_per_gas(fee);
    }
    if let Some(tip) = call.max_priority_fee_per_gas {
        tx = tx.max_priority_fee_per_gas(tip);
    }
    tx
}

#[async_trait]
impl SigningConnection for RpcSigner {
    fn account(&self) -> Address {
        self.account
    }

    async fn send_transaction(&self, call: TxCall) -> Result<B256, SubmitError> {
        let hash: B256 = self
            .client
            .request(
                "eth_sendTransaction",
                json!([transaction_object(self.account, &call)]),
            )
            .await
            .map_err(SubmitError::from_rpc)?;
        info!("rpc: transaction accepted hash={hash} to={}", call.to);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TransactionReceipt, SubmitError> {
        let poll = async {
            loop {
                match self.client.transaction_receipt(hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(err) => warn!("rpc: receipt poll failed hash={hash}: {err}"),
                }
                tokio::time::sleep(self.receipt_poll_interval).await;
            }
        };

        tokio::time::timeout(self.receipt_timeout, poll)
            .await
            .map_err(|_| SubmitError::Timeout {
                hash,
                after: self.receipt_timeout,
            })
    }
}

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod tests;
