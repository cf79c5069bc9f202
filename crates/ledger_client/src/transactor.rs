//! Submission of state-changing calls through a signing connection.
//!
//! [`Transactor::submit`] reports progress through a [`TxObserver`]: `Done`
//! when the signer accepts the call (or immediately when there is no signer),
//! then at most one terminal `Confirmed` or `Cancelled`. Terminal delivery
//! consumes the observer, so a request can never be notified twice.

use std::{fmt, sync::Arc};

use alloy_primitives::{Address, B256, U256};
use shared::{
    domain::Endpoint,
    protocol::{CallArg, TransactionReceipt},
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    abi::encode_call,
    error::{EncodeError, SubmitError},
    provider::{SigningConnection, TxCall},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Native value attached to the call.
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    pub endpoint: Endpoint,
    pub operation: String,
    pub args: Vec<CallArg>,
    pub options: TxOptions,
}

impl TransactionRequest {
    pub fn new(endpoint: Endpoint, operation: impl Into<String>, args: Vec<CallArg>) -> Self {
        Self {
            endpoint,
            operation: operation.into(),
            args,
            options: TxOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    fn label(&self) -> String {
        format!("{}.{}", self.endpoint.label, self.operation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelReason {
    Encoding(EncodeError),
    Rejected(String),
    Failed(String),
    Reverted { transaction_hash: B256 },
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding(err) => write!(f, "arguments could not be encoded: {err}"),
            Self::Rejected(message) => write!(f, "rejected by signer: {message}"),
            Self::Failed(message) => write!(f, "failed: {message}"),
            Self::Reverted { transaction_hash } => write!(f, "reverted: {transaction_hash}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxLifecycle {
    Done,
    Confirmed(TransactionReceipt),
    Cancelled(CancelReason),
}

type Notify = Box<dyn FnMut(TxLifecycle) + Send>;

/// Caller-side sink for lifecycle notifications of one request.
pub struct TxObserver {
    notify: Notify,
    done_sent: bool,
}

impl TxObserver {
    pub fn new(notify: impl FnMut(TxLifecycle) + Send + 'static) -> Self {
        Self {
            notify: Box::new(notify),
            done_sent: false,
        }
    }

    /// Observer forwarding every notification into a channel. The receiver
    /// closes once the terminal notification has been delivered.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TxLifecycle>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Self::new(move |event| {
            let _ = tx.send(event);
        });
        (observer, rx)
    }

    pub fn ignore() -> Self {
        Self::new(|_| {})
    }

    fn done(&mut self) {
        if !self.done_sent {
            self.done_sent = true;
            (self.notify)(TxLifecycle::Done);
        }
    }

    fn confirm(mut self, receipt: TransactionReceipt) {
        (self.notify)(TxLifecycle::Confirmed(receipt));
    }

    fn cancel(mut self, reason: CancelReason) {
        (self.notify)(TxLifecycle::Cancelled(reason));
    }
}

impl fmt::Debug for TxObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxObserver")
            .field("done_sent", &self.done_sent)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Transactor {
    signer: Option<Arc<dyn SigningConnection>>,
}

impl Transactor {
    pub fn new(signer: Option<Arc<dyn SigningConnection>>) -> Self {
        Self { signer }
    }

    pub fn disconnected() -> Self {
        Self { signer: None }
    }

    pub fn is_connected(&self) -> bool {
        self.signer.is_some()
    }

    pub fn account(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.account())
    }

    /// Hands the request to the signing connection.
    ///
    /// Returns `true` once the signer has accepted the transaction; that is
    /// not a confirmation. Confirmation is awaited on a spawned task and
    /// reported through the observer.
    pub async fn submit(&self, request: TransactionRequest, mut observer: TxObserver) -> bool {
        let label = request.label();

        let Some(signer) = self.signer.clone() else {
            info!("transactor: no provider, {label} not submitted");
            observer.done();
            return false;
        };

        let data = match encode_call(&request.operation, &request.args) {
            Ok(data) => data,
            Err(err) => {
                warn!("transactor: {label} arguments rejected: {err}");
                observer.cancel(CancelReason::Encoding(err));
                return false;
            }
        };

        let call = TxCall {
            to: request.endpoint.address,
            data,
            value: request.options.value,
            gas_limit: request.options.gas_limit,
            max_fee_per_gas: request.options.max_fee_per_gas,
            max_priority_fee_per_gas: request.options.max_priority_fee_per_gas,
        };

        match signer.send_transaction(call).await {
            Ok(hash) => {
                info!("transactor: {label} pending hash={hash}");
                observer.done();
                tokio::spawn(await_confirmation(signer, hash, label, observer));
                true
            }
            Err(SubmitError::Rejected(message)) => {
                info!("transactor: {label} rejected by signer: {message}");
                observer.cancel(CancelReason::Rejected(message));
                false
            }
            Err(err) => {
                warn!("transactor: {label} submission failed: {err}");
                observer.cancel(CancelReason::Failed(err.to_string()));
                false
            }
        }
    }
}

impl fmt::Debug for Transactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transactor")
            .field("account", &self.account())
            .finish()
    }
}

async fn await_confirmation(
    signer: Arc<dyn SigningConnection>,
    hash: B256,
    label: String,
    observer: TxObserver,
) {
    match signer.wait_for_receipt(hash).await {
        Ok(receipt) if receipt.status => {
            info!(
                "transactor: {label} confirmed hash={hash} block={:?}",
                receipt.block_number
            );
            observer.confirm(receipt);
        }
        Ok(receipt) => {
            warn!("transactor: {label} reverted hash={hash}");
            observer.cancel(CancelReason::Reverted {
                transaction_hash: receipt.transaction_hash,
            });
        }
        Err(err) => {
            warn!("transactor: {label} confirmation failed hash={hash}: {err}");
            observer.cancel(CancelReason::Failed(err.to_string()));
        }
    }
}

#[cfg(test)]
#[path = "tests/transactor_tests.rs"]
mod tests;
