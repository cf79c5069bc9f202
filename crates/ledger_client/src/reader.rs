//! Typed, self-refreshing views over endpoint read operations.
//!
//! A reader owns one driver task. The initial read, the optional poll timer,
//! every event subscription and explicit [`WatchedValue::refresh`] calls all
//! feed the same invalidation channel, and the driver is the only place a
//! read is issued or a result applied. Reads may overlap; a completed read is
//! applied only if no newer read has settled before it.

use std::{fmt, sync::Arc, time::Duration};

use alloy_primitives::{Address, Bytes};
use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use shared::{domain::Endpoint, protocol::CallArg};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    abi::{encode_call, AbiDecode},
    error::ReadError,
    provider::{EventSource, LogFilter, ReadEndpoint, TopicFilter},
};

/// Returns `true` when two decoded values should be treated as unchanged.
pub type Equality<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A named event that causes the reader to re-invoke its operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTrigger {
    pub endpoint: Address,
    pub event: String,
    pub topics: Vec<TopicFilter>,
}

impl RefreshTrigger {
    pub fn new(endpoint: &Endpoint, event_signature: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.address,
            event: event_signature.into(),
            topics: Vec::new(),
        }
    }

    /// Positional filter over the event's indexed parameters.
    pub fn with_topics(mut self, topics: impl IntoIterator<Item = TopicFilter>) -> Self {
        self.topics = topics.into_iter().collect();
        self
    }

    pub fn filter(&self) -> LogFilter {
        LogFilter::event(self.endpoint, &self.event).with_indexed(self.topics.iter().cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invalidation {
    Initial,
    Poll,
    Event,
    Manual,
}

pub struct StateReader<T> {
    endpoint: Endpoint,
    operation: String,
    args: Option<Vec<CallArg>>,
    triggers: Vec<RefreshTrigger>,
    poll_interval: Option<Duration>,
    equal: Equality<T>,
}

impl<T> StateReader<T>
where
    T: AbiDecode + Clone + Send + Sync + 'static,
{
    pub fn new(endpoint: Endpoint, operation: impl Into<String>) -> Self
    where
        T: PartialEq,
    {
        Self {
            endpoint,
            operation: operation.into(),
            args: Some(Vec::new()),
            triggers: Vec::new(),
            poll_interval: None,
            equal: Arc::new(|held: &T, next: &T| held == next),
        }
    }

    /// `None` means a required argument is not available yet; the operation
    /// is then never invoked and the value stays empty.
    pub fn args(mut self, args: Option<Vec<CallArg>>) -> Self {
        self.args = args;
        self
    }

    pub fn update_on(mut self, trigger: RefreshTrigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn update_on_all(mut self, triggers: impl IntoIterator<Item = RefreshTrigger>) -> Self {
        self.triggers.extend(triggers);
        self
    }

    pub fn poll_every(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn equal_by(mut self, equal: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        self.equal = Arc::new(equal);
        self
    }

    pub fn spawn(
        self,
        reads: Arc<dyn ReadEndpoint>,
        events: Arc<dyn EventSource>,
    ) -> WatchedValue<T> {
        let label = format!("{}.{}", self.endpoint.label, self.operation);
        let (value_tx, value_rx) = watch::channel(None);

        let Some(args) = self.args else {
            debug!("reader: {label} skipped, arguments unavailable");
            return WatchedValue::idle(label, value_rx);
        };

        let calldata = match encode_call(&self.operation, &args) {
            Ok(calldata) => calldata,
            Err(err) => {
                warn!("reader: {label} arguments could not be encoded: {err}");
                return WatchedValue::idle(label, value_rx);
            }
        };

        let (invalidate_tx, invalidate_rx) = mpsc::unbounded_channel();
        let _ = invalidate_tx.send(Invalidation::Initial);

        let mut tasks = Vec::with_capacity(self.triggers.len() + 2);
        if let Some(every) = self.poll_interval {
            tasks.push(tokio::spawn(poll_timer(every, invalidate_tx.clone())));
        }
        for trigger in self.triggers {
            tasks.push(tokio::spawn(watch_trigger(
                Arc::clone(&events),
                trigger,
                invalidate_tx.clone(),
                label.clone(),
            )));
        }

        let driver = ReadDriver {
            label: label.clone(),
            reads,
            to: self.endpoint.address,
            calldata,
            equal: self.equal,
            value: value_tx,
        };
        tasks.push(tokio::spawn(driver.run(invalidate_rx)));

        WatchedValue {
            label,
            value: value_rx,
            invalidate: Some(invalidate_tx),
            tasks,
        }
    }
}

async fn poll_timer(every: Duration, invalidate: mpsc::UnboundedSender<Invalidation>) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; the initial read already covers it.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if invalidate.send(Invalidation::Poll).is_err() {
            return;
        }
    }
}

async fn watch_trigger(
    events: Arc<dyn EventSource>,
    trigger: RefreshTrigger,
    invalidate: mpsc::UnboundedSender<Invalidation>,
    label: String,
) {
    let mut stream = match events.subscribe(trigger.filter()).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(
                "reader: {label} could not subscribe to {} on {}: {err}",
                trigger.event, trigger.endpoint
            );
            return;
        }
    };

    while let Some(log) = stream.next().await {
        debug!(
            "reader: {label} invalidated by {} block={:?}",
            trigger.event, log.block_number
        );
        if invalidate.send(Invalidation::Event).is_err() {
            return;
        }
    }
}

type ReadFuture<T> = BoxFuture<'static, (u64, Result<T, ReadError>)>;

struct ReadDriver<T> {
    label: String,
    reads: Arc<dyn ReadEndpoint>,
    to: Address,
    calldata: Bytes,
    equal: Equality<T>,
    value: watch::Sender<Option<T>>,
}

impl<T> ReadDriver<T>
where
    T: AbiDecode + Clone + Send + Sync + 'static,
{
    async fn run(self, mut invalidations: mpsc::UnboundedReceiver<Invalidation>) {
        let mut in_flight: FuturesUnordered<ReadFuture<T>> = FuturesUnordered::new();
        let mut issued = 0u64;
        let mut settled = 0u64;

        loop {
            tokio::select! {
                signal = invalidations.recv() => {
                    let Some(reason) = signal else {
                        return;
                    };
                    issued += 1;
                    debug!("reader: {} read #{issued} reason={reason:?}", self.label);
                    in_flight.push(self.read(issued));
                }
                Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    if seq <= settled {
                        debug!(
                            "reader: {} discarding read #{seq}, superseded by #{settled}",
                            self.label
                        );
                        continue;
                    }
                    settled = seq;
                    self.apply(seq, result);
                }
            }
        }
    }

    fn read(&self, seq: u64) -> ReadFuture<T> {
        let reads = Arc::clone(&self.reads);
        let to = self.to;
        let calldata = self.calldata.clone();
        async move {
            let result = match reads.call(to, calldata).await {
                Ok(raw) => T::abi_decode(&raw).map_err(ReadError::from),
                Err(err) => Err(err),
            };
            (seq, result)
        }
        .boxed()
    }

    fn apply(&self, seq: u64, result: Result<T, ReadError>) {
        match result {
            Ok(next) => {
                let equal = self.equal.as_ref();
                let changed = self.value.send_if_modified(|held| match held {
                    Some(current) if equal(current, &next) => false,
                    _ => {
                        *held = Some(next);
                        true
                    }
                });
                if changed {
                    debug!("reader: {} updated by read #{seq}", self.label);
                }
            }
            Err(err) => {
                warn!("reader: {} read #{seq} failed, keeping previous value: {err}", self.label);
            }
        }
    }
}

/// Handle over a reader's current value. Dropping it tears the reader down.
pub struct WatchedValue<T> {
    label: String,
    value: watch::Receiver<Option<T>>,
    invalidate: Option<mpsc::UnboundedSender<Invalidation>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T> WatchedValue<T> {
    fn idle(label: String, value: watch::Receiver<Option<T>>) -> Self {
        Self {
            label,
            value,
            invalidate: None,
            tasks: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.value.clone()
    }

    /// Waits for the next accepted change. Returns `None` once the reader has
    /// been torn down.
    pub async fn changed(&mut self) -> Option<Option<T>>
    where
        T: Clone,
    {
        self.value.changed().await.ok()?;
        Some(self.value.borrow_and_update().clone())
    }

    /// Requests a re-read. Returns `false` if the reader is idle or closed.
    pub fn refresh(&self) -> bool {
        self.invalidate
            .as_ref()
            .is_some_and(|invalidate| invalidate.send(Invalidation::Manual).is_ok())
    }

    pub fn is_active(&self) -> bool {
        self.invalidate.is_some()
    }

    pub fn close(&mut self) {
        self.invalidate = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl<T> Drop for WatchedValue<T> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for WatchedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedValue")
            .field("label", &self.label)
            .field("value", &*self.value.borrow())
            .field("active", &self.invalidate.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/reader_tests.rs"]
mod tests;
