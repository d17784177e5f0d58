use std::future::ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256};
use displaydoc::Display;
use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::{self, JoinHandle};

use crate::codec::{self, DecodingError};
use crate::contract::Error;
use crate::schema::{Event, EventField};
use crate::transport::{LogFilter, LogStream, RawLog, RemoteCallError};
use crate::value::AbiValue;

/// Represents errors that end a live subscription.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Subscription transport failed: {0}
    Transport(#[from] RemoteCallError),
    /// Failed to decode a log: {0}
    Decoding(#[from] DecodingError),
    /// Log at block {block}, index {index} was delivered out of order
    OutOfOrder { block: u64, index: u64 },
    /// Subscription closed by the remote side
    Closed,
}

/// Stream of decoded events. It ends after the first error.
pub type DecodedEventStream = BoxStream<'static, Result<DecodedEvent, SubscriptionError>>;

/// Selects the logs of one event.
/// Indexed parameters given a value must match it; all others are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    event: String,
    values: Vec<(String, AbiValue)>,
}

impl EventFilter {
    /// A filter on `event` with every indexed parameter left as a wildcard.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            values: Vec::new(),
        }
    }

    /// Fixes the indexed parameter `name` to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AbiValue>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Name of the filtered event.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Builds the transport filter for `event` emitted by `address`.
    pub(crate) fn to_log_filter(&self, event: &Event, address: Address) -> Result<LogFilter, Error> {
        let shape_error = |reason: String| Error::ArgumentShape {
            function: event.name.clone(),
            reason,
        };

        for (name, value) in &self.values {
            let param = event
                .inputs
                .iter()
                .find(|p| &p.name == name)
                .ok_or_else(|| shape_error(format!("no parameter named `{name}`")))?;
            if !param.indexed {
                return Err(shape_error(format!("parameter `{name}` is not indexed")));
            }
            if !value.matches(&param.ty) {
                return Err(shape_error(format!(
                    "{} value does not fit parameter `{name}` of type {}",
                    value.kind(),
                    param.ty
                )));
            }
        }

        let mut topics = Vec::new();
        if !event.anonymous {
            topics.push(Some(event.topic0()));
        }
        for param in event.indexed_inputs() {
            let topic = match self.values.iter().find(|(name, _)| name == &param.name) {
                Some((_, value)) => Some(codec::encode_topic(&param.ty, value)?),
                None => None,
            };
            topics.push(topic);
        }
        while topics.last() == Some(&None) {
            topics.pop();
        }

        Ok(LogFilter { address, topics })
    }
}

/// An event log decoded against its schema entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    /// Event name.
    pub name: String,
    /// Fields in declaration order. Hashed indexed parameters hold the hash.
    pub fields: Vec<EventField>,
    /// Emitting contract.
    pub address: Address,
    /// Position of the log on chain, when the transport reports it.
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<B256>,
}

impl DecodedEvent {
    /// Value of the field `name`.
    pub fn get(&self, name: &str) -> Option<&AbiValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    pub(crate) fn decode(event: &Event, log: &RawLog) -> Result<Self, DecodingError> {
        Ok(Self {
            name: event.name.clone(),
            fields: event.decode_log(&log.topics, &log.data)?,
            address: log.address,
            block_number: log.block_number,
            log_index: log.log_index,
            transaction_hash: log.transaction_hash,
        })
    }
}

#[derive(Default)]
struct StreamState {
    last_position: Option<(u64, u64)>,
    failed: bool,
}

/// Turns raw logs into decoded events.
/// Logs are checked against `filter` again, since transports may deliver more
/// than asked. The stream stops after yielding its first error.
pub(crate) fn decode_stream(logs: LogStream, event: Event, filter: LogFilter) -> DecodedEventStream {
    logs.filter(move |item| {
        ready(match item {
            Ok(log) => filter.matches(log),
            Err(_) => true,
        })
    })
    .scan(StreamState::default(), move |state, item| {
        if state.failed {
            return ready(None);
        }
        let result = item
            .map_err(SubscriptionError::from)
            .and_then(|log| check_order(state, &log).map(|()| log))
            .and_then(|log| DecodedEvent::decode(&event, &log).map_err(SubscriptionError::from));
        if let Err(err) = &result {
            log::warn!("Subscription to {} terminated: {err}", event.name);
            state.failed = true;
        }
        ready(Some(result))
    })
    .boxed()
}

fn check_order(state: &mut StreamState, log: &RawLog) -> Result<(), SubscriptionError> {
    let (Some(block), Some(index)) = (log.block_number, log.log_index) else {
        return Ok(());
    };
    if state.last_position.is_some_and(|last| (block, index) < last) {
        return Err(SubscriptionError::OutOfOrder { block, index });
    }
    state.last_position = Some((block, index));
    Ok(())
}

/// A live event watch.
///
/// Callbacks run one at a time while holding the gate. Closing the watch from
/// another task waits for an in-flight callback, so once
/// [`WatchHandle::unsubscribe`] returns no callback runs again. A callback may
/// unsubscribe its own watch; the current callback then finishes and no other
/// starts. Dropping the handle unsubscribes as well.
pub struct WatchHandle {
    gate: Arc<Mutex<()>>,
    open: Arc<AtomicBool>,
    task_id: task::Id,
    task: Option<JoinHandle<Result<(), SubscriptionError>>>,
}

impl WatchHandle {
    /// Starts delivering `events` to `callback` on a new task.
    pub(crate) fn spawn<F>(label: String, events: DecodedEventStream, callback: F) -> Self
    where
        F: FnMut(DecodedEvent) + Send + 'static,
    {
        let gate = Arc::new(Mutex::new(()));
        let open = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(deliver(label, events, gate.clone(), open.clone(), callback));
        Self {
            gate,
            open,
            task_id: task.id(),
            task: Some(task),
        }
    }

    /// Stops the watch.
    pub fn unsubscribe(mut self) {
        self.close();
    }

    /// Whether events are still being delivered.
    pub fn is_active(&self) -> bool {
        self.open.load(Ordering::Acquire)
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits for the watch to end on its own and returns why it ended.
    /// Dropping the returned future drops the handle, which unsubscribes.
    pub async fn closed(mut self) -> Result<(), SubscriptionError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => {
                log::warn!("Watch task failed: {err}");
                Err(SubscriptionError::Closed)
            }
        }
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::Release);
        // Inside a callback of this watch the gate is already held by the caller.
        if task::try_id() != Some(self.task_id) {
            drop(self.gate.lock());
        }
        if let Some(task) = self.task.take() {
            task.abort();
            log::info!("Watch unsubscribed");
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.close();
    }
}

async fn deliver<F>(
    label: String,
    mut events: DecodedEventStream,
    gate: Arc<Mutex<()>>,
    open: Arc<AtomicBool>,
    mut callback: F,
) -> Result<(), SubscriptionError>
where
    F: FnMut(DecodedEvent) + Send + 'static,
{
    log::info!("Watching {label}");
    while let Some(event) = events.next().await {
        let event = event?;
        let _held = gate.lock().map_err(|_| SubscriptionError::Closed)?;
        if !open.load(Ordering::Acquire) {
            return Ok(());
        }
        log::trace!("Delivering {} from block {:?}", event.name, event.block_number);
        callback(event);
    }
    log::warn!("Subscription for {label} ended");
    Err(SubscriptionError::Closed)
}
