//! In-memory transport for exercising contract handles without a node.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256, Bytes, Selector, U256, keccak256};
use async_trait::async_trait;
use futures::StreamExt;
use rollups_bindings::codec;
use rollups_bindings::schema::{Event, Function};
use rollups_bindings::transport::{
    ERROR_SELECTOR, LogFilter, LogStream, RawLog, RemoteCallError, Transport, TxOutcome, TxReceipt,
};
use rollups_bindings::{AbiType, AbiValue};
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedSender};

/// Scripted answer to a call or simulation.
#[derive(Debug, Clone)]
pub enum CallResponse {
    /// Return data.
    Return(Bytes),
    /// Revert data.
    Revert(Bytes),
}

/// How submitted transactions end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Confirm,
    Revert,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    Simulate,
    Submit,
}

/// A request received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl RecordedCall {
    pub fn selector(&self) -> Option<Selector> {
        self.data.get(..4).map(Selector::from_slice)
    }
}

type Subscriber = (LogFilter, UnboundedSender<Result<RawLog, RemoteCallError>>);

#[derive(Default)]
struct MockStateData {
    responses: HashMap<Selector, CallResponse>,
    calls: Vec<RecordedCall>,
    outcome: Outcome,
    nonce: u64,
    block_number: u64,
    subscribers: Vec<Subscriber>,
}

/// Transport double: records every request, answers calls from scripted
/// responses and fans emitted logs out to subscribers.
///
/// Emitted logs are only routed by address. Topic filtering is left to the
/// subscriber.
#[derive(Clone, Default)]
pub struct MockTransport {
    data: Arc<RwLock<MockStateData>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers calls with `selector` by `response`.
    pub async fn respond(&self, selector: Selector, response: CallResponse) {
        self.data.write().await.responses.insert(selector, response);
    }

    /// Answers calls to `function` with the encoded `outputs`.
    pub async fn respond_with(&self, function: &Function, outputs: &[AbiValue]) {
        let data = codec::encode_params(function.output_types(), outputs)
            .unwrap_or_else(|e| panic!("outputs do not fit {}: {e}", function.signature()));
        self.respond(function.selector(), CallResponse::Return(data.into()))
            .await;
    }

    /// Makes calls to `function` revert with `Error(reason)`.
    pub async fn revert_with(&self, function: &Function, reason: &str) {
        let mut data = ERROR_SELECTOR.to_vec();
        data.extend(
            codec::encode(&AbiType::String, &AbiValue::from(reason))
                .unwrap_or_else(|e| panic!("cannot encode revert reason: {e}")),
        );
        self.respond(function.selector(), CallResponse::Revert(data.into()))
            .await;
    }

    /// Sets how the next submitted transactions end.
    pub async fn set_outcome(&self, outcome: Outcome) {
        self.data.write().await.outcome = outcome;
    }

    /// Every request received so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.data.read().await.calls.clone()
    }

    /// Number of subscriptions whose receiving side is still alive.
    pub async fn subscriber_count(&self) -> usize {
        let mut data = self.data.write().await;
        data.subscribers.retain(|(_, sender)| !sender.is_closed());
        data.subscribers.len()
    }

    /// Sends `log` to every subscriber watching its address and returns how
    /// many received it.
    pub async fn emit(&self, log: RawLog) -> usize {
        let mut data = self.data.write().await;
        data.subscribers.retain(|(_, sender)| !sender.is_closed());
        data.subscribers
            .iter()
            .filter(|(filter, _)| filter.address == log.address)
            .filter(|(_, sender)| sender.send(Ok(log.clone())).is_ok())
            .count()
    }

    /// Ends every subscription with `error`.
    pub async fn fail_subscriptions(&self, error: RemoteCallError) {
        let mut data = self.data.write().await;
        for (_, sender) in data.subscribers.drain(..) {
            let _ = sender.send(Err(error.clone()));
        }
    }

    /// Builds the log `event` would leave when emitted by `address` with `values`,
    /// placed at the next block.
    pub async fn log_for(&self, event: &Event, address: Address, values: &[AbiValue]) -> RawLog {
        let (topics, data) = event
            .encode_log(values)
            .unwrap_or_else(|e| panic!("values do not fit {}: {e}", event.signature()));
        let block_number = {
            let mut state = self.data.write().await;
            state.block_number += 1;
            state.block_number
        };
        RawLog {
            address,
            topics,
            data,
            block_number: Some(block_number),
            log_index: Some(0),
            transaction_hash: Some(keccak256(block_number.to_be_bytes())),
        }
    }

    async fn answer(&self, kind: CallKind, to: Address, data: Bytes, value: U256) -> Result<Bytes, RemoteCallError> {
        let mut state = self.data.write().await;
        state.calls.push(RecordedCall {
            kind,
            to,
            data: data.clone(),
            value,
        });

        let response = data
            .get(..4)
            .and_then(|selector| state.responses.get(&Selector::from_slice(selector)));
        match response {
            Some(CallResponse::Return(output)) => Ok(output.clone()),
            Some(CallResponse::Revert(revert)) => Err(RemoteCallError::reverted(revert.clone())),
            None => Err(RemoteCallError::Transport(format!(
                "no response scripted for {data}"
            ))),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RemoteCallError> {
        self.answer(CallKind::Call, to, data, U256::ZERO).await
    }

    async fn simulate(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<Bytes, RemoteCallError> {
        self.answer(CallKind::Simulate, to, data, value).await
    }

    async fn submit(&self, to: Address, data: Bytes, value: U256) -> Result<B256, RemoteCallError> {
        let mut state = self.data.write().await;
        state.calls.push(RecordedCall {
            kind: CallKind::Submit,
            to,
            data,
            value,
        });
        state.nonce += 1;
        let tx_hash = keccak256(state.nonce.to_be_bytes());
        log::debug!("Mock accepted transaction {tx_hash}");
        Ok(tx_hash)
    }

    async fn wait_for_outcome(&self, tx_hash: B256) -> Result<TxOutcome, RemoteCallError> {
        let mut state = self.data.write().await;
        state.block_number += 1;
        let receipt = TxReceipt {
            transaction_hash: tx_hash,
            block_number: Some(state.block_number),
            gas_used: 21_000,
            logs: Vec::new(),
        };
        Ok(match state.outcome {
            Outcome::Confirm => TxOutcome::Confirmed(receipt),
            Outcome::Revert => TxOutcome::Reverted(receipt),
            Outcome::Drop => TxOutcome::Dropped {
                transaction_hash: tx_hash,
                reason: "evicted from the mock pool".to_string(),
            },
        })
    }

    async fn subscribe(&self, filter: LogFilter) -> Result<LogStream, RemoteCallError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.data.write().await.subscribers.push((filter, sender));
        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        });
        Ok(stream.boxed())
    }
}
