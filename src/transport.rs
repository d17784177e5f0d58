use alloy::hex;
use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use displaydoc::Display;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::codec;
use crate::types::AbiType;

/// Selector of `Error(string)`, the revert payload of `require`/`revert("...")`.
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Selector of `Panic(uint256)`, emitted on assertion failures and arithmetic faults.
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Represents failures reported by the remote side of a call.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum RemoteCallError {
    /// Execution reverted: {reason}
    Reverted {
        /// Human readable reason, decoded from the revert data when possible.
        reason: String,
        /// Raw revert data.
        data: Bytes,
    },
    /// Transport error: {0}
    Transport(String),
}

impl RemoteCallError {
    /// Builds a revert error, decoding `Error(string)` and `Panic(uint256)` payloads.
    pub fn reverted(data: Bytes) -> Self {
        RemoteCallError::Reverted {
            reason: decode_revert_reason(&data),
            data,
        }
    }

    /// A failure of the transport itself, not of the contract.
    pub fn transport(err: impl ToString) -> Self {
        RemoteCallError::Transport(err.to_string())
    }

    /// Revert data, if the error is a revert.
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            RemoteCallError::Reverted { data, .. } => Some(data),
            RemoteCallError::Transport(_) => None,
        }
    }
}

/// Human readable form of revert data.
pub fn decode_revert_reason(data: &[u8]) -> String {
    if data.is_empty() {
        return "no revert data".to_string();
    }
    if let Some(payload) = data.strip_prefix(&ERROR_SELECTOR) {
        if let Ok(reason) = codec::decode(&AbiType::String, payload) {
            if let Some(reason) = reason.as_str() {
                return reason.to_string();
            }
        }
    }
    if let Some(payload) = data.strip_prefix(&PANIC_SELECTOR) {
        if let Ok(code) = codec::decode(&AbiType::Uint(256), payload) {
            if let Some(code) = code.as_uint() {
                return format!("panic code 0x{code:x}");
            }
        }
    }
    format!("custom error {}", hex::encode_prefixed(data))
}

/// A log as delivered by the transport, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawLog {
    /// Emitting contract.
    pub address: Address,
    /// Signature topic first, unless the event is anonymous.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed parameters.
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<B256>,
}

/// Transport-level log filter: an emitter address and positional topics,
/// `None` matching any topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Emitting contract.
    pub address: Address,
    /// Topics by position; trailing wildcards are omitted.
    pub topics: Vec<Option<B256>>,
}

impl LogFilter {
    /// Every log emitted by `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            topics: Vec::new(),
        }
    }

    /// Whether `log` comes from the address and carries every fixed topic.
    pub fn matches(&self, log: &RawLog) -> bool {
        log.address == self.address
            && self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
                Some(wanted) => log.topics.get(i) == Some(wanted),
                None => true,
            })
    }
}

/// Live stream of logs; ends when the subscription closes.
pub type LogStream = BoxStream<'static, Result<RawLog, RemoteCallError>>;

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub logs: Vec<RawLog>,
}

/// Terminal state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Mined with a success status.
    Confirmed(TxReceipt),
    /// Mined, but execution reverted.
    Reverted(TxReceipt),
    /// Evicted or never mined.
    Dropped { transaction_hash: B256, reason: String },
}

impl TxOutcome {
    /// Hash of the transaction this outcome belongs to.
    pub fn transaction_hash(&self) -> B256 {
        match self {
            TxOutcome::Confirmed(receipt) | TxOutcome::Reverted(receipt) => {
                receipt.transaction_hash
            }
            TxOutcome::Dropped {
                transaction_hash, ..
            } => *transaction_hash,
        }
    }

    /// The receipt, unless the transaction was dropped.
    pub fn receipt(&self) -> Option<&TxReceipt> {
        match self {
            TxOutcome::Confirmed(receipt) | TxOutcome::Reverted(receipt) => Some(receipt),
            TxOutcome::Dropped { .. } => None,
        }
    }

    /// Whether the transaction executed successfully.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxOutcome::Confirmed(_))
    }
}

/// The chain access the bindings consume.
///
/// Implementations report contract reverts as [`RemoteCallError::Reverted`]
/// and everything else as [`RemoteCallError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read-only call, answered from the latest state.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RemoteCallError>;

    /// Dry-run of a state-changing call from the sending account.
    async fn simulate(&self, to: Address, data: Bytes, value: U256)
    -> Result<Bytes, RemoteCallError>;

    /// Signs and broadcasts a transaction, returning its hash.
    async fn submit(&self, to: Address, data: Bytes, value: U256) -> Result<B256, RemoteCallError>;

    /// Waits until the transaction reaches a terminal state.
    async fn wait_for_outcome(&self, tx_hash: B256) -> Result<TxOutcome, RemoteCallError>;

    /// Opens a live log subscription.
    async fn subscribe(&self, filter: LogFilter) -> Result<LogStream, RemoteCallError>;
}
