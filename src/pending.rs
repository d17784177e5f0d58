use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256, Bytes, U256};

use crate::contract::Error;
use crate::schema::Function;
use crate::transport::{Transport, TxOutcome};
use crate::value::AbiValue;

/// Lifecycle of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    /// Encoded and validated, not yet broadcast.
    Unsubmitted,
    /// Broadcast, waiting for a terminal state.
    Pending,
    /// Included and executed successfully.
    Confirmed,
    /// Included, but execution reverted.
    Reverted,
    /// No receipt arrived before the deadline.
    Dropped,
}

impl TxStatus {
    /// Whether the status can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Reverted | TxStatus::Dropped)
    }
}

impl TxOutcome {
    /// The terminal status this outcome stands for.
    pub fn status(&self) -> TxStatus {
        match self {
            TxOutcome::Confirmed(_) => TxStatus::Confirmed,
            TxOutcome::Reverted(_) => TxStatus::Reverted,
            TxOutcome::Dropped { .. } => TxStatus::Dropped,
        }
    }
}

/// A broadcast transaction.
/// [`PendingTransaction::wait`] consumes it, so it resolves exactly once.
pub struct PendingTransaction {
    tx_hash: B256,
    signature: String,
    transport: Arc<dyn Transport>,
}

impl PendingTransaction {
    pub(crate) fn new(tx_hash: B256, signature: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            tx_hash,
            signature,
            transport,
        }
    }

    /// Hash of the broadcast transaction.
    pub fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    /// Signature of the invoked function.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Always [`TxStatus::Pending`]: the terminal status comes from [`PendingTransaction::wait`].
    pub fn status(&self) -> TxStatus {
        TxStatus::Pending
    }

    /// Waits for the terminal outcome of the transaction.
    pub async fn wait(self) -> Result<TxOutcome, Error> {
        let outcome = self.transport.wait_for_outcome(self.tx_hash).await?;
        match &outcome {
            TxOutcome::Confirmed(_) => {
                log::debug!("{} ({}) confirmed", self.signature, self.tx_hash)
            }
            TxOutcome::Reverted(_) => {
                log::debug!("{} ({}) reverted", self.signature, self.tx_hash)
            }
            TxOutcome::Dropped { reason, .. } => {
                log::warn!("{} ({}) dropped: {reason}", self.signature, self.tx_hash)
            }
        }
        Ok(outcome)
    }
}

impl fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTransaction")
            .field("tx_hash", &self.tx_hash)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A validated, encoded write that can be submitted any number of times.
#[derive(Clone)]
pub struct PreparedWrite {
    to: Address,
    function: Function,
    calldata: Bytes,
    value: U256,
    simulated: Option<Vec<AbiValue>>,
    transport: Arc<dyn Transport>,
}

impl PreparedWrite {
    pub(crate) fn new(
        to: Address,
        function: Function,
        calldata: Bytes,
        value: U256,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            to,
            function,
            calldata,
            value,
            simulated: None,
            transport,
        }
    }

    pub(crate) fn with_simulated(mut self, outputs: Vec<AbiValue>) -> Self {
        self.simulated = Some(outputs);
        self
    }

    /// Target contract.
    pub fn to(&self) -> Address {
        self.to
    }

    /// The resolved function entry.
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Selector followed by the encoded arguments.
    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }

    /// Value attached to the transaction, in wei.
    pub fn value(&self) -> U256 {
        self.value
    }

    /// Outputs returned by the simulation, if one was requested.
    pub fn simulated(&self) -> Option<&[AbiValue]> {
        self.simulated.as_deref()
    }

    /// Always [`TxStatus::Unsubmitted`]; each submit yields its own [`PendingTransaction`].
    pub fn status(&self) -> TxStatus {
        TxStatus::Unsubmitted
    }

    /// Broadcasts the transaction.
    pub async fn submit(&self) -> Result<PendingTransaction, Error> {
        let signature = self.function.signature();
        log::debug!("Sending {signature} to {} with value {}", self.to, self.value);
        log::trace!("Calldata: {}", self.calldata);
        let tx_hash = self
            .transport
            .submit(self.to, self.calldata.clone(), self.value)
            .await?;
        Ok(PendingTransaction::new(
            tx_hash,
            signature,
            self.transport.clone(),
        ))
    }
}

impl fmt::Debug for PreparedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedWrite")
            .field("to", &self.to)
            .field("function", &self.function.signature())
            .field("calldata", &self.calldata)
            .field("value", &self.value)
            .field("simulated", &self.simulated)
            .finish_non_exhaustive()
    }
}
