use std::time::{Duration, Instant};

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::json_rpc::RpcError;
use alloy::rpc::types::eth::Filter;
use alloy::rpc::types::{Log, TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportErrorKind;
use async_trait::async_trait;
use futures::StreamExt;
use url::Url;

use crate::transport::{
    LogFilter, LogStream, RawLog, RemoteCallError, Transport, TxOutcome, TxReceipt,
};

/// Configuration for waiting on transactions.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long to wait for a receipt before giving the transaction up.
    pub receipt_timeout: Duration,
    /// Delay between two receipt queries.
    pub poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl TransportConfig {
    /// How long [`Transport::wait_for_outcome`] waits before reporting the transaction dropped.
    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    /// Delay between two receipt lookups.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// [`Transport`] backed by an alloy provider.
/// Writes are signed by the provider's wallet filler.
#[derive(Clone)]
pub struct AlloyTransport {
    provider: DynProvider,
    sender: Option<Address>,
    config: TransportConfig,
}

impl AlloyTransport {
    /// Wraps an existing provider. `sender` is used as `from` for simulations.
    pub fn new(provider: DynProvider, sender: Option<Address>, config: TransportConfig) -> Self {
        Self {
            provider,
            sender,
            config,
        }
    }

    /// Connects to `url` with a wallet built from `signer`.
    /// `ws://` and `wss://` URLs open a websocket, anything else goes over HTTP.
    pub async fn connect(
        url: Url,
        signer: PrivateKeySigner,
        config: TransportConfig,
    ) -> anyhow::Result<Self> {
        let sender = signer.address();
        let builder = ProviderBuilder::new().wallet(EthereumWallet::from(signer));

        log::debug!("Connecting to {url} as {sender}");
        let provider = if is_websocket(&url) {
            builder
                .connect_ws(WsConnect::new(url.clone()))
                .await?
                .erased()
        } else {
            builder.connect_http(url.clone()).erased()
        };

        log::info!("Connected to {url}");
        Ok(Self::new(provider, Some(sender), config))
    }

    /// Connects without a wallet: reads and subscriptions only.
    pub async fn connect_read_only(url: Url, config: TransportConfig) -> anyhow::Result<Self> {
        log::debug!("Connecting to {url} (read only)");
        let provider = if is_websocket(&url) {
            ProviderBuilder::new()
                .connect_ws(WsConnect::new(url.clone()))
                .await?
                .erased()
        } else {
            ProviderBuilder::new().connect_http(url.clone()).erased()
        };

        log::info!("Connected to {url}");
        Ok(Self::new(provider, None, config))
    }

    /// The underlying alloy provider.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Address of the signing wallet, `None` for a read-only transport.
    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    fn request(&self, to: Address, data: Bytes, value: U256) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(data)
            .with_value(value);
        match self.sender {
            Some(sender) => tx.with_from(sender),
            None => tx,
        }
    }

    async fn dropped_reason(&self, tx_hash: B256) -> Result<String, RemoteCallError> {
        let known = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(remote_error)?;
        Ok(match known {
            None => "transaction is unknown to the node".to_string(),
            Some(_) => format!(
                "transaction not mined within {:?}",
                self.config.receipt_timeout
            ),
        })
    }
}

fn is_websocket(url: &Url) -> bool {
    matches!(url.scheme(), "ws" | "wss")
}

/// Separates contract reverts from transport faults.
fn remote_error(err: RpcError<TransportErrorKind>) -> RemoteCallError {
    match err.as_error_resp().and_then(|payload| payload.as_revert_data()) {
        Some(data) => RemoteCallError::reverted(data),
        None => RemoteCallError::transport(err),
    }
}

impl From<&Log> for RawLog {
    fn from(log: &Log) -> Self {
        RawLog {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            log_index: log.log_index,
            transaction_hash: log.transaction_hash,
        }
    }
}

impl From<&TransactionReceipt> for TxReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            logs: receipt.logs().iter().map(RawLog::from).collect(),
        }
    }
}

impl From<&LogFilter> for Filter {
    fn from(filter: &LogFilter) -> Self {
        let mut out = Filter::new().address(filter.address);
        for (position, topic) in filter.topics.iter().enumerate().take(4) {
            if let Some(topic) = topic {
                out.topics[position] = (*topic).into();
            }
        }
        out
    }
}

#[async_trait]
impl Transport for AlloyTransport {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RemoteCallError> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider.call(tx).await.map_err(remote_error)
    }

    async fn simulate(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<Bytes, RemoteCallError> {
        let tx = self.request(to, data, value);
        self.provider.call(tx).await.map_err(remote_error)
    }

    async fn submit(&self, to: Address, data: Bytes, value: U256) -> Result<B256, RemoteCallError> {
        if self.sender.is_none() {
            return Err(RemoteCallError::Transport(
                "transport has no wallet to sign with".to_string(),
            ));
        }
        let tx = self.request(to, data, value);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(remote_error)?;
        let tx_hash = *pending.tx_hash();
        log::debug!("Submitted transaction {tx_hash} to {to}");
        Ok(tx_hash)
    }

    async fn wait_for_outcome(&self, tx_hash: B256) -> Result<TxOutcome, RemoteCallError> {
        let deadline = Instant::now() + self.config.receipt_timeout;
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(remote_error)?;

            if let Some(receipt) = receipt {
                log::debug!(
                    "Transaction {tx_hash} mined in block {:?}, status {}",
                    receipt.block_number,
                    receipt.status()
                );
                let tx_receipt = TxReceipt::from(&receipt);
                return Ok(if receipt.status() {
                    TxOutcome::Confirmed(tx_receipt)
                } else {
                    TxOutcome::Reverted(tx_receipt)
                });
            }

            if Instant::now() >= deadline {
                let reason = self.dropped_reason(tx_hash).await?;
                log::warn!("Transaction {tx_hash} dropped: {reason}");
                return Ok(TxOutcome::Dropped {
                    transaction_hash: tx_hash,
                    reason,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn subscribe(&self, filter: LogFilter) -> Result<LogStream, RemoteCallError> {
        let subscription = self
            .provider
            .subscribe_logs(&Filter::from(&filter))
            .await
            .map_err(remote_error)?;
        Ok(subscription
            .into_stream()
            .map(|log| Ok(RawLog::from(&log)))
            .boxed())
    }
}
