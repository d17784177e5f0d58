//! # Rollups bindings
//!
//! Typed, ABI-driven bindings for invoking smart-contract functions and
//! observing smart-contract events on Ethereum-compatible chains, with
//! built-in schemas for the Cartesi rollups contracts (`CartesiDApp`,
//! `InputBox`, `ERC20Portal`) and the ERC20/ERC721 token standards.
//!
//! A contract is described by an [`AbiSchema`]: its functions, events and
//! their argument types, nested tuples such as the rollups [`Proof`] included.
//! Binding a schema to an address and a [`Transport`] gives a
//! [`ContractHandle`] offering four operations:
//! - [`read`](ContractHandle::read) calls a `view` or `pure` function;
//! - [`write`](ContractHandle::write) sends a transaction and returns a [`PendingTransaction`];
//! - [`prepare_write`](ContractHandle::prepare_write) validates, encodes and optionally simulates a write;
//! - [`watch_event`](ContractHandle::watch_event) delivers decoded events to a callback until unsubscribed.
//!
//! Arguments are checked against the schema before anything is sent.
//! [`AlloyTransport`] connects the bindings to a node through `alloy`.
//!
//! ```ignore
//! let transport = Arc::new(AlloyTransport::connect(url, signer, TransportConfig::default()).await?);
//! let input_box = bindings::cartesi_input_box::get(input_box_address, transport);
//! let pending = input_box
//!     .write("addInput", &[dapp.into(), Bytes::from_static(b"hello").into()], None)
//!     .await?;
//! let outcome = pending.wait().await?;
//! ```

/// Re-export commonly used types from `alloy`.
pub use alloy::primitives::{Address, B256, Bytes, FixedBytes, I256, U256, keccak256};
pub use alloy::signers::local::PrivateKeySigner;
pub use url::Url;

pub use contract::ContractHandle;
pub use events::{DecodedEvent, EventFilter, SubscriptionError, WatchHandle};
pub use pending::{PendingTransaction, PreparedWrite, TxStatus};
pub use proof::{OutputValidityProof, Proof};
pub use provider::{AlloyTransport, TransportConfig};
pub use registry::SchemaRegistry;
pub use schema::{AbiEntry, AbiSchema, Event, Function, StateMutability};
pub use transport::{RemoteCallError, Transport, TxOutcome};
pub use types::AbiType;
pub use value::AbiValue;

/// Module for ABI types.
/// Defines the recursive `AbiType` and its parsing from Solidity type strings.
pub mod types;

/// Module for local values crossing the ABI boundary.
pub mod value;

/// Module for the ABI codec.
/// Encodes and decodes argument lists, return data and event topics.
pub mod codec;

/// Module for contract schemas.
/// Contains function and event entries, signatures, selectors and the JSON ABI export.
pub mod schema;

/// Module for the rollups proof structures.
pub mod proof;

/// Module for the built-in contract schemas.
pub mod contracts;

/// Module for the transport interface consumed by the bindings.
/// Includes raw logs, log filters, transaction outcomes and revert decoding.
pub mod transport;

/// Module for the alloy-backed transport.
pub mod provider;

/// Module for contract handles.
/// Exposes read, write, prepare-write and watch-event on a bound contract.
pub mod contract;

/// Module for the write path: prepared and pending transactions.
pub mod pending;

/// Module for event handling.
/// Contains event filters, decoded events and live watches.
pub mod events;

/// Module for the schema registry.
pub mod registry;

/// Module with one entry point per built-in contract.
pub mod bindings;

/// Module with utility functions.
/// Includes conversions between wei and ETH.
pub mod utils;
