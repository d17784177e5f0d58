use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use bon::{Builder, bon};
use displaydoc::Display;
use thiserror::Error;

use crate::codec::{DecodingError, EncodingError};
use crate::events::{self, DecodedEvent, DecodedEventStream, EventFilter, SubscriptionError, WatchHandle};
use crate::pending::{PendingTransaction, PreparedWrite};
use crate::schema::{self, AbiSchema, Function, StateMutability};
use crate::transport::{RemoteCallError, Transport};
use crate::value::AbiValue;

/// Represents errors returned by contract operations.
/// None of them is retried.
#[derive(Debug, Display, Error)]
pub enum Error {
    /// {0}
    NotFound(#[from] schema::Error),
    /// Invalid address `{0}`
    InvalidAddress(String),
    /// `{function}` is {mutability} and cannot be used with {operation}
    InvalidMutability {
        function: String,
        mutability: StateMutability,
        operation: &'static str,
    },
    /// Invalid arguments for `{function}`: {reason}
    ArgumentShape { function: String, reason: String },
    /// Failed to encode arguments: {0}
    Encoding(#[from] EncodingError),
    /// Failed to decode the response: {0}
    Decoding(#[from] DecodingError),
    /// Remote call failed: {0}
    RemoteCall(#[from] RemoteCallError),
    /// Subscription failed: {0}
    Subscription(#[from] SubscriptionError),
}

/// A contract schema bound to an address and a transport.
///
/// Every operation checks the arguments against the schema before the
/// transport is touched.
#[derive(Clone, Builder)]
pub struct ContractHandle {
    schema: Arc<AbiSchema>,
    address: Address,
    transport: Arc<dyn Transport>,
}

#[bon]
impl ContractHandle {
    /// Binds `schema` to the contract deployed at `address`.
    pub fn new(schema: Arc<AbiSchema>, address: Address, transport: Arc<dyn Transport>) -> Self {
        Self {
            schema,
            address,
            transport,
        }
    }

    /// Binds `schema` to the address written in `address`.
    /// Mixed-case addresses must carry a valid EIP-55 checksum.
    pub fn parse(
        schema: Arc<AbiSchema>,
        address: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        Ok(Self::new(schema, parse_address(address)?, transport))
    }

    /// The bound schema.
    pub fn schema(&self) -> &Arc<AbiSchema> {
        &self.schema
    }

    /// Address of the bound contract.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The transport every operation goes through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Picks the function invoked as `function` with `args`.
    ///
    /// A name containing `(` is a full signature and must match exactly.
    /// Otherwise overloads are tried in declaration order and the first whose
    /// inputs accept the arguments wins.
    pub fn resolve(&self, function: &str, args: &[AbiValue]) -> Result<&Function, Error> {
        let candidates = if function.contains('(') {
            vec![self.schema.function_by_signature(function)?]
        } else {
            self.schema.functions(function)?
        };

        candidates
            .into_iter()
            .find(|candidate| candidate.accepts(args))
            .ok_or_else(|| {
                let kinds: Vec<_> = args.iter().map(AbiValue::kind).collect();
                Error::ArgumentShape {
                    function: function.to_string(),
                    reason: format!("no overload accepts ({})", kinds.join(", ")),
                }
            })
    }

    /// Calls a `pure` or `view` function and decodes its outputs.
    pub async fn read(&self, function: &str, args: &[AbiValue]) -> Result<Vec<AbiValue>, Error> {
        let resolved = self.resolve(function, args)?;
        if !resolved.state_mutability.is_read_only() {
            return Err(invalid_mutability(resolved, "read"));
        }

        let calldata = resolved.encode_call(args)?;
        log::debug!("Calling {} on {}", resolved.signature(), self.address);
        log::trace!("Calldata: {calldata}");

        let output = self.transport.call(self.address, calldata).await?;
        log::trace!("Returned: {output}");
        Ok(resolved.decode_output(&output)?)
    }

    /// Sends a transaction invoking a `nonpayable` or `payable` function.
    /// `value` defaults to zero.
    pub async fn write(
        &self,
        function: &str,
        args: &[AbiValue],
        value: Option<U256>,
    ) -> Result<PendingTransaction, Error> {
        self.prepare(function, args, value)?.submit().await
    }

    /// Validates and encodes a write without sending it, optionally
    /// dry-running it against the latest state.
    #[builder]
    pub async fn prepare_write(
        &self,
        #[builder(into)] function: String,
        #[builder(default)] args: Vec<AbiValue>,
        value: Option<U256>,
        #[builder(default)] simulate: bool,
    ) -> Result<PreparedWrite, Error> {
        let prepared = self.prepare(&function, &args, value)?;
        if !simulate {
            return Ok(prepared);
        }

        log::debug!("Simulating {} on {}", prepared.function().signature(), self.address);
        let output = self
            .transport
            .simulate(self.address, prepared.calldata().clone(), prepared.value())
            .await?;
        let outputs = prepared.function().decode_output(&output)?;
        Ok(prepared.with_simulated(outputs))
    }

    /// Delivers every matching event to `callback` until the returned handle
    /// is unsubscribed or dropped.
    pub async fn watch_event<F>(&self, filter: EventFilter, callback: F) -> Result<WatchHandle, Error>
    where
        F: FnMut(DecodedEvent) + Send + 'static,
    {
        let label = format!("{} on {}", filter.event(), self.address);
        let events = self.event_stream(filter).await?;
        Ok(WatchHandle::spawn(label, events, callback))
    }

    /// Matching events as a stream. Dropping the stream ends the subscription.
    pub async fn event_stream(&self, filter: EventFilter) -> Result<DecodedEventStream, Error> {
        let event = self.schema.event(filter.event())?.clone();
        let log_filter = filter.to_log_filter(&event, self.address)?;
        log::info!("Subscribing to {} on {}", event.signature(), self.address);
        let logs = self.transport.subscribe(log_filter.clone()).await?;
        Ok(events::decode_stream(logs, event, log_filter))
    }

    fn prepare(
        &self,
        function: &str,
        args: &[AbiValue],
        value: Option<U256>,
    ) -> Result<PreparedWrite, Error> {
        let resolved = self.resolve(function, args)?;
        if resolved.state_mutability.is_read_only() {
            return Err(invalid_mutability(resolved, "write"));
        }
        let value = value.unwrap_or_default();
        if !value.is_zero() && !resolved.state_mutability.is_payable() {
            return Err(Error::ArgumentShape {
                function: resolved.signature(),
                reason: format!("cannot send {value} wei to a nonpayable function"),
            });
        }

        let calldata = resolved.encode_call(args)?;
        Ok(PreparedWrite::new(
            self.address,
            resolved.clone(),
            calldata,
            value,
            self.transport.clone(),
        ))
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("schema", &self.schema.name())
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn invalid_mutability(function: &Function, operation: &'static str) -> Error {
    Error::InvalidMutability {
        function: function.signature(),
        mutability: function.state_mutability,
        operation,
    }
}

/// Parses a `0x`-prefixed hex address, validating the checksum of mixed-case input.
pub fn parse_address(s: &str) -> Result<Address, Error> {
    let invalid = || Error::InvalidAddress(s.to_string());
    let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        Address::parse_checksummed(s, None).map_err(|_| invalid())
    } else {
        Address::from_str(s).map_err(|_| invalid())
    }
}
