use std::fmt;
use std::str::FromStr;

use alloy::json_abi::{self, InternalType, JsonAbi};
use alloy::primitives::{B256, Bytes, Selector, keccak256};
use displaydoc::Display;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::codec::{self, DecodingError, EncodingError};
use crate::types::AbiType;
use crate::value::AbiValue;

/// Represents errors raised by schema construction and lookups.
/// Both are programmer errors and never retried.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No entry `{entry}` in schema `{schema}`
    NotFound { schema: String, entry: String },
    /// Malformed schema: {0}
    Malformed(String),
}

/// State mutability class of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateMutability {
    /// Neither reads nor modifies state.
    Pure,
    /// Reads state without modifying it.
    View,
    /// Modifies state and rejects attached value.
    NonPayable,
    /// Modifies state and accepts attached value.
    Payable,
}

impl StateMutability {
    /// Functions that can be served by a call, without a transaction.
    pub fn is_read_only(self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }

    /// Functions that accept a non-zero value.
    pub fn is_payable(self) -> bool {
        self == StateMutability::Payable
    }

    /// The JSON ABI spelling, e.g. `nonpayable`.
    pub fn as_str(self) -> &'static str {
        match self {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::NonPayable => "nonpayable",
            StateMutability::Payable => "payable",
        }
    }
}

impl fmt::Display for StateMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateMutability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pure" => Ok(StateMutability::Pure),
            "view" => Ok(StateMutability::View),
            "nonpayable" => Ok(StateMutability::NonPayable),
            "payable" => Ok(StateMutability::Payable),
            other => Err(Error::Malformed(format!("unknown state mutability `{other}`"))),
        }
    }
}

impl From<StateMutability> for json_abi::StateMutability {
    fn from(value: StateMutability) -> Self {
        match value {
            StateMutability::Pure => json_abi::StateMutability::Pure,
            StateMutability::View => json_abi::StateMutability::View,
            StateMutability::NonPayable => json_abi::StateMutability::NonPayable,
            StateMutability::Payable => json_abi::StateMutability::Payable,
        }
    }
}

/// A named function parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, possibly empty.
    pub name: String,
    /// Parameter type.
    pub ty: AbiType,
    /// Solidity type the author wrote, such as `contract IERC20`, when it differs from `ty`.
    pub internal_type: Option<String>,
}

impl Param {
    /// A parameter whose internal type follows from its ABI type.
    pub fn new(name: impl Into<String>, ty: AbiType) -> Self {
        Self {
            name: name.into(),
            ty,
            internal_type: None,
        }
    }

    /// An `address` parameter typed as `contract <name>` in Solidity.
    pub fn contract(name: impl Into<String>, contract: &str) -> Self {
        Self {
            internal_type: Some(format!("contract {contract}")),
            ..Self::new(name, AbiType::Address)
        }
    }

    fn to_json(&self) -> Result<json_abi::Param, Error> {
        json_param(&self.name, &self.ty, self.internal_type.as_deref())
    }
}

/// An event parameter; indexed parameters are carried in topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    /// Parameter name, possibly empty.
    pub name: String,
    /// Parameter type.
    pub ty: AbiType,
    /// Whether the value is carried in a topic rather than in the log data.
    pub indexed: bool,
    /// Solidity type the author wrote, when it differs from `ty`.
    pub internal_type: Option<String>,
}

impl EventParam {
    fn to_json(&self) -> Result<json_abi::EventParam, Error> {
        let param = json_param(&self.name, &self.ty, self.internal_type.as_deref())?;
        Ok(json_abi::EventParam {
            ty: param.ty,
            name: param.name,
            indexed: self.indexed,
            components: param.components,
            internal_type: param.internal_type,
        })
    }
}

/// A contract function entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Function name; overloads share it.
    pub name: String,
    /// Decides whether the function is read or written.
    pub state_mutability: StateMutability,
    /// Arguments in declaration order.
    pub inputs: Vec<Param>,
    /// Return values in declaration order.
    pub outputs: Vec<Param>,
}

impl Function {
    /// A function with no inputs and no outputs yet.
    pub fn new(name: impl Into<String>, state_mutability: StateMutability) -> Self {
        Self {
            name: name.into(),
            state_mutability,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Appends an input parameter.
    pub fn input(mut self, name: impl Into<String>, ty: AbiType) -> Self {
        self.inputs.push(Param::new(name, ty));
        self
    }

    /// Appends an output parameter.
    pub fn output(mut self, name: impl Into<String>, ty: AbiType) -> Self {
        self.outputs.push(Param::new(name, ty));
        self
    }

    /// Appends an input holding the address of a `contract` instance.
    pub fn contract_input(mut self, name: impl Into<String>, contract: &str) -> Self {
        self.inputs.push(Param::contract(name, contract));
        self
    }

    /// Appends an output holding the address of a `contract` instance.
    pub fn contract_output(mut self, name: impl Into<String>, contract: &str) -> Self {
        self.outputs.push(Param::contract(name, contract));
        self
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        signature(&self.name, self.inputs.iter().map(|p| &p.ty))
    }

    /// First four bytes of the keccak256 hash of the signature.
    pub fn selector(&self) -> Selector {
        Selector::from_slice(&keccak256(self.signature())[..4])
    }

    /// Input types in declaration order.
    pub fn input_types(&self) -> impl Iterator<Item = &AbiType> {
        self.inputs.iter().map(|p| &p.ty)
    }

    /// Output types in declaration order.
    pub fn output_types(&self) -> impl Iterator<Item = &AbiType> {
        self.outputs.iter().map(|p| &p.ty)
    }

    /// Whether the arguments match the inputs in arity and structure.
    pub fn accepts(&self, args: &[AbiValue]) -> bool {
        args.len() == self.inputs.len()
            && args
                .iter()
                .zip(self.input_types())
                .all(|(arg, ty)| arg.matches(ty))
    }

    /// Selector followed by the encoded arguments.
    pub fn encode_call(&self, args: &[AbiValue]) -> Result<Bytes, EncodingError> {
        let mut data = self.selector().to_vec();
        data.extend(codec::encode_params(self.input_types(), args)?);
        Ok(data.into())
    }

    /// Decodes calldata produced by [`Function::encode_call`].
    pub fn decode_input(&self, data: &[u8]) -> Result<Vec<AbiValue>, DecodingError> {
        let selector = self.selector();
        if data.len() < 4 || data[..4] != selector[..] {
            return Err(DecodingError::SelectorMismatch {
                expected: selector.to_string(),
                found: alloy::hex::encode_prefixed(&data[..data.len().min(4)]),
            });
        }
        codec::decode_params(self.input_types(), &data[4..])
    }

    /// Decodes the return data of a call.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<AbiValue>, DecodingError> {
        codec::decode_params(self.output_types(), data)
    }

    fn validate(&self) -> Result<(), Error> {
        check_name("function", &self.name)?;
        self.inputs
            .iter()
            .chain(&self.outputs)
            .try_for_each(|p| check_type(&self.name, &p.ty))?;
        self.to_json().map(drop)
    }

    fn to_json(&self) -> Result<json_abi::Function, Error> {
        Ok(json_abi::Function {
            name: self.name.clone(),
            inputs: self.inputs.iter().map(Param::to_json).collect::<Result<_, _>>()?,
            outputs: self.outputs.iter().map(Param::to_json).collect::<Result<_, _>>()?,
            state_mutability: self.state_mutability.into(),
        })
    }
}

/// A decoded event field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventField {
    /// Parameter name from the schema.
    pub name: String,
    /// Decoded value. Hashed indexed parameters hold their `bytes32` topic.
    pub value: AbiValue,
    /// Whether the value came from a topic.
    pub indexed: bool,
}

/// A contract event entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name.
    pub name: String,
    /// Parameters in declaration order, indexed or not.
    pub inputs: Vec<EventParam>,
    /// Anonymous events emit no signature topic.
    pub anonymous: bool,
}

impl Event {
    /// A non-anonymous event with no parameters yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            anonymous: false,
        }
    }

    /// Appends an indexed parameter.
    pub fn indexed(self, name: impl Into<String>, ty: AbiType) -> Self {
        self.param(name, ty, true, None)
    }

    /// Appends a parameter carried in the log data.
    pub fn data(self, name: impl Into<String>, ty: AbiType) -> Self {
        self.param(name, ty, false, None)
    }

    /// Appends a log data parameter holding the address of a `contract` instance.
    pub fn contract_data(self, name: impl Into<String>, contract: &str) -> Self {
        self.param(name, AbiType::Address, false, Some(format!("contract {contract}")))
    }

    fn param(
        mut self,
        name: impl Into<String>,
        ty: AbiType,
        indexed: bool,
        internal_type: Option<String>,
    ) -> Self {
        self.inputs.push(EventParam {
            name: name.into(),
            ty,
            indexed,
            internal_type,
        });
        self
    }

    /// Marks the event anonymous: its logs carry no signature topic.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Canonical signature, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> String {
        signature(&self.name, self.inputs.iter().map(|p| &p.ty))
    }

    /// Signature topic. Anonymous events do not emit it.
    pub fn topic0(&self) -> B256 {
        keccak256(self.signature())
    }

    /// Parameters carried in topics, in declaration order.
    pub fn indexed_inputs(&self) -> impl Iterator<Item = &EventParam> {
        self.inputs.iter().filter(|p| p.indexed)
    }

    /// Parameters carried in the log data, in declaration order.
    pub fn data_inputs(&self) -> impl Iterator<Item = &EventParam> {
        self.inputs.iter().filter(|p| !p.indexed)
    }

    /// Position of the first indexed-parameter topic.
    pub(crate) fn first_indexed_topic(&self) -> usize {
        usize::from(!self.anonymous)
    }

    /// Decodes a log into its fields, in declaration order.
    pub fn decode_log(&self, topics: &[B256], data: &[u8]) -> Result<Vec<EventField>, DecodingError> {
        let skip = self.first_indexed_topic();
        let expected = skip + self.indexed_inputs().count();
        if topics.len() != expected {
            return Err(DecodingError::TopicCount {
                event: self.name.clone(),
                expected,
                got: topics.len(),
            });
        }
        if !self.anonymous && topics[0] != self.topic0() {
            return Err(DecodingError::TopicMismatch(topics[0]));
        }

        let mut indexed = self
            .indexed_inputs()
            .zip(&topics[skip..])
            .map(|(p, topic)| codec::decode_topic(&p.ty, topic))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter();
        let mut unindexed =
            codec::decode_params(self.data_inputs().map(|p| &p.ty), data)?.into_iter();

        self.inputs
            .iter()
            .map(|p| {
                let value = if p.indexed {
                    indexed.next()
                } else {
                    unindexed.next()
                };
                value
                    .map(|value| EventField {
                        name: p.name.clone(),
                        value,
                        indexed: p.indexed,
                    })
                    .ok_or_else(|| DecodingError::UnexpectedShape(self.signature()))
            })
            .collect()
    }

    /// Builds the topics and data of a log emitting this event with `values`
    /// given in declaration order.
    pub fn encode_log(&self, values: &[AbiValue]) -> Result<(Vec<B256>, Bytes), EncodingError> {
        if values.len() != self.inputs.len() {
            return Err(EncodingError::ParamCount {
                expected: self.inputs.len(),
                got: values.len(),
            });
        }
        let mut topics = Vec::new();
        if !self.anonymous {
            topics.push(self.topic0());
        }
        let mut data_types = Vec::new();
        let mut data_values = Vec::new();
        for (p, value) in self.inputs.iter().zip(values) {
            if p.indexed {
                topics.push(codec::encode_topic(&p.ty, value)?);
            } else {
                data_types.push(&p.ty);
                data_values.push(value.clone());
            }
        }
        let data = codec::encode_params(data_types, &data_values)?;
        Ok((topics, data.into()))
    }

    fn validate(&self) -> Result<(), Error> {
        check_name("event", &self.name)?;
        self.inputs
            .iter()
            .try_for_each(|p| check_type(&self.name, &p.ty))?;
        let max = if self.anonymous { 4 } else { 3 };
        let indexed = self.indexed_inputs().count();
        if indexed > max {
            return Err(Error::Malformed(format!(
                "event `{}` has {indexed} indexed parameters, at most {max} allowed",
                self.name
            )));
        }
        self.to_json().map(drop)
    }

    fn to_json(&self) -> Result<json_abi::Event, Error> {
        Ok(json_abi::Event {
            name: self.name.clone(),
            inputs: self.inputs.iter().map(EventParam::to_json).collect::<Result<_, _>>()?,
            anonymous: self.anonymous,
        })
    }
}

/// A schema entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiEntry {
    /// A callable function.
    Function(Function),
    /// An event the contract emits.
    Event(Event),
}

impl From<Function> for AbiEntry {
    fn from(function: Function) -> Self {
        AbiEntry::Function(function)
    }
}

impl From<Event> for AbiEntry {
    fn from(event: Event) -> Self {
        AbiEntry::Event(event)
    }
}

/// The interface of one contract: an ordered, validated list of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiSchema {
    name: String,
    version: String,
    entries: Vec<AbiEntry>,
}

impl AbiSchema {
    /// Builds a schema after checking that every entry is well-formed.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        entries: impl IntoIterator<Item = AbiEntry>,
    ) -> Result<Self, Error> {
        let name = name.into();
        check_name("schema", &name)?;
        let entries: Vec<AbiEntry> = entries.into_iter().collect();
        for entry in &entries {
            match entry {
                AbiEntry::Function(function) => function.validate()?,
                AbiEntry::Event(event) => event.validate()?,
            }
        }
        Ok(Self {
            name,
            version: version.into(),
            entries,
        })
    }

    /// Registry name of the schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version of the contracts the schema describes.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    /// Every function, in declaration order.
    pub fn all_functions(&self) -> impl Iterator<Item = &Function> {
        self.entries.iter().filter_map(|entry| match entry {
            AbiEntry::Function(function) => Some(function),
            AbiEntry::Event(_) => None,
        })
    }

    /// Every event, in declaration order.
    pub fn all_events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().filter_map(|entry| match entry {
            AbiEntry::Event(event) => Some(event),
            AbiEntry::Function(_) => None,
        })
    }

    /// Every function named `name`, in declaration order.
    pub fn functions(&self, name: &str) -> Result<Vec<&Function>, Error> {
        let found: Vec<_> = self.all_functions().filter(|f| f.name == name).collect();
        if found.is_empty() {
            return Err(self.not_found(name));
        }
        Ok(found)
    }

    /// Looks a function up by its full signature, e.g. `tokenByIndex(uint256)`.
    /// Argument types are canonicalised first, so `tokenByIndex(uint)` finds the same entry.
    pub fn function_by_signature(&self, signature: &str) -> Result<&Function, Error> {
        let wanted = canonical_signature(signature).ok_or_else(|| self.not_found(signature))?;
        self.all_functions()
            .find(|f| f.signature() == wanted)
            .ok_or_else(|| self.not_found(signature))
    }

    /// Looks a function up by its four-byte selector.
    pub fn function_by_selector(&self, selector: Selector) -> Result<&Function, Error> {
        self.all_functions()
            .find(|f| f.selector() == selector)
            .ok_or_else(|| self.not_found(&selector.to_string()))
    }

    /// The first event named `name`.
    pub fn event(&self, name: &str) -> Result<&Event, Error> {
        self.all_events()
            .find(|e| e.name == name)
            .ok_or_else(|| self.not_found(name))
    }

    /// Finds the non-anonymous event whose signature hashes to `topic`.
    pub fn event_by_topic(&self, topic: &B256) -> Option<&Event> {
        self.all_events()
            .find(|e| !e.anonymous && e.topic0() == *topic)
    }

    /// The schema as an alloy [`JsonAbi`], the form it is serialized in.
    pub fn to_json_abi(&self) -> Result<JsonAbi, Error> {
        let mut abi = JsonAbi::new();
        for entry in &self.entries {
            match entry {
                AbiEntry::Function(f) => abi
                    .functions
                    .entry(f.name.clone())
                    .or_default()
                    .push(f.to_json()?),
                AbiEntry::Event(e) => abi
                    .events
                    .entry(e.name.clone())
                    .or_default()
                    .push(e.to_json()?),
            }
        }
        Ok(abi)
    }

    fn not_found(&self, entry: &str) -> Error {
        Error::NotFound {
            schema: self.name.clone(),
            entry: entry.to_string(),
        }
    }
}

fn signature<'a>(name: &str, types: impl Iterator<Item = &'a AbiType>) -> String {
    let types: Vec<String> = types.map(AbiType::canonical).collect();
    format!("{name}({})", types.join(","))
}

fn canonical_signature(signature: &str) -> Option<String> {
    let parsed = json_abi::Function::parse(signature).ok()?;
    let types = parsed
        .inputs
        .iter()
        .map(|p| p.selector_type().parse::<AbiType>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    Some(self::signature(&parsed.name, types.iter()))
}

fn json_param(
    name: &str,
    ty: &AbiType,
    internal_type: Option<&str>,
) -> Result<json_abi::Param, Error> {
    let components = ty
        .components()
        .map(|fields| {
            fields
                .iter()
                .map(|field| json_param(&field.name, &field.ty, None))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    let internal_type = internal_type
        .map(str::to_string)
        .or_else(|| ty.internal_type())
        .and_then(|it| InternalType::parse(&it));
    json_abi::Param::new(name, &ty.json_type(), components, internal_type)
        .map_err(|e| Error::Malformed(format!("parameter `{name}`: {e}")))
}

fn check_name(kind: &str, name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::Malformed(format!("{kind} with an empty name")));
    }
    Ok(())
}

fn check_type(owner: &str, ty: &AbiType) -> Result<(), Error> {
    ty.validate()
        .map_err(|e| Error::Malformed(format!("`{owner}`: {e}")))
}

/// Serializes to the standard JSON ABI: a list of entries.
impl Serialize for AbiSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_abi()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}
