use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{B256, I256};
use displaydoc::Display;
use thiserror::Error;

use crate::types::{AbiType, WORD_SIZE};
use crate::value::AbiValue;

/// Most values a single decode may produce, counting every array element and tuple member.
pub const MAX_DECODED_ELEMENTS: usize = 1 << 18;

/// Errors raised while encoding local values into ABI bytes.
/// They point at a value that does not fit its declared type and are never retried.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Value {value} does not fit in {ty}
    IntegerOutOfRange { ty: String, value: String },
    /// Expected a value of type {expected}, got {got}
    TypeMismatch { expected: String, got: &'static str },
    /// Expected {expected} elements for {ty}, got {got}
    LengthMismatch {
        ty: String,
        expected: usize,
        got: usize,
    },
    /// Fixed bytes value of size {got} does not fit {ty}
    FixedBytesSize { ty: String, got: usize },
    /// Expected {expected} parameters, got {got}
    ParamCount { expected: usize, got: usize },
}

/// Errors raised while decoding ABI bytes into local values.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum DecodingError {
    /// Malformed ABI data: {0}
    Malformed(String),
    /// Data is not the canonical encoding of `{0}`
    NonCanonical(String),
    /// Word is not a valid `{0}` encoding
    InvalidWord(String),
    /// Decoded data holds more than {0} values
    TooManyElements(usize),
    /// Selector {found} does not match the expected {expected}
    SelectorMismatch { expected: String, found: String },
    /// Event `{event}` expects {expected} topics, the log has {got}
    TopicCount {
        event: String,
        expected: usize,
        got: usize,
    },
    /// Log topic {0} does not match the event signature
    TopicMismatch(B256),
    /// Decoded value does not have the shape of {0}
    UnexpectedShape(String),
}

/// Encodes a single value, laid out as a one-element parameter list.
pub fn encode(ty: &AbiType, value: &AbiValue) -> Result<Vec<u8>, EncodingError> {
    encode_params([ty], std::slice::from_ref(value))
}

/// Decodes a single value produced by [`encode`].
pub fn decode(ty: &AbiType, data: &[u8]) -> Result<AbiValue, DecodingError> {
    let mut values = decode_params([ty], data)?;
    values
        .pop()
        .ok_or_else(|| DecodingError::UnexpectedShape(ty.canonical()))
}

/// Encodes an argument or return list using the head/tail layout.
pub fn encode_params<'a>(
    types: impl IntoIterator<Item = &'a AbiType>,
    values: &[AbiValue],
) -> Result<Vec<u8>, EncodingError> {
    let types: Vec<&AbiType> = types.into_iter().collect();
    if types.len() != values.len() {
        return Err(EncodingError::ParamCount {
            expected: types.len(),
            got: values.len(),
        });
    }
    let tokens = types
        .into_iter()
        .zip(values)
        .map(|(ty, value)| to_sol(ty, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DynSolValue::Tuple(tokens).abi_encode_params())
}

/// Decodes an argument or return list.
///
/// Decoding is strict: the data must start with the canonical encoding of
/// the values it holds. Trailing bytes are ignored.
pub fn decode_params<'a>(
    types: impl IntoIterator<Item = &'a AbiType>,
    data: &[u8],
) -> Result<Vec<AbiValue>, DecodingError> {
    let types: Vec<&AbiType> = types.into_iter().collect();
    let sequence = DynSolType::Tuple(types.iter().map(|ty| ty.sol_type()).collect());
    let decoded = sequence
        .abi_decode_sequence(data)
        .map_err(|e| DecodingError::Malformed(e.to_string()))?;

    // Heads may share one tail, so the output can outgrow the input.
    if value_count(&decoded) > MAX_DECODED_ELEMENTS {
        return Err(DecodingError::TooManyElements(MAX_DECODED_ELEMENTS));
    }
    if !data.starts_with(&decoded.abi_encode_params()) {
        return Err(DecodingError::NonCanonical(
            sequence.sol_type_name().into_owned(),
        ));
    }

    let DynSolValue::Tuple(values) = decoded else {
        return Err(DecodingError::UnexpectedShape(
            sequence.sol_type_name().into_owned(),
        ));
    };
    types
        .into_iter()
        .zip(values)
        .map(|(ty, value)| from_sol(ty, value))
        .collect()
}

/// Encodes the value of an indexed event parameter as a log topic.
///
/// Value types are stored as their word. `bytes` and `string` are hashed
/// as-is, arrays and tuples are hashed over their in-place encoding.
pub fn encode_topic(ty: &AbiType, value: &AbiValue) -> Result<B256, EncodingError> {
    Ok(to_sol(ty, value)?.encode_topic())
}

/// Decodes an indexed event parameter from its topic.
/// Types that are stored hashed come back as the `bytes32` hash.
pub fn decode_topic(ty: &AbiType, topic: &B256) -> Result<AbiValue, DecodingError> {
    if ty.is_value_type() {
        decode(ty, topic.as_slice())
    } else {
        Ok(AbiValue::FixedBytes(*topic, WORD_SIZE))
    }
}

/// Checks `value` against `ty` and builds the alloy value the encoder consumes.
fn to_sol(ty: &AbiType, value: &AbiValue) -> Result<DynSolValue, EncodingError> {
    let encoded = match (ty, value) {
        (AbiType::Address, AbiValue::Address(address)) => DynSolValue::Address(*address),
        (AbiType::Bool, AbiValue::Bool(b)) => DynSolValue::Bool(*b),
        (AbiType::Uint(bits), AbiValue::Uint(v)) => {
            if v.bit_len() > *bits {
                return Err(out_of_range(ty, v));
            }
            DynSolValue::Uint(*v, *bits)
        }
        (AbiType::Int(bits), AbiValue::Int(v)) => {
            if !int_fits(*bits, v) {
                return Err(out_of_range(ty, v));
            }
            DynSolValue::Int(*v, *bits)
        }
        (AbiType::FixedBytes(size), AbiValue::FixedBytes(word, got)) => {
            if got != size || word[*size..].iter().any(|b| *b != 0) {
                return Err(EncodingError::FixedBytesSize {
                    ty: ty.canonical(),
                    got: *got,
                });
            }
            DynSolValue::FixedBytes(*word, *size)
        }
        (AbiType::Bytes, AbiValue::Bytes(bytes)) => DynSolValue::Bytes(bytes.to_vec()),
        (AbiType::String, AbiValue::String(s)) => DynSolValue::String(s.clone()),
        (AbiType::Array(elem), AbiValue::Array(items)) => DynSolValue::Array(
            items
                .iter()
                .map(|item| to_sol(elem, item))
                .collect::<Result<_, _>>()?,
        ),
        (AbiType::FixedArray(elem, len), AbiValue::FixedArray(items)) => {
            check_len(ty, *len, items.len())?;
            DynSolValue::FixedArray(
                items
                    .iter()
                    .map(|item| to_sol(elem, item))
                    .collect::<Result<_, _>>()?,
            )
        }
        (AbiType::Tuple(tuple), AbiValue::Tuple(items)) => {
            check_len(ty, tuple.len(), items.len())?;
            DynSolValue::Tuple(
                tuple
                    .types()
                    .zip(items)
                    .map(|(field, item)| to_sol(field, item))
                    .collect::<Result<_, _>>()?,
            )
        }
        _ => {
            return Err(EncodingError::TypeMismatch {
                expected: ty.canonical(),
                got: value.kind(),
            });
        }
    };
    Ok(encoded)
}

/// Converts a decoded alloy value back, rejecting words outside the declared width.
fn from_sol(ty: &AbiType, value: DynSolValue) -> Result<AbiValue, DecodingError> {
    let decoded = match (ty, value) {
        (AbiType::Address, DynSolValue::Address(address)) => AbiValue::Address(address),
        (AbiType::Bool, DynSolValue::Bool(b)) => AbiValue::Bool(b),
        (AbiType::Uint(bits), DynSolValue::Uint(v, _)) if v.bit_len() <= *bits => AbiValue::Uint(v),
        (AbiType::Int(bits), DynSolValue::Int(v, _)) if int_fits(*bits, &v) => AbiValue::Int(v),
        (AbiType::FixedBytes(size), DynSolValue::FixedBytes(word, _))
            if word[*size..].iter().all(|b| *b == 0) =>
        {
            AbiValue::FixedBytes(word, *size)
        }
        (AbiType::Bytes, DynSolValue::Bytes(bytes)) => AbiValue::Bytes(bytes.into()),
        (AbiType::String, DynSolValue::String(s)) => AbiValue::String(s),
        (AbiType::Array(elem), DynSolValue::Array(items)) => AbiValue::Array(
            items
                .into_iter()
                .map(|item| from_sol(elem, item))
                .collect::<Result<_, _>>()?,
        ),
        (AbiType::FixedArray(elem, _), DynSolValue::FixedArray(items)) => AbiValue::FixedArray(
            items
                .into_iter()
                .map(|item| from_sol(elem, item))
                .collect::<Result<_, _>>()?,
        ),
        (AbiType::Tuple(tuple), DynSolValue::Tuple(items)) => AbiValue::Tuple(
            tuple
                .types()
                .zip(items)
                .map(|(field, item)| from_sol(field, item))
                .collect::<Result<_, _>>()?,
        ),
        (AbiType::Uint(_) | AbiType::Int(_) | AbiType::FixedBytes(_), _) => {
            return Err(DecodingError::InvalidWord(ty.canonical()));
        }
        _ => return Err(DecodingError::UnexpectedShape(ty.canonical())),
    };
    Ok(decoded)
}

fn value_count(value: &DynSolValue) -> usize {
    match value {
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            items.iter().map(value_count).fold(1, usize::saturating_add)
        }
        _ => 1,
    }
}

/// Checks that `value` is representable as a two's complement integer of `bits` bits.
fn int_fits(bits: usize, value: &I256) -> bool {
    if bits >= 256 {
        return true;
    }
    let raw = value.into_raw();
    let magnitude = if value.is_negative() { !raw } else { raw };
    magnitude.bit_len() < bits
}

fn out_of_range(ty: &AbiType, value: &impl ToString) -> EncodingError {
    EncodingError::IntegerOutOfRange {
        ty: ty.canonical(),
        value: value.to_string(),
    }
}

fn check_len(ty: &AbiType, expected: usize, got: usize) -> Result<(), EncodingError> {
    if expected != got {
        return Err(EncodingError::LengthMismatch {
            ty: ty.canonical(),
            expected,
            got,
        });
    }
    Ok(())
}
