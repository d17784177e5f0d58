use std::fmt;

use alloy::hex;
use alloy::primitives::{Address, B256, Bytes, FixedBytes, I256, U256};

use crate::types::{AbiType, WORD_SIZE};

/// Local representation of a value crossing the ABI boundary.
///
/// Values carry no bit width: the width comes from the [`AbiType`] they are
/// encoded against, and range checks happen in the codec.
///
/// Only alloy fixed byte arrays that are valid `bytesN` values convert:
///
/// ```compile_fail
/// use rollups_bindings::{AbiValue, FixedBytes};
///
/// let too_wide = AbiValue::from(FixedBytes::<33>::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    /// `address`
    Address(Address),
    /// `bool`
    Bool(bool),
    /// Any `uintN`.
    Uint(U256),
    /// Any `intN`.
    Int(I256),
    /// Left-aligned bytes and their size (`bytesN`).
    FixedBytes(B256, usize),
    /// `bytes`
    Bytes(Bytes),
    /// `string`
    String(String),
    /// Elements of a `T[]`.
    Array(Vec<AbiValue>),
    /// Elements of a `T[k]`.
    FixedArray(Vec<AbiValue>),
    /// Tuple members in declaration order.
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    /// Builds a `T[]` value.
    pub fn array<T: Into<AbiValue>>(items: impl IntoIterator<Item = T>) -> Self {
        AbiValue::Array(items.into_iter().map(Into::into).collect())
    }

    /// Builds a tuple value.
    pub fn tuple(items: impl IntoIterator<Item = AbiValue>) -> Self {
        AbiValue::Tuple(items.into_iter().collect())
    }

    /// Builds a `bytesN` value from up to 32 bytes.
    pub fn fixed_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > WORD_SIZE {
            return None;
        }
        let mut word = B256::ZERO;
        word[..bytes.len()].copy_from_slice(bytes);
        Some(AbiValue::FixedBytes(word, bytes.len()))
    }

    /// A short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Bool(_) => "bool",
            AbiValue::Uint(_) => "uint",
            AbiValue::Int(_) => "int",
            AbiValue::FixedBytes(..) => "fixed bytes",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::String(_) => "string",
            AbiValue::Array(_) => "array",
            AbiValue::FixedArray(_) => "fixed array",
            AbiValue::Tuple(_) => "tuple",
        }
    }

    /// Structural match against a type: same kind, same arity, recursively.
    /// Integer ranges are not checked here, the encoder rejects out-of-range values.
    pub fn matches(&self, ty: &AbiType) -> bool {
        match (self, ty) {
            (AbiValue::Address(_), AbiType::Address)
            | (AbiValue::Bool(_), AbiType::Bool)
            | (AbiValue::Uint(_), AbiType::Uint(_))
            | (AbiValue::Int(_), AbiType::Int(_))
            | (AbiValue::Bytes(_), AbiType::Bytes)
            | (AbiValue::String(_), AbiType::String) => true,
            (AbiValue::FixedBytes(_, size), AbiType::FixedBytes(expected)) => size == expected,
            (AbiValue::Array(items), AbiType::Array(elem)) => {
                items.iter().all(|item| item.matches(elem))
            }
            (AbiValue::FixedArray(items), AbiType::FixedArray(elem, len)) => {
                items.len() == *len && items.iter().all(|item| item.matches(elem))
            }
            (AbiValue::Tuple(items), AbiType::Tuple(tuple)) => {
                items.len() == tuple.len()
                    && items.iter().zip(tuple.types()).all(|(item, ty)| item.matches(ty))
            }
            _ => false,
        }
    }

    /// The address, if this is an `address` value.
    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(address) => Some(*address),
            _ => None,
        }
    }

    /// The flag, if this is a `bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is an unsigned value.
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(value) => Some(*value),
            _ => None,
        }
    }

    /// The integer, if this is a signed value.
    pub fn as_int(&self) -> Option<I256> {
        match self {
            AbiValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The meaningful bytes of a `bytesN` value.
    pub fn as_fixed_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::FixedBytes(word, size) => Some(&word[..*size]),
            _ => None,
        }
    }

    /// A `bytes32` value as a word.
    pub fn as_b256(&self) -> Option<B256> {
        match self {
            AbiValue::FixedBytes(word, WORD_SIZE) => Some(*word),
            _ => None,
        }
    }

    /// The payload of a `bytes` value.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            AbiValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The text of a `string` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of a dynamic or fixed array.
    pub fn as_array(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Array(items) | AbiValue::FixedArray(items) => Some(items),
            _ => None,
        }
    }

    /// Members of a tuple value.
    pub fn as_tuple(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[AbiValue]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            AbiValue::Address(address) => write!(f, "{address}"),
            AbiValue::Bool(b) => write!(f, "{b}"),
            AbiValue::Uint(value) => write!(f, "{value}"),
            AbiValue::Int(value) => write!(f, "{value}"),
            AbiValue::FixedBytes(word, size) => write!(f, "0x{}", hex::encode(&word[..*size])),
            AbiValue::Bytes(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            AbiValue::String(s) => write!(f, "{s:?}"),
            AbiValue::Array(items) | AbiValue::FixedArray(items) => {
                f.write_str("[")?;
                join(f, items)?;
                f.write_str("]")
            }
            AbiValue::Tuple(items) => {
                f.write_str("(")?;
                join(f, items)?;
                f.write_str(")")
            }
        }
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        AbiValue::Address(value)
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        AbiValue::Bool(value)
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        AbiValue::Uint(value)
    }
}

impl From<I256> for AbiValue {
    fn from(value: I256) -> Self {
        AbiValue::Int(value)
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AbiValue {
                fn from(value: $t) -> Self {
                    AbiValue::Uint(U256::from(value))
                }
            }
        )*
    };
}

impl_from_unsigned!(u8, u16, u32, u64, u128);

impl<const N: usize> From<FixedBytes<N>> for AbiValue {
    /// Only `bytes1` to `bytes32` convert, other sizes fail to compile.
    fn from(value: FixedBytes<N>) -> Self {
        const { assert!(N >= 1 && N <= WORD_SIZE, "bytesN holds 1 to 32 bytes") };
        let mut word = B256::ZERO;
        word[..N].copy_from_slice(value.as_slice());
        AbiValue::FixedBytes(word, N)
    }
}

impl From<Bytes> for AbiValue {
    fn from(value: Bytes) -> Self {
        AbiValue::Bytes(value)
    }
}

impl From<String> for AbiValue {
    fn from(value: String) -> Self {
        AbiValue::String(value)
    }
}

impl From<&str> for AbiValue {
    fn from(value: &str) -> Self {
        AbiValue::String(value.to_string())
    }
}
