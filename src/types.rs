use std::fmt;
use std::str::FromStr;

use alloy::dyn_abi::DynSolType;
use displaydoc::Display;
use thiserror::Error;

/// Size in bytes of one ABI word.
pub const WORD_SIZE: usize = 32;

/// Largest number of elements a fixed array type may expand to, nested arrays included.
pub const MAX_FIXED_ELEMENTS: usize = 1 << 16;

/// Errors produced while parsing or validating an ABI type.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// Cannot parse type `{ty}`: {reason}
    Parse { ty: String, reason: String },
    /// Type `{0}` is not spelled canonically
    NonCanonical(String),
    /// Unsupported type `{0}`
    Unsupported(String),
    /// Invalid integer width {0}, expected a multiple of 8 in 8..=256
    InvalidIntWidth(usize),
    /// Invalid fixed bytes size {0}, expected 1..=32
    InvalidBytesSize(usize),
    /// Tuple types must have at least one field
    EmptyTuple,
    /// Fixed array `{0}` must hold between 1 and 65536 elements
    FixedArrayLength(String),
}

/// A named field of a tuple type.
/// The name is cosmetic: only the position of the field takes part in the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleField {
    /// Field name as declared in the contract (may be empty).
    pub name: String,
    /// Field type.
    pub ty: AbiType,
}

impl TupleField {
    /// Creates a field.
    /// An empty name is allowed and exported as such.
    pub fn new(name: impl Into<String>, ty: AbiType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An ordered list of fields, optionally named after the Solidity struct it models.
/// Whether the tuple is dynamic is decided once here, when the tuple is built,
/// and every encode/decode reads that stored answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleType {
    fields: Vec<TupleField>,
    dynamic: bool,
    name: Option<String>,
}

impl TupleType {
    /// Creates an anonymous tuple.
    /// Its dynamic flag is computed from the fields here.
    pub fn new(fields: Vec<TupleField>) -> Self {
        let dynamic = fields.iter().any(|field| field.ty.is_dynamic());
        Self {
            fields,
            dynamic,
            name: None,
        }
    }

    /// Names the tuple after a Solidity struct.
    /// The name only shows up in the JSON ABI `internalType`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[TupleField] {
        &self.fields
    }

    /// Field types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &AbiType> {
        self.fields.iter().map(|field| &field.ty)
    }

    /// Struct name, if the tuple models one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` for the empty tuple, which no schema accepts.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if any member is dynamically sized.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

/// Solidity ABI type.
///
/// A closed recursive sum type. It keeps the field names and struct names
/// that [`DynSolType`] drops, and converts to it for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    /// `address`
    Address,
    /// `bool`
    Bool,
    /// `uintN`, width in bits.
    Uint(usize),
    /// `intN`, width in bits.
    Int(usize),
    /// `bytesN`, size in bytes.
    FixedBytes(usize),
    /// `bytes`
    Bytes,
    /// `string`
    String,
    /// `T[]`
    Array(Box<AbiType>),
    /// `T[k]`
    FixedArray(Box<AbiType>, usize),
    /// `(T1,T2,...)`
    Tuple(TupleType),
}

impl AbiType {
    /// Builds a dynamic array type `elem[]`.
    pub fn array(elem: AbiType) -> Self {
        AbiType::Array(Box::new(elem))
    }

    /// Builds a fixed array type `elem[len]`.
    pub fn fixed_array(elem: AbiType, len: usize) -> Self {
        AbiType::FixedArray(Box::new(elem), len)
    }

    /// Builds a tuple type from `(name, type)` pairs in declaration order.
    pub fn tuple<N: Into<String>>(fields: impl IntoIterator<Item = (N, AbiType)>) -> Self {
        AbiType::Tuple(TupleType::new(
            fields
                .into_iter()
                .map(|(name, ty)| TupleField::new(name, ty))
                .collect(),
        ))
    }

    /// Builds a tuple type standing for the Solidity struct `name`.
    pub fn named_tuple<N: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (N, AbiType)>,
    ) -> Self {
        match AbiType::tuple(fields) {
            AbiType::Tuple(tuple) => AbiType::Tuple(tuple.with_name(name)),
            other => other,
        }
    }

    /// Returns `true` if the encoded size of the type depends on the value.
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(elem, _) => elem.is_dynamic(),
            AbiType::Tuple(tuple) => tuple.is_dynamic(),
            AbiType::Address
            | AbiType::Bool
            | AbiType::Uint(_)
            | AbiType::Int(_)
            | AbiType::FixedBytes(_) => false,
        }
    }

    /// Returns `true` for the elementary types that fit in a single word.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            AbiType::Address
                | AbiType::Bool
                | AbiType::Uint(_)
                | AbiType::Int(_)
                | AbiType::FixedBytes(_)
        )
    }

    /// Checks integer widths, fixed bytes sizes, tuple arity and fixed array lengths, recursively.
    pub fn validate(&self) -> Result<(), TypeError> {
        match self {
            AbiType::Uint(bits) | AbiType::Int(bits) => {
                if *bits == 0 || *bits > 256 || bits % 8 != 0 {
                    return Err(TypeError::InvalidIntWidth(*bits));
                }
                Ok(())
            }
            AbiType::FixedBytes(size) => {
                if *size == 0 || *size > WORD_SIZE {
                    return Err(TypeError::InvalidBytesSize(*size));
                }
                Ok(())
            }
            AbiType::Array(elem) => elem.validate(),
            AbiType::FixedArray(elem, _) => {
                elem.validate()?;
                match self.fixed_elements() {
                    Some(1..=MAX_FIXED_ELEMENTS) => Ok(()),
                    _ => Err(TypeError::FixedArrayLength(self.canonical())),
                }
            }
            AbiType::Tuple(tuple) => {
                if tuple.is_empty() {
                    return Err(TypeError::EmptyTuple);
                }
                tuple.types().try_for_each(AbiType::validate)
            }
            AbiType::Address | AbiType::Bool | AbiType::Bytes | AbiType::String => Ok(()),
        }
    }

    /// Elements a fixed array expands to, counting nested fixed arrays. `None` on overflow.
    fn fixed_elements(&self) -> Option<usize> {
        match self {
            AbiType::FixedArray(elem, len) => elem.fixed_elements()?.checked_mul(*len),
            _ => Some(1),
        }
    }

    /// The canonical type string used in signatures, e.g. `(uint64,bytes32[])`.
    pub fn canonical(&self) -> String {
        self.sol_type().sol_type_name().into_owned()
    }

    /// The equivalent alloy dynamic type, used by the codec.
    pub fn sol_type(&self) -> DynSolType {
        match self {
            AbiType::Address => DynSolType::Address,
            AbiType::Bool => DynSolType::Bool,
            AbiType::Uint(bits) => DynSolType::Uint(*bits),
            AbiType::Int(bits) => DynSolType::Int(*bits),
            AbiType::FixedBytes(size) => DynSolType::FixedBytes(*size),
            AbiType::Bytes => DynSolType::Bytes,
            AbiType::String => DynSolType::String,
            AbiType::Array(elem) => DynSolType::Array(Box::new(elem.sol_type())),
            AbiType::FixedArray(elem, len) => {
                DynSolType::FixedArray(Box::new(elem.sol_type()), *len)
            }
            AbiType::Tuple(tuple) => DynSolType::Tuple(tuple.types().map(AbiType::sol_type).collect()),
        }
    }

    /// The `type` value of the JSON ABI: tuples are spelled `tuple`, with array suffixes kept.
    pub fn json_type(&self) -> String {
        match self {
            AbiType::Tuple(_) => "tuple".to_string(),
            AbiType::Array(elem) => format!("{}[]", elem.json_type()),
            AbiType::FixedArray(elem, len) => format!("{}[{len}]", elem.json_type()),
            _ => self.canonical(),
        }
    }

    /// The `internalType` of the JSON ABI.
    /// Named tuples read `struct Name`, anonymous tuples have none.
    pub fn internal_type(&self) -> Option<String> {
        match self {
            AbiType::Tuple(tuple) => tuple.name().map(|name| format!("struct {name}")),
            AbiType::Array(elem) => elem.internal_type().map(|inner| format!("{inner}[]")),
            AbiType::FixedArray(elem, len) => {
                elem.internal_type().map(|inner| format!("{inner}[{len}]"))
            }
            _ => Some(self.canonical()),
        }
    }

    /// The innermost tuple fields, if the type is a tuple or an array of tuples.
    pub fn components(&self) -> Option<&[TupleField]> {
        match self {
            AbiType::Tuple(tuple) => Some(tuple.fields()),
            AbiType::Array(elem) | AbiType::FixedArray(elem, _) => elem.components(),
            _ => None,
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl TryFrom<DynSolType> for AbiType {
    type Error = TypeError;

    /// Tuple fields converted this way are unnamed.
    fn try_from(ty: DynSolType) -> Result<Self, Self::Error> {
        Ok(match ty {
            DynSolType::Address => AbiType::Address,
            DynSolType::Bool => AbiType::Bool,
            DynSolType::Uint(bits) => AbiType::Uint(bits),
            DynSolType::Int(bits) => AbiType::Int(bits),
            DynSolType::FixedBytes(size) => AbiType::FixedBytes(size),
            DynSolType::Bytes => AbiType::Bytes,
            DynSolType::String => AbiType::String,
            DynSolType::Array(elem) => AbiType::array(AbiType::try_from(*elem)?),
            DynSolType::FixedArray(elem, len) => AbiType::fixed_array(AbiType::try_from(*elem)?, len),
            DynSolType::Tuple(types) => AbiType::Tuple(TupleType::new(
                types
                    .into_iter()
                    .map(|ty| AbiType::try_from(ty).map(|ty| TupleField::new("", ty)))
                    .collect::<Result<_, _>>()?,
            )),
            other => return Err(TypeError::Unsupported(other.to_string())),
        })
    }
}

impl FromStr for AbiType {
    type Err = TypeError;

    /// Parses a Solidity type string. `uint` and `int` stand for their 256-bit forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Widths and lengths are plain decimal; enum paths like `Lib.Kind` are not types here.
        let padded = s
            .split(|c: char| !c.is_ascii_digit())
            .any(|digits| digits.len() > 1 && digits.starts_with('0'));
        if padded || s.contains('.') {
            return Err(TypeError::NonCanonical(s.to_string()));
        }

        let parsed = DynSolType::parse(s).map_err(|e| TypeError::Parse {
            ty: s.to_string(),
            reason: e.to_string(),
        })?;
        let ty = AbiType::try_from(parsed)?;
        ty.validate()?;
        Ok(ty)
    }
}
