use alloy::primitives::{B256, Bytes};

use crate::codec::DecodingError;
use crate::types::AbiType;
use crate::value::AbiValue;

/// Proof that an output (voucher or notice) belongs to a finalized epoch.
/// Field order matches the on-chain `OutputValidityProof` struct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputValidityProof {
    pub input_index_within_epoch: u64,
    pub output_index_within_input: u64,
    pub output_hashes_root_hash: B256,
    pub vouchers_epoch_root_hash: B256,
    pub notices_epoch_root_hash: B256,
    pub machine_state_hash: B256,
    pub output_hash_in_output_hashes_siblings: Vec<B256>,
    pub output_hashes_in_epoch_siblings: Vec<B256>,
}

/// Argument of `executeVoucher` and `validateNotice`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Proof {
    pub validity: OutputValidityProof,
    pub context: Bytes,
}

/// ABI type of [`OutputValidityProof`].
pub fn output_validity_proof_type() -> AbiType {
    let siblings = || AbiType::array(AbiType::FixedBytes(32));
    AbiType::named_tuple(
        "OutputValidityProof",
        [
            ("inputIndexWithinEpoch", AbiType::Uint(64)),
            ("outputIndexWithinInput", AbiType::Uint(64)),
            ("outputHashesRootHash", AbiType::FixedBytes(32)),
            ("vouchersEpochRootHash", AbiType::FixedBytes(32)),
            ("noticesEpochRootHash", AbiType::FixedBytes(32)),
            ("machineStateHash", AbiType::FixedBytes(32)),
            ("outputHashInOutputHashesSiblings", siblings()),
            ("outputHashesInEpochSiblings", siblings()),
        ],
    )
}

/// ABI type of [`Proof`].
pub fn proof_type() -> AbiType {
    AbiType::named_tuple(
        "Proof",
        [
            ("validity", output_validity_proof_type()),
            ("context", AbiType::Bytes),
        ],
    )
}

impl From<OutputValidityProof> for AbiValue {
    fn from(proof: OutputValidityProof) -> Self {
        AbiValue::tuple([
            AbiValue::from(proof.input_index_within_epoch),
            AbiValue::from(proof.output_index_within_input),
            AbiValue::from(proof.output_hashes_root_hash),
            AbiValue::from(proof.vouchers_epoch_root_hash),
            AbiValue::from(proof.notices_epoch_root_hash),
            AbiValue::from(proof.machine_state_hash),
            AbiValue::array(proof.output_hash_in_output_hashes_siblings),
            AbiValue::array(proof.output_hashes_in_epoch_siblings),
        ])
    }
}

impl From<Proof> for AbiValue {
    fn from(proof: Proof) -> Self {
        AbiValue::tuple([AbiValue::from(proof.validity), AbiValue::Bytes(proof.context)])
    }
}

fn shape_error() -> DecodingError {
    DecodingError::UnexpectedShape(output_validity_proof_type().canonical())
}

fn u64_field(value: &AbiValue) -> Result<u64, DecodingError> {
    value
        .as_uint()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(shape_error)
}

fn word_field(value: &AbiValue) -> Result<B256, DecodingError> {
    value.as_b256().ok_or_else(shape_error)
}

fn words_field(value: &AbiValue) -> Result<Vec<B256>, DecodingError> {
    value
        .as_array()
        .ok_or_else(shape_error)?
        .iter()
        .map(word_field)
        .collect()
}

impl TryFrom<&AbiValue> for OutputValidityProof {
    type Error = DecodingError;

    fn try_from(value: &AbiValue) -> Result<Self, Self::Error> {
        let [
            input_index,
            output_index,
            output_hashes_root,
            vouchers_root,
            notices_root,
            machine_state,
            output_siblings,
            epoch_siblings,
        ] = value.as_tuple().ok_or_else(shape_error)?
        else {
            return Err(shape_error());
        };

        Ok(Self {
            input_index_within_epoch: u64_field(input_index)?,
            output_index_within_input: u64_field(output_index)?,
            output_hashes_root_hash: word_field(output_hashes_root)?,
            vouchers_epoch_root_hash: word_field(vouchers_root)?,
            notices_epoch_root_hash: word_field(notices_root)?,
            machine_state_hash: word_field(machine_state)?,
            output_hash_in_output_hashes_siblings: words_field(output_siblings)?,
            output_hashes_in_epoch_siblings: words_field(epoch_siblings)?,
        })
    }
}

impl TryFrom<&AbiValue> for Proof {
    type Error = DecodingError;

    fn try_from(value: &AbiValue) -> Result<Self, Self::Error> {
        let shape = || DecodingError::UnexpectedShape(proof_type().canonical());
        let [validity, context] = value.as_tuple().ok_or_else(shape)? else {
            return Err(shape());
        };
        Ok(Self {
            validity: OutputValidityProof::try_from(validity)?,
            context: context.as_bytes().cloned().ok_or_else(shape)?,
        })
    }
}

impl TryFrom<AbiValue> for Proof {
    type Error = DecodingError;

    fn try_from(value: AbiValue) -> Result<Self, Self::Error> {
        Proof::try_from(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn proof_type_is_dynamic() {
        assert_eq!(
            proof_type().canonical(),
            "((uint64,uint64,bytes32,bytes32,bytes32,bytes32,bytes32[],bytes32[]),bytes)"
        );
        assert!(proof_type().is_dynamic());
    }

    #[test]
    fn converts_losslessly() {
        let proof = Proof {
            validity: OutputValidityProof {
                input_index_within_epoch: u64::MAX,
                output_hashes_in_epoch_siblings: vec![B256::repeat_byte(1)],
                ..Default::default()
            },
            context: Bytes::from_static(b"ctx"),
        };
        let value = AbiValue::from(proof.clone());
        assert!(value.matches(&proof_type()));

        let encoded = codec::encode(&proof_type(), &value).unwrap();
        let decoded = codec::decode(&proof_type(), &encoded).unwrap();
        assert_eq!(Proof::try_from(decoded).unwrap(), proof);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(Proof::try_from(AbiValue::from(true)).is_err());
        assert!(Proof::try_from(AbiValue::tuple([AbiValue::from(1u8)])).is_err());
    }
}
