use alloy::primitives::{B256, Bytes};
use rollups_bindings::{OutputValidityProof, Proof};

pub mod mock;

pub use mock::{CallKind, CallResponse, MockTransport, Outcome, RecordedCall};

/// Initialises `env_logger` for tests. Safe to call from every test.
pub fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .is_test(true)
        .try_init();
}

/// A proof with no sibling inside the output hashes tree and two siblings
/// inside the epoch tree.
pub fn sample_proof() -> Proof {
    Proof {
        validity: OutputValidityProof {
            input_index_within_epoch: 3,
            output_index_within_input: 1,
            output_hashes_root_hash: B256::repeat_byte(0x11),
            vouchers_epoch_root_hash: B256::repeat_byte(0x22),
            notices_epoch_root_hash: B256::repeat_byte(0x33),
            machine_state_hash: B256::repeat_byte(0x44),
            output_hash_in_output_hashes_siblings: Vec::new(),
            output_hashes_in_epoch_siblings: vec![B256::repeat_byte(0xaa), B256::repeat_byte(0xbb)],
        },
        context: Bytes::from_static(b"epoch context"),
    }
}
