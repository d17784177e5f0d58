//! Built-in contract schemas.
//!
//! Each schema is built once, on first use, and shared afterwards.

use std::sync::{Arc, LazyLock};

use crate::proof::proof_type;
use crate::schema::{AbiEntry, AbiSchema, Event, Function, StateMutability};
use crate::types::AbiType;

use StateMutability::{NonPayable, Payable, View};

/// Version of the ERC20 schema.
pub const ERC20_VERSION: &str = "1.0.0";
/// Version of the ERC721 schema.
pub const ERC721_VERSION: &str = "1.0.0";
/// Version of the Cartesi rollups contract schemas (`CartesiDApp`, `InputBox`, `ERC20Portal`).
pub const CARTESI_ROLLUPS_VERSION: &str = "1.0.0";

fn uint256() -> AbiType {
    AbiType::Uint(256)
}

fn bytes32() -> AbiType {
    AbiType::FixedBytes(32)
}

fn build(name: &str, version: &str, entries: Vec<AbiEntry>) -> Arc<AbiSchema> {
    Arc::new(
        AbiSchema::new(name, version, entries)
            .unwrap_or_else(|e| panic!("built-in schema `{name}` is malformed: {e}")),
    )
}

static ERC20: LazyLock<Arc<AbiSchema>> = LazyLock::new(|| {
    build(
        "erc20",
        ERC20_VERSION,
        vec![
            Event::new("Approval")
                .indexed("owner", AbiType::Address)
                .indexed("spender", AbiType::Address)
                .data("value", uint256())
                .into(),
            Event::new("Transfer")
                .indexed("from", AbiType::Address)
                .indexed("to", AbiType::Address)
                .data("value", uint256())
                .into(),
            Function::new("allowance", View)
                .input("owner", AbiType::Address)
                .input("spender", AbiType::Address)
                .output("", uint256())
                .into(),
            Function::new("approve", NonPayable)
                .input("spender", AbiType::Address)
                .input("amount", uint256())
                .output("", AbiType::Bool)
                .into(),
            Function::new("balanceOf", View)
                .input("account", AbiType::Address)
                .output("", uint256())
                .into(),
            Function::new("decimals", View)
                .output("", AbiType::Uint(8))
                .into(),
            Function::new("name", View).output("", AbiType::String).into(),
            Function::new("symbol", View).output("", AbiType::String).into(),
            Function::new("totalSupply", View).output("", uint256()).into(),
            Function::new("transfer", NonPayable)
                .input("recipient", AbiType::Address)
                .input("amount", uint256())
                .output("", AbiType::Bool)
                .into(),
            Function::new("transferFrom", NonPayable)
                .input("sender", AbiType::Address)
                .input("recipient", AbiType::Address)
                .input("amount", uint256())
                .output("", AbiType::Bool)
                .into(),
            Function::new("increaseAllowance", NonPayable)
                .input("spender", AbiType::Address)
                .input("addedValue", uint256())
                .output("", AbiType::Bool)
                .into(),
            Function::new("decreaseAllowance", NonPayable)
                .input("spender", AbiType::Address)
                .input("subtractedValue", uint256())
                .output("", AbiType::Bool)
                .into(),
        ],
    )
});

// `tokenByIndex` and `safeTransferFrom` are overloaded.
static ERC721: LazyLock<Arc<AbiSchema>> = LazyLock::new(|| {
    build(
        "erc721",
        ERC721_VERSION,
        vec![
            Event::new("Approval")
                .indexed("owner", AbiType::Address)
                .indexed("spender", AbiType::Address)
                .indexed("tokenId", uint256())
                .into(),
            Event::new("ApprovalForAll")
                .indexed("owner", AbiType::Address)
                .indexed("operator", AbiType::Address)
                .data("approved", AbiType::Bool)
                .into(),
            Event::new("Transfer")
                .indexed("from", AbiType::Address)
                .indexed("to", AbiType::Address)
                .indexed("tokenId", uint256())
                .into(),
            Function::new("approve", Payable)
                .input("spender", AbiType::Address)
                .input("tokenId", uint256())
                .into(),
            Function::new("balanceOf", View)
                .input("account", AbiType::Address)
                .output("", uint256())
                .into(),
            Function::new("getApproved", View)
                .input("tokenId", uint256())
                .output("", AbiType::Address)
                .into(),
            Function::new("isApprovedForAll", View)
                .input("owner", AbiType::Address)
                .input("operator", AbiType::Address)
                .output("", AbiType::Bool)
                .into(),
            Function::new("name", View).output("", AbiType::String).into(),
            Function::new("ownerOf", View)
                .input("tokenId", uint256())
                .output("owner", AbiType::Address)
                .into(),
            Function::new("safeTransferFrom", Payable)
                .input("from", AbiType::Address)
                .input("to", AbiType::Address)
                .input("tokenId", uint256())
                .into(),
            Function::new("safeTransferFrom", NonPayable)
                .input("from", AbiType::Address)
                .input("to", AbiType::Address)
                .input("id", uint256())
                .input("data", AbiType::Bytes)
                .into(),
            Function::new("setApprovalForAll", NonPayable)
                .input("operator", AbiType::Address)
                .input("approved", AbiType::Bool)
                .into(),
            Function::new("symbol", View).output("", AbiType::String).into(),
            Function::new("tokenByIndex", View)
                .input("index", uint256())
                .output("", uint256())
                .into(),
            Function::new("tokenByIndex", View)
                .input("owner", AbiType::Address)
                .input("index", uint256())
                .output("tokenId", uint256())
                .into(),
            Function::new("tokenURI", View)
                .input("tokenId", uint256())
                .output("", AbiType::String)
                .into(),
            Function::new("totalSupply", View).output("", uint256()).into(),
            Function::new("transferFrom", Payable)
                .input("sender", AbiType::Address)
                .input("recipient", AbiType::Address)
                .input("tokenId", uint256())
                .into(),
        ],
    )
});

static CARTESI_DAPP: LazyLock<Arc<AbiSchema>> = LazyLock::new(|| {
    build(
        "cartesi_dapp",
        CARTESI_ROLLUPS_VERSION,
        vec![
            Event::new("NewConsensus")
                .contract_data("newConsensus", "IConsensus")
                .into(),
            Event::new("VoucherExecuted")
                .data("voucherId", uint256())
                .into(),
            Function::new("executeVoucher", NonPayable)
                .input("_destination", AbiType::Address)
                .input("_payload", AbiType::Bytes)
                .input("_proof", proof_type())
                .output("", AbiType::Bool)
                .into(),
            Function::new("getConsensus", View)
                .contract_output("", "IConsensus")
                .into(),
            Function::new("getTemplateHash", View)
                .output("", bytes32())
                .into(),
            Function::new("migrateToConsensus", NonPayable)
                .contract_input("_newConsensus", "IConsensus")
                .into(),
            Function::new("validateNotice", View)
                .input("_notice", AbiType::Bytes)
                .input("_proof", proof_type())
                .output("", AbiType::Bool)
                .into(),
            Function::new("wasVoucherExecuted", View)
                .input("_inputIndex", uint256())
                .input("_outputIndexWithinInput", uint256())
                .output("", AbiType::Bool)
                .into(),
        ],
    )
});

static CARTESI_INPUT_BOX: LazyLock<Arc<AbiSchema>> = LazyLock::new(|| {
    build(
        "cartesi_input_box",
        CARTESI_ROLLUPS_VERSION,
        vec![
            Event::new("InputAdded")
                .indexed("dapp", AbiType::Address)
                .indexed("inputIndex", uint256())
                .data("sender", AbiType::Address)
                .data("input", AbiType::Bytes)
                .into(),
            Function::new("addInput", NonPayable)
                .input("_dapp", AbiType::Address)
                .input("_input", AbiType::Bytes)
                .output("", bytes32())
                .into(),
            Function::new("getInputHash", View)
                .input("_dapp", AbiType::Address)
                .input("_index", uint256())
                .output("", bytes32())
                .into(),
            Function::new("getNumberOfInputs", View)
                .input("_dapp", AbiType::Address)
                .output("", uint256())
                .into(),
        ],
    )
});

static CARTESI_ERC20_PORTAL: LazyLock<Arc<AbiSchema>> = LazyLock::new(|| {
    build(
        "cartesi_erc20_portal",
        CARTESI_ROLLUPS_VERSION,
        vec![
            Function::new("depositERC20Tokens", NonPayable)
                .contract_input("_token", "IERC20")
                .input("_dapp", AbiType::Address)
                .input("_amount", uint256())
                .input("_execLayerData", AbiType::Bytes)
                .into(),
            Function::new("getInputBox", View)
                .contract_output("", "IInputBox")
                .into(),
        ],
    )
});

/// Standard ERC20 token, including the OpenZeppelin allowance helpers.
pub fn erc20() -> Arc<AbiSchema> {
    ERC20.clone()
}

/// Standard ERC721 token.
pub fn erc721() -> Arc<AbiSchema> {
    ERC721.clone()
}

/// The rollups application contract: voucher execution and notice validation.
pub fn cartesi_dapp() -> Arc<AbiSchema> {
    CARTESI_DAPP.clone()
}

/// The rollups input box.
pub fn cartesi_input_box() -> Arc<AbiSchema> {
    CARTESI_INPUT_BOX.clone()
}

/// The ERC20 deposit portal.
pub fn cartesi_erc20_portal() -> Arc<AbiSchema> {
    CARTESI_ERC20_PORTAL.clone()
}

/// Every built-in schema.
pub fn all() -> [Arc<AbiSchema>; 5] {
    [
        erc20(),
        erc721(),
        cartesi_dapp(),
        cartesi_input_box(),
        cartesi_erc20_portal(),
    ]
}
