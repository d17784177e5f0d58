use std::sync::Arc;

use alloy::primitives::address;
use anyhow::Result;
use rollups_bindings::bindings::{cartesi_input_box, erc20, erc721};
use rollups_bindings::contract::Error;
use rollups_bindings::contracts;
use rollups_bindings::transport::RemoteCallError;
use rollups_bindings::{AbiValue, Address, B256, Bytes, StateMutability, TxOutcome, TxStatus, U256};
use rollups_bindings_test_utils::{CallKind, MockTransport, Outcome, init_logger};

const TOKEN: Address = address!("0x4242424242424242424242424242424242424242");
const INPUT_BOX: Address = address!("0x59b22d57d4f067708ab0c00552767405926dc768");
const DAPP: Address = address!("0x70ac08179605af2d9e75782b8decdd3c22aa4d0c");

#[tokio::test]
async fn test_write_submits_and_confirms() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let nft = erc721::get(TOKEN, Arc::new(mock.clone()));
    let pending = nft
        .write("approve", &[DAPP.into(), U256::from(7).into()], None)
        .await?;
    assert_eq!(pending.status(), TxStatus::Pending);
    assert_eq!(pending.signature(), "approve(address,uint256)");

    let tx_hash = pending.tx_hash();
    let outcome = pending.wait().await?;
    assert!(outcome.is_confirmed());
    assert_eq!(outcome.status(), TxStatus::Confirmed);
    assert_eq!(outcome.transaction_hash(), tx_hash);
    assert_eq!(outcome.receipt().map(|r| r.gas_used), Some(21_000));

    let calls = mock.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::Submit);
    assert_eq!(calls[0].to, TOKEN);
    assert_eq!(calls[0].value, U256::ZERO);
    let approve = contracts::erc721().functions("approve")?[0].clone();
    assert_eq!(calls[0].selector(), Some(approve.selector()));
    assert_eq!(
        approve.decode_input(&calls[0].data)?,
        vec![AbiValue::from(DAPP), AbiValue::from(7u8)]
    );
    Ok(())
}

#[tokio::test]
async fn test_write_forwards_value_to_payable_functions() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let value = U256::from(1_000_000_000u64);
    erc721::write(
        TOKEN,
        Arc::new(mock.clone()),
        "approve",
        &[DAPP.into(), U256::from(1).into()],
        Some(value),
    )
    .await?;

    let calls = mock.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].value, value);
    Ok(())
}

#[tokio::test]
async fn test_write_reports_revert_and_drop() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let token = erc20::get(TOKEN, Arc::new(mock.clone()));
    let args: [AbiValue; 2] = [DAPP.into(), U256::from(5).into()];

    mock.set_outcome(Outcome::Revert).await;
    let reverted = token.write("transfer", &args, None).await?.wait().await?;
    assert!(matches!(reverted, TxOutcome::Reverted(_)));
    assert_eq!(reverted.status(), TxStatus::Reverted);
    assert!(!reverted.is_confirmed());

    mock.set_outcome(Outcome::Drop).await;
    let pending = token.write("transfer", &args, None).await?;
    let tx_hash = pending.tx_hash();
    match pending.wait().await? {
        TxOutcome::Dropped {
            transaction_hash,
            reason,
        } => {
            assert_eq!(transaction_hash, tx_hash);
            assert!(!reason.is_empty());
        }
        other => panic!("Expected a dropped transaction, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_write_rejects_value_on_nonpayable_functions() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let token = erc20::get(TOKEN, Arc::new(mock.clone()));
    let result = token
        .write(
            "transfer",
            &[DAPP.into(), U256::from(5).into()],
            Some(U256::from(1)),
        )
        .await;
    assert!(matches!(result, Err(Error::ArgumentShape { .. })));

    // An explicit zero is the same as no value.
    token
        .write(
            "transfer",
            &[DAPP.into(), U256::from(5).into()],
            Some(U256::ZERO),
        )
        .await?;
    assert_eq!(mock.calls().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_write_rejects_read_only_functions() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let token = erc20::get(TOKEN, Arc::new(mock.clone()));
    let result = token.write("balanceOf", &[DAPP.into()], None).await;
    match result {
        Err(Error::InvalidMutability {
            mutability,
            operation,
            ..
        }) => {
            assert_eq!(mutability, StateMutability::View);
            assert_eq!(operation, "write");
        }
        other => panic!("Expected InvalidMutability, got {other:?}"),
    }
    assert!(mock.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_prepare_write_simulates_before_submitting() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let add_input = contracts::cartesi_input_box().functions("addInput")?[0].clone();
    let input_hash = B256::repeat_byte(0x5e);
    mock.respond_with(&add_input, &[input_hash.into()]).await;

    let input_box = cartesi_input_box::get(INPUT_BOX, Arc::new(mock.clone()));
    let prepared = input_box
        .prepare_write()
        .function("addInput")
        .args(vec![DAPP.into(), Bytes::from_static(b"hello").into()])
        .simulate(true)
        .call()
        .await?;
    assert_eq!(prepared.status(), TxStatus::Unsubmitted);
    assert_eq!(prepared.to(), INPUT_BOX);
    assert_eq!(prepared.value(), U256::ZERO);
    assert_eq!(prepared.function().signature(), "addInput(address,bytes)");
    assert_eq!(prepared.simulated(), Some(&[AbiValue::from(input_hash)][..]));

    let calls = mock.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::Simulate);
    assert_eq!(&calls[0].data, prepared.calldata());

    // A prepared write may be sent more than once.
    let first = prepared.submit().await?;
    let second = prepared.submit().await?;
    assert_ne!(first.tx_hash(), second.tx_hash());

    let calls = mock.calls().await;
    assert_eq!(calls.len(), 3);
    assert!(calls[1..].iter().all(|call| call.kind == CallKind::Submit));
    assert!(calls[1..].iter().all(|call| &call.data == prepared.calldata()));
    Ok(())
}

#[tokio::test]
async fn test_prepare_write_without_simulation_touches_nothing() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let prepared = cartesi_input_box::prepare_write(
        INPUT_BOX,
        Arc::new(mock.clone()),
        "addInput",
        vec![DAPP.into(), Bytes::new().into()],
        None,
        false,
    )
    .await?;
    assert!(prepared.simulated().is_none());
    assert!(mock.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_simulation_is_not_submitted() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let add_input = contracts::cartesi_input_box().functions("addInput")?[0].clone();
    mock.revert_with(&add_input, "InputSizeExceedsLimit").await;

    let result = cartesi_input_box::get(INPUT_BOX, Arc::new(mock.clone()))
        .prepare_write()
        .function("addInput")
        .args(vec![DAPP.into(), Bytes::new().into()])
        .simulate(true)
        .call()
        .await;
    match result {
        Err(Error::RemoteCall(RemoteCallError::Reverted { reason, .. })) => {
            assert_eq!(reason, "InputSizeExceedsLimit");
        }
        other => panic!("Expected a revert, got {other:?}"),
    }

    let calls = mock.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::Simulate);
    Ok(())
}
