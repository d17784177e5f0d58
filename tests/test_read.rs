use std::sync::Arc;

use alloy::primitives::address;
use anyhow::Result;
use rollups_bindings::bindings::{erc20, erc721};
use rollups_bindings::contract::Error;
use rollups_bindings::contracts;
use rollups_bindings::transport::RemoteCallError;
use rollups_bindings::{
    AbiSchema, AbiType, AbiValue, Address, Bytes, ContractHandle, Function, StateMutability, U256,
};
use rollups_bindings_test_utils::{CallKind, CallResponse, MockTransport, init_logger};

const TOKEN: Address = address!("0x4242424242424242424242424242424242424242");

#[tokio::test]
async fn test_read_decodes_outputs() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let schema = contracts::erc20();
    mock.respond_with(schema.functions("decimals")?[0], &[AbiValue::from(18u8)])
        .await;
    mock.respond_with(schema.functions("symbol")?[0], &[AbiValue::from("CTSI")])
        .await;

    let token = erc20::get(TOKEN, Arc::new(mock.clone()));
    assert_eq!(token.read("decimals", &[]).await?, vec![AbiValue::from(18u8)]);
    assert_eq!(token.read("symbol", &[]).await?, vec![AbiValue::from("CTSI")]);

    let calls = mock.calls().await;
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| call.kind == CallKind::Call && call.to == TOKEN));
    Ok(())
}

#[tokio::test]
async fn test_read_rejects_state_changing_functions_before_calling() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let token = erc20::get(TOKEN, Arc::new(mock.clone()));
    let result = token
        .read("transfer", &[Address::ZERO.into(), U256::from(1).into()])
        .await;

    match result {
        Err(Error::InvalidMutability {
            function,
            mutability,
            operation,
        }) => {
            assert_eq!(function, "transfer(address,uint256)");
            assert_eq!(mutability, StateMutability::NonPayable);
            assert_eq!(operation, "read");
        }
        other => panic!("Expected InvalidMutability, got {other:?}"),
    }
    assert!(mock.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_read_validates_argument_shape() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let token = erc20::get(TOKEN, Arc::new(mock.clone()));

    let wrong_type = token.read("balanceOf", &[AbiValue::from(true)]).await;
    assert!(matches!(wrong_type, Err(Error::ArgumentShape { .. })));

    let wrong_arity = token.read("balanceOf", &[]).await;
    assert!(matches!(wrong_arity, Err(Error::ArgumentShape { .. })));

    let unknown = token.read("mint", &[]).await;
    assert!(matches!(unknown, Err(Error::NotFound(_))));

    assert!(mock.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_read_rejects_out_of_range_integers() -> Result<()> {
    init_logger(false);

    let schema = AbiSchema::new(
        "fees",
        "1",
        [Function::new("feeFor", StateMutability::View)
            .input("tier", AbiType::Uint(8))
            .output("", AbiType::Uint(256))
            .into()],
    )?;
    let mock = MockTransport::new();
    let handle = ContractHandle::builder()
        .schema(Arc::new(schema))
        .address(TOKEN)
        .transport(Arc::new(mock.clone()))
        .build();

    let result = handle.read("feeFor", &[AbiValue::from(256u16)]).await;
    assert!(matches!(result, Err(Error::Encoding(_))));
    assert!(mock.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_overloads_resolve_by_arguments() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let schema = contracts::erc721();
    let overloads = schema.functions("tokenByIndex")?;
    mock.respond_with(overloads[0], &[AbiValue::from(7u8)]).await;
    mock.respond_with(overloads[1], &[AbiValue::from(9u8)]).await;

    let nft = erc721::get(TOKEN, Arc::new(mock.clone()));
    let by_index = nft.read("tokenByIndex", &[U256::from(0).into()]).await?;
    let by_owner = nft
        .read("tokenByIndex", &[Address::ZERO.into(), U256::from(0).into()])
        .await?;
    assert_eq!(by_index, vec![AbiValue::from(7u8)]);
    assert_eq!(by_owner, vec![AbiValue::from(9u8)]);

    let selectors: Vec<_> = mock
        .calls()
        .await
        .iter()
        .filter_map(|call| call.selector())
        .collect();
    assert_eq!(selectors, vec![overloads[0].selector(), overloads[1].selector()]);

    let explicit = nft
        .resolve(
            "safeTransferFrom(address,address,uint256,bytes)",
            &[
                Address::ZERO.into(),
                Address::ZERO.into(),
                U256::from(1).into(),
                Bytes::new().into(),
            ],
        )?;
    assert_eq!(explicit.state_mutability, StateMutability::NonPayable);
    Ok(())
}

#[tokio::test]
async fn test_read_surfaces_revert_reasons() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let schema = contracts::erc721();
    mock.revert_with(schema.functions("ownerOf")?[0], "ERC721: invalid token ID")
        .await;

    let nft = erc721::read(
        TOKEN,
        Arc::new(mock.clone()),
        "ownerOf",
        &[U256::from(404).into()],
    )
    .await;
    match nft {
        Err(Error::RemoteCall(RemoteCallError::Reverted { reason, .. })) => {
            assert_eq!(reason, "ERC721: invalid token ID");
        }
        other => panic!("Expected a revert, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_read_reports_malformed_return_data() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let schema = contracts::erc20();
    mock.respond(
        schema.functions("totalSupply")?[0].selector(),
        CallResponse::Return(Bytes::new()),
    )
    .await;
    // Offset to a string tail that is not there.
    let mut dangling = vec![0u8; 32];
    dangling[31] = 0x40;
    mock.respond(
        schema.functions("symbol")?[0].selector(),
        CallResponse::Return(dangling.into()),
    )
    .await;

    let token = erc20::get(TOKEN, Arc::new(mock.clone()));
    let empty = token.read("totalSupply", &[]).await;
    assert!(matches!(empty, Err(Error::Decoding(_))));

    let dangling = token.read("symbol", &[]).await;
    assert!(matches!(dangling, Err(Error::Decoding(_))));
    assert_eq!(mock.calls().await.len(), 2);
    Ok(())
}
