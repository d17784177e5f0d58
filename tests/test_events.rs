use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::address;
use anyhow::Result;
use futures::StreamExt;
use rollups_bindings::bindings::{cartesi_erc20_portal, cartesi_input_box, erc20};
use rollups_bindings::contract::Error;
use rollups_bindings::contracts;
use rollups_bindings::transport::RemoteCallError;
use rollups_bindings::{
    AbiValue, Address, Bytes, EventFilter, SubscriptionError, U256, WatchHandle,
};
use rollups_bindings_test_utils::{MockTransport, init_logger};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const INPUT_BOX: Address = address!("0x59b22d57d4f067708ab0c00552767405926dc768");
const DAPP: Address = address!("0x000000000000000000000000000000000000abcd");
const OTHER_DAPP: Address = address!("0x0000000000000000000000000000000000001234");
const SENDER: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

fn input_values(dapp: Address, index: u64, payload: &'static [u8]) -> Vec<AbiValue> {
    vec![
        dapp.into(),
        U256::from(index).into(),
        SENDER.into(),
        Bytes::from_static(payload).into(),
    ]
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_watch_delivers_only_matching_events() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let schema = contracts::cartesi_input_box();
    let input_added = schema.event("InputAdded")?;

    let (sender, mut received) = mpsc::unbounded_channel();
    let watch = cartesi_input_box::watch_event(
        INPUT_BOX,
        Arc::new(mock.clone()),
        EventFilter::new("InputAdded").with("dapp", DAPP),
        move |event| {
            let _ = sender.send(event);
        },
    )
    .await?;
    assert!(watch.is_active());
    assert_eq!(mock.subscriber_count().await, 1);

    // The mock routes by address only, so both logs reach the subscription.
    let foreign = mock
        .log_for(input_added, INPUT_BOX, &input_values(OTHER_DAPP, 0, b"not ours"))
        .await;
    let ours = mock
        .log_for(input_added, INPUT_BOX, &input_values(DAPP, 0, b"hello"))
        .await;
    assert_eq!(mock.emit(foreign).await, 1);
    assert_eq!(mock.emit(ours.clone()).await, 1);

    let event = timeout(Duration::from_secs(5), received.recv())
        .await?
        .expect("watch ended early");
    assert_eq!(event.name, "InputAdded");
    assert_eq!(event.address, INPUT_BOX);
    assert_eq!(event.block_number, ours.block_number);
    assert_eq!(event.transaction_hash, ours.transaction_hash);
    assert_eq!(event.get("dapp"), Some(&AbiValue::from(DAPP)));
    assert_eq!(event.get("inputIndex"), Some(&AbiValue::from(0u8)));
    assert_eq!(event.get("sender"), Some(&AbiValue::from(SENDER)));
    assert_eq!(
        event.get("input"),
        Some(&AbiValue::from(Bytes::from_static(b"hello")))
    );
    assert!(received.try_recv().is_err());

    watch.unsubscribe();
    Ok(())
}

#[tokio::test]
async fn test_no_callback_after_unsubscribe() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let input_added = contracts::cartesi_input_box().event("InputAdded")?.clone();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();

    let handle = cartesi_input_box::get(INPUT_BOX, Arc::new(mock.clone()));
    let watch = handle
        .watch_event(EventFilter::new("InputAdded"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await?;

    let first = mock
        .log_for(&input_added, INPUT_BOX, &input_values(DAPP, 0, b"first"))
        .await;
    mock.emit(first).await;
    wait_until(|| delivered.load(Ordering::SeqCst) == 1).await;

    watch.unsubscribe();
    for index in 1..5 {
        let log = mock
            .log_for(&input_added, INPUT_BOX, &input_values(DAPP, index, b"late"))
            .await;
        mock.emit(log).await;
    }
    sleep(Duration::from_millis(100)).await;
    assert_eq!(delivered.load(Ordering::SeqCst), 1);

    // The aborted task releases its subscription.
    timeout(Duration::from_secs(5), async {
        while mock.subscriber_count().await != 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsubscribe_races_with_delivery() -> Result<()> {
    init_logger(false);

    let input_added = contracts::cartesi_input_box().event("InputAdded")?.clone();
    for round in 0..20u64 {
        let mock = MockTransport::new();
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (on_start, on_finish) = (started.clone(), finished.clone());
        let watch = cartesi_input_box::watch_event(
            INPUT_BOX,
            Arc::new(mock.clone()),
            EventFilter::new("InputAdded"),
            move |_| {
                on_start.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                on_finish.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await?;

        let log = mock
            .log_for(&input_added, INPUT_BOX, &input_values(DAPP, round, b"racing"))
            .await;
        mock.emit(log).await;
        if round % 2 == 0 {
            // Unsubscribe while the callback is running.
            wait_until(|| started.load(Ordering::SeqCst) == 1).await;
        }
        watch.unsubscribe();

        let seen = started.load(Ordering::SeqCst);
        assert!(seen <= 1, "round {round}: {seen} callbacks");
        assert_eq!(finished.load(Ordering::SeqCst), seen, "round {round}");

        let late = mock
            .log_for(&input_added, INPUT_BOX, &input_values(DAPP, round + 1, b"late"))
            .await;
        mock.emit(late).await;
        sleep(Duration::from_millis(30)).await;
        assert_eq!(started.load(Ordering::SeqCst), seen, "round {round}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_callback_can_unsubscribe_its_own_watch() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let input_added = contracts::cartesi_input_box().event("InputAdded")?.clone();
    let slot: Arc<Mutex<Option<WatchHandle>>> = Arc::default();
    let own = slot.clone();
    let (sender, mut received) = mpsc::unbounded_channel();

    let watch = cartesi_input_box::watch_event(
        INPUT_BOX,
        Arc::new(mock.clone()),
        EventFilter::new("InputAdded"),
        move |event| {
            let handle = own.lock().ok().and_then(|mut slot| slot.take());
            if let Some(handle) = handle {
                handle.unsubscribe();
            }
            let _ = sender.send(event);
        },
    )
    .await?;
    *slot.lock().expect("slot poisoned") = Some(watch);

    let first = mock
        .log_for(&input_added, INPUT_BOX, &input_values(DAPP, 0, b"first"))
        .await;
    mock.emit(first).await;
    let event = timeout(Duration::from_secs(5), received.recv())
        .await?
        .expect("callback did not return");
    assert_eq!(event.get("input"), Some(&AbiValue::from(Bytes::from_static(b"first"))));
    assert!(slot.lock().expect("slot poisoned").is_none());

    timeout(Duration::from_secs(5), async {
        while mock.subscriber_count().await != 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let second = mock
        .log_for(&input_added, INPUT_BOX, &input_values(DAPP, 1, b"second"))
        .await;
    assert_eq!(mock.emit(second).await, 0);
    // The aborted task drops the callback together with its sender.
    assert!(timeout(Duration::from_secs(5), received.recv()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_dropping_the_handle_unsubscribes() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let watch = cartesi_input_box::watch_event(
        INPUT_BOX,
        Arc::new(mock.clone()),
        EventFilter::new("InputAdded"),
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    )
    .await?;
    drop(watch);

    let input_added = contracts::cartesi_input_box().event("InputAdded")?.clone();
    let log = mock
        .log_for(&input_added, INPUT_BOX, &input_values(DAPP, 0, b"ignored"))
        .await;
    mock.emit(log).await;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_event_stream_decodes_filtered_transfers() -> Result<()> {
    init_logger(false);

    let token = address!("0x4242424242424242424242424242424242424242");
    let mock = MockTransport::new();
    let transfer = contracts::erc20().event("Transfer")?.clone();

    let mut events = erc20::get(token, Arc::new(mock.clone()))
        .event_stream(EventFilter::new("Transfer").with("to", DAPP))
        .await?;

    let elsewhere = mock
        .log_for(
            &transfer,
            token,
            &[SENDER.into(), OTHER_DAPP.into(), U256::from(1).into()],
        )
        .await;
    let incoming = mock
        .log_for(
            &transfer,
            token,
            &[SENDER.into(), DAPP.into(), U256::from(250).into()],
        )
        .await;
    mock.emit(elsewhere).await;
    mock.emit(incoming).await;

    let event = timeout(Duration::from_secs(5), events.next())
        .await?
        .expect("stream ended early")?;
    assert_eq!(event.get("from"), Some(&AbiValue::from(SENDER)));
    assert_eq!(event.get("to"), Some(&AbiValue::from(DAPP)));
    assert_eq!(event.get("value"), Some(&AbiValue::from(250u8)));
    let indexed: Vec<_> = event.fields.iter().map(|field| field.indexed).collect();
    assert_eq!(indexed, vec![true, true, false]);
    Ok(())
}

#[tokio::test]
async fn test_out_of_order_logs_end_the_watch() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let input_added = contracts::cartesi_input_box().event("InputAdded")?.clone();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let watch = cartesi_input_box::watch_event(
        INPUT_BOX,
        Arc::new(mock.clone()),
        EventFilter::new("InputAdded"),
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    )
    .await?;

    let earlier = mock
        .log_for(&input_added, INPUT_BOX, &input_values(DAPP, 0, b"a"))
        .await;
    let later = mock
        .log_for(&input_added, INPUT_BOX, &input_values(DAPP, 1, b"b"))
        .await;
    let earlier_block = earlier.block_number.unwrap_or_default();
    mock.emit(later).await;
    mock.emit(earlier).await;

    let result = timeout(Duration::from_secs(5), watch.closed()).await?;
    assert_eq!(
        result,
        Err(SubscriptionError::OutOfOrder {
            block: earlier_block,
            index: 0
        })
    );
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_transport_failure_ends_the_watch() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let watch = cartesi_input_box::watch_event(
        INPUT_BOX,
        Arc::new(mock.clone()),
        EventFilter::new("InputAdded").with("dapp", DAPP),
        |_| {},
    )
    .await?;

    mock.fail_subscriptions(RemoteCallError::transport("connection reset"))
        .await;
    let result = timeout(Duration::from_secs(5), watch.closed()).await?;
    assert_eq!(
        result,
        Err(SubscriptionError::Transport(RemoteCallError::Transport(
            "connection reset".to_string()
        )))
    );
    Ok(())
}

#[tokio::test]
async fn test_watch_rejects_unknown_events_and_bad_filters() -> Result<()> {
    init_logger(false);

    let mock = MockTransport::new();
    let portal = cartesi_erc20_portal::get(INPUT_BOX, Arc::new(mock.clone()));
    let missing = portal
        .watch_event(EventFilter::new("InputAdded"), |_| {})
        .await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    let input_box = cartesi_input_box::get(INPUT_BOX, Arc::new(mock.clone()));
    let not_indexed = input_box
        .event_stream(EventFilter::new("InputAdded").with("sender", SENDER))
        .await;
    assert!(matches!(not_indexed, Err(Error::ArgumentShape { .. })));

    assert_eq!(mock.subscriber_count().await, 0);
    Ok(())
}
