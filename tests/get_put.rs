//! End to end get and put over an in-process [Testnet].

#![cfg(feature = "testnet")]

use std::time::Duration;

use mainline_getput::{
    testnet::{NodeBehavior, Testnet, MAX_BUCKET_SIZE_K},
    transport::TransportError,
    Bytes, Config, Error, Item, MutableItem, QueryContext, SigningKey, WriteOutcome,
};

fn signer() -> SigningKey {
    SigningKey::from_bytes(&[
        56, 171, 62, 85, 105, 58, 155, 209, 189, 8, 59, 109, 137, 84, 84, 201, 221, 115, 7, 228,
        127, 70, 4, 204, 182, 64, 77, 98, 92, 215, 27, 103,
    ])
}

#[tokio::test]
async fn put_get_immutable() {
    let testnet = Testnet::new(50);

    let a = testnet.client();
    let b = testnet.client();
    let ctx = QueryContext::new();

    let value = b"Hello World!";

    let put = a.put_immutable(&ctx, value).await.unwrap();
    assert_eq!(
        put.target().to_string(),
        "e5f96f6f38320f0f33959cb4d3d656452117aadb"
    );
    assert_eq!(put.stored_at().len(), MAX_BUCKET_SIZE_K);

    let response = b.get(&ctx, put.target(), None, None).await.unwrap();

    assert_eq!(response.item, Item::Immutable(Bytes::from_static(value)));
    assert!(response.stats.addrs_tried > 0);
}

#[tokio::test]
async fn client_with_span() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();

    let testnet = Testnet::new(50);
    let client = testnet.client_with_config(Config {
        request_timeout: Duration::from_secs(2),
        span: Some(tracing::info_span!("app", client = "a")),
        ..Default::default()
    });

    assert_eq!(client.config().request_timeout, Duration::from_secs(2));

    let ctx = QueryContext::new();
    let put = client.put_immutable(&ctx, b"traced").await.unwrap();
    let value = client.get_immutable(&ctx, put.target()).await.unwrap();

    assert_eq!(&value[..], b"traced");
}

#[tokio::test]
async fn put_get_mutable() {
    let testnet = Testnet::new(50);

    let a = testnet.client();
    let b = testnet.client();
    let ctx = QueryContext::new();

    let signer = signer();
    let salt = Some(&b"profile"[..]);

    a.put_mutable(&ctx, &signer, b"Hello World!", salt)
        .await
        .unwrap();

    let item = b
        .get_mutable(&ctx, signer.verifying_key().as_bytes(), salt, None)
        .await
        .unwrap();

    assert_eq!(item.value(), b"Hello World!");
    assert_eq!(item.seq(), 1);
    assert_eq!(item.salt(), salt);
}

#[tokio::test]
async fn get_seeded_mutable() {
    let testnet = Testnet::new(50);
    let client = testnet.client();

    let item = MutableItem::new(&signer(), b"Hello World!", 42, Some(b"salt"));
    testnet.seed(item.clone().into());

    let response = client
        .get(&QueryContext::new(), *item.target(), None, Some(b"salt"))
        .await
        .unwrap();

    assert_eq!(response.item, Item::Mutable(item));
}

#[tokio::test]
async fn highest_seq_wins() {
    let testnet = Testnet::new(50);
    let client = testnet.client();
    let signer = signer();

    let older = MutableItem::new(&signer, b"older", 3, None);
    let newer = MutableItem::new(&signer, b"newer", 7, None);

    let nodes = testnet.seed(older.into());
    for node in nodes.iter().skip(15) {
        node.store(newer.clone().into());
    }

    let item = client
        .get_mutable(&QueryContext::new(), signer.verifying_key().as_bytes(), None, None)
        .await
        .unwrap();

    assert_eq!(item, newer);
}

#[tokio::test]
async fn not_found() {
    let testnet = Testnet::new(50);
    let client = testnet.client();

    let target = MutableItem::target_from_key(signer().verifying_key().as_bytes(), None);

    let result = client.get(&QueryContext::new(), target, None, None).await;

    assert!(matches!(result, Err(Error::NotFound)));
}

#[tokio::test]
async fn no_more_recent_value() {
    let testnet = Testnet::new(50);
    let client = testnet.client();
    let signer = signer();

    testnet.seed(MutableItem::new(&signer, b"Hello World!", 10, None).into());

    let result = client
        .get_mutable(
            &QueryContext::new(),
            signer.verifying_key().as_bytes(),
            None,
            Some(10),
        )
        .await;

    assert_eq!(result, Err(Error::NotFound));
}

#[tokio::test]
async fn canceled_before_any_reply() {
    let testnet = Testnet::new(50);
    let client = testnet.client();

    let item = Item::Immutable(Bytes::from_static(b"Hello World!"));
    testnet.seed(item.clone());

    let ctx = QueryContext::new();
    ctx.cancel();

    let result = client.get(&ctx, item.target(), None, None).await;

    assert!(matches!(result, Err(Error::Canceled)));
}

#[tokio::test(start_paused = true)]
async fn deadline_exceeded() {
    let testnet = Testnet::new(20);
    let client = testnet.client();

    for node in testnet.nodes() {
        node.set_behavior(NodeBehavior::Unresponsive);
    }

    let ctx = QueryContext::new().with_timeout(Duration::from_secs(1));

    let result = client
        .get(&ctx, Item::Immutable(Bytes::new()).target(), None, None)
        .await;

    assert!(matches!(result, Err(Error::DeadlineExceeded)));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_nodes_time_out() {
    let testnet = Testnet::new(50);
    let client = testnet.client();

    let item = MutableItem::new(&signer(), b"Hello World!", 1, None);
    let target = *item.target();

    let seeded = testnet.seed(item.clone().into());
    for node in seeded.iter().take(5) {
        node.set_behavior(NodeBehavior::Unresponsive);
    }

    let ctx = QueryContext::new();

    let response = client.get(&ctx, target, None, None).await.unwrap();
    assert_eq!(response.item, Item::Mutable(item));

    // Silent nodes issued no token, so they are left out of the write.
    let put = client
        .put(&ctx, target, None, |seq| {
            MutableItem::new(&signer(), b"Hello again!", seq + 1, None).into()
        })
        .await
        .unwrap();

    assert!(!put.writes().is_empty());
    assert!(put.writes().iter().all(|(node, outcome)| {
        testnet.node(&node.address).map(|n| n.behavior()) == Some(NodeBehavior::Honest)
            && *outcome == WriteOutcome::Stored
    }));
}

#[tokio::test]
async fn corrupt_nodes_ignored() {
    let testnet = Testnet::new(50);
    let client = testnet.client();
    let signer = signer();

    let item = MutableItem::new(&signer, b"Hello World!", 1, None);

    let seeded = testnet.seed(item.clone().into());
    for node in seeded.iter().take(10) {
        node.set_behavior(NodeBehavior::Corrupt);
    }

    let found = client
        .get_mutable(&QueryContext::new(), signer.verifying_key().as_bytes(), None, None)
        .await
        .unwrap();

    assert_eq!(found, item);
}

#[tokio::test]
async fn put_builder_sees_zero_without_prior_item() {
    let testnet = Testnet::new(50);
    let client = testnet.client();
    let signer = signer();

    let target = MutableItem::target_from_key(signer.verifying_key().as_bytes(), None);

    let mut seen = None;

    client
        .put(&QueryContext::new(), target, None, |seq| {
            seen = Some(seq);
            MutableItem::new(&signer, b"first", seq + 1, None).into()
        })
        .await
        .unwrap();

    assert_eq!(seen, Some(0));
}

#[tokio::test]
async fn put_builder_sees_max_seq() {
    let testnet = Testnet::new(50);
    let client = testnet.client();
    let signer = signer();

    let seeded = testnet.seed(MutableItem::new(&signer, b"old", 5, None).into());
    seeded[0].store(MutableItem::new(&signer, b"older", 2, None).into());

    let ctx = QueryContext::new();
    let put = client
        .put_mutable(&ctx, &signer, b"new", None)
        .await
        .unwrap();

    assert_eq!(put.stored_at().len(), MAX_BUCKET_SIZE_K);

    let item = client
        .get_mutable(&ctx, signer.verifying_key().as_bytes(), None, None)
        .await
        .unwrap();

    assert_eq!(item.seq(), 6);
    assert_eq!(item.value(), b"new");
}

#[tokio::test]
async fn put_succeeds_when_every_write_fails() {
    let testnet = Testnet::new(50);
    let client = testnet.client();

    for node in testnet.nodes() {
        node.set_behavior(NodeBehavior::RejectWrites);
    }

    let put = client
        .put_immutable(&QueryContext::new(), b"Hello World!")
        .await
        .unwrap();

    assert!(put.stored_at().is_empty());
    assert_eq!(put.failures().len(), MAX_BUCKET_SIZE_K);
    assert!(put
        .failures()
        .iter()
        .all(|(_, error)| matches!(error, TransportError::ErrorResponse(e) if e.code == 201)));
}

#[tokio::test]
async fn put_canceled_during_discovery() {
    let testnet = Testnet::new(50);
    let client = testnet.client();

    let ctx = QueryContext::new();
    ctx.cancel();

    let mut built = false;

    let result = client
        .put(&ctx, Item::Immutable(Bytes::new()).target(), None, |_| {
            built = true;
            Item::Immutable(Bytes::new())
        })
        .await;

    assert!(matches!(result, Err(Error::Canceled)));
    assert!(!built);
}

#[tokio::test(start_paused = true)]
async fn hanging_writes_time_out() {
    let testnet = Testnet::new(50);
    let write_timeout = Duration::from_secs(3);
    let client = testnet.client_with_config(Config {
        write_timeout,
        ..Default::default()
    });

    let value = b"Hello World!";
    let target = Item::Immutable(Bytes::from_static(value)).target();

    let hanging = testnet.closest(&target, 5);
    for node in &hanging {
        node.set_behavior(NodeBehavior::HangWrites);
    }

    let start = tokio::time::Instant::now();
    let put = client
        .put_immutable(&QueryContext::new(), value)
        .await
        .unwrap();

    assert!(start.elapsed() >= write_timeout);
    assert_eq!(put.stored_at().len(), MAX_BUCKET_SIZE_K - 5);

    let failures = put.failures();
    assert_eq!(failures.len(), 5);
    for (node, error) in failures {
        assert!(hanging.iter().any(|n| n.address() == node.address));
        assert_eq!(*error, TransportError::Timeout);
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_writes() {
    let testnet = Testnet::new(50);
    let client = testnet.client();

    let value = b"Hello World!";
    let target = Item::Immutable(Bytes::from_static(value)).target();

    let hanging = testnet.closest(&target, 5);
    for node in &hanging {
        node.set_behavior(NodeBehavior::HangWrites);
    }

    // Shorter than the default write timeout, discovery itself takes no time.
    let ctx = QueryContext::new().with_timeout(Duration::from_secs(1));

    let put = client.put_immutable(&ctx, value).await.unwrap();

    assert_eq!(ctx.err(), Some(Error::DeadlineExceeded));
    assert_eq!(put.stored_at().len(), MAX_BUCKET_SIZE_K - 5);
    assert!(put.failures().is_empty());

    let interrupted = put
        .writes()
        .iter()
        .filter(|(_, outcome)| *outcome == WriteOutcome::Interrupted)
        .map(|(node, _)| node.address)
        .collect::<Vec<_>>();

    assert_eq!(interrupted.len(), 5);
    assert!(interrupted
        .iter()
        .all(|address| hanging.iter().any(|n| n.address() == *address)));
}
