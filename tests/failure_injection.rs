//! Malformed-input tests: every protocol violation must close only the
//! offending connection, and a failed batch must never be acknowledged.

use std::sync::Arc;

use serde_json::json;
use shipper_sdk::ShipperClient;

mod common;

use common::{start_server, test_config, CollectingSink};

#[tokio::test]
async fn unknown_outer_tag_closes_only_that_connection() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    // A healthy connection is open while the bad one dies.
    let mut healthy = ShipperClient::connect(&addr.to_string()).await.unwrap();

    let mut bad = ShipperClient::connect(&addr.to_string()).await.unwrap();
    bad.send_raw(b"XX").await.unwrap();
    let leftover = bad.read_until_close().await.unwrap_or_default();
    assert!(leftover.is_empty(), "no ack may precede the teardown");

    // The sibling connection keeps processing normally.
    let ack = healthy.send_batch(&[json!({"ok": true})]).await.unwrap();
    assert_eq!(ack, 1);
    let events = common::wait_for_events(&sink, 1).await;
    assert_eq!(events[0].fields.get("ok"), Some(&json!(true)));

    shutdown.trigger();
}

#[tokio::test]
async fn unknown_subframe_tag_aborts_without_ack() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let mut payload = common::json_subframe(1, &json!({"a": 1}));
    payload.extend_from_slice(b"2Z");

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    client
        .send_raw(&common::batch_frames(2, &payload))
        .await
        .unwrap();
    let leftover = client.read_until_close().await.unwrap_or_default();
    assert!(leftover.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn oversized_declared_length_is_rejected() {
    let mut config = test_config();
    config.limits.max_value_bytes = 64;

    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(config, sink.clone()).await;

    let doc = json!({"filler": "x".repeat(200)});
    let payload = common::json_subframe(1, &doc);

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    client
        .send_raw(&common::batch_frames(1, &payload))
        .await
        .unwrap();
    let leftover = client.read_until_close().await.unwrap_or_default();
    assert!(leftover.is_empty(), "oversized batches are never acked");
    assert!(sink.events().is_empty(), "no partial record is forwarded");

    shutdown.trigger();
}

#[tokio::test]
async fn truncated_batch_is_an_error_not_a_silent_stop() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    // Window promises two sub-frames; the payload holds one.
    let payload = common::json_subframe(1, &json!({"a": 1}));

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    client
        .send_raw(&common::batch_frames(2, &payload))
        .await
        .unwrap();
    let leftover = client.read_until_close().await.unwrap_or_default();
    assert!(leftover.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn invalid_zlib_payload_closes_the_connection() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let mut wire = Vec::new();
    wire.extend_from_slice(b"2W");
    wire.extend_from_slice(&1u32.to_be_bytes());
    wire.extend_from_slice(b"2C");
    wire.extend_from_slice(&4u32.to_be_bytes());
    wire.extend_from_slice(b"\xde\xad\xbe\xef");

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    client.send_raw(&wire).await.unwrap();
    let leftover = client.read_until_close().await.unwrap_or_default();
    assert!(leftover.is_empty());
    assert!(sink.events().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn malformed_json_closes_the_connection() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let body = b"{not json";
    let mut payload = Vec::new();
    payload.extend_from_slice(b"2J");
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&(body.len() as u32).to_be_bytes());
    payload.extend_from_slice(body);

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    client
        .send_raw(&common::batch_frames(1, &payload))
        .await
        .unwrap();
    let leftover = client.read_until_close().await.unwrap_or_default();
    assert!(leftover.is_empty());
    assert!(sink.events().is_empty());

    shutdown.trigger();
}
