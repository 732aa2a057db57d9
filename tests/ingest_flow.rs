//! End-to-end ingest tests: shipper → decoder → forward loop → sink → ack.

use std::sync::Arc;

use serde_json::json;
use shipper_sdk::ShipperClient;

mod common;

use common::{start_server, test_config, CollectingSink, FailingSink};

#[tokio::test]
async fn batch_is_decoded_in_order_and_acked() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    let ack = client
        .send_batch(&[json!({"a": 1}), json!({"b": 2})])
        .await
        .unwrap();
    assert_eq!(ack, 2);

    let events = common::wait_for_events(&sink, 2).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].fields.get("a"), Some(&json!(1)));
    assert_eq!(events[1].fields.get("b"), Some(&json!(2)));

    shutdown.trigger();
}

#[tokio::test]
async fn json_documents_round_trip_unchanged() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let docs = vec![
        json!({"message": "first", "level": "info"}),
        json!({"message": "second", "offset": 42}),
        json!({"nested": {"deep": [1, 2, 3]}}),
        json!({"empty": {}}),
        json!({"unicode": "héllo wörld"}),
    ];
    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    let ack = client.send_batch(&docs).await.unwrap();
    assert_eq!(ack, docs.len() as u32);

    let events = common::wait_for_events(&sink, docs.len()).await;
    for (event, doc) in events.iter().zip(&docs) {
        assert_eq!(serde_json::Value::Object(event.fields.clone()), *doc);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn sequential_batches_each_get_their_own_ack() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    let first = client
        .send_batch_from(&[json!({"n": 1}), json!({"n": 2})], 1)
        .await
        .unwrap();
    assert_eq!(first, 2);

    let second = client
        .send_batch_from(&[json!({"n": 3}), json!({"n": 4})], 3)
        .await
        .unwrap();
    assert_eq!(second, 4);

    let events = common::wait_for_events(&sink, 4).await;
    let ns: Vec<_> = events.iter().map(|e| e.fields["n"].clone()).collect();
    assert_eq!(ns, vec![json!(1), json!(2), json!(3), json!(4)]);

    shutdown.trigger();
}

#[tokio::test]
async fn configured_common_fields_are_attached_on_forward() {
    let mut config = test_config();
    config.common.add_field =
        [("datacenter".to_string(), json!("eu-1"))].into_iter().collect();
    config.common.tags = vec!["beats".to_string()];
    config.common.event_type = Some("log".to_string());

    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(config, sink.clone()).await;

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    client
        .send_batch(&[json!({"message": "hi", "tags": ["shipper"]})])
        .await
        .unwrap();

    let events = common::wait_for_events(&sink, 1).await;
    assert_eq!(events[0].fields.get("datacenter"), Some(&json!("eu-1")));
    assert_eq!(events[0].fields.get("tags"), Some(&json!(["shipper", "beats"])));
    assert_eq!(events[0].fields.get("type"), Some(&json!("log")));
    assert_eq!(events[0].message.as_deref(), Some("hi"));

    shutdown.trigger();
}

#[tokio::test]
async fn raw_subframes_keep_the_batch_aligned() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let mut payload = common::data_subframe(1, &[(b"line", b"plain text"), (b"offset", b"10")]);
    payload.extend(common::json_subframe(2, &json!({"line": "json text"})));

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    client
        .send_raw(&common::batch_frames(2, &payload))
        .await
        .unwrap();
    assert_eq!(client.read_ack().await.unwrap(), 2);

    let events = common::wait_for_events(&sink, 2).await;
    assert!(events[0].fields.is_empty(), "raw sub-frames carry no fields");
    assert_eq!(events[1].fields.get("line"), Some(&json!("json text")));

    shutdown.trigger();
}

#[tokio::test]
async fn zero_window_batch_is_acked_at_the_boundary() {
    let sink = Arc::new(CollectingSink::default());
    let (addr, shutdown, _server) = start_server(test_config(), sink.clone()).await;

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    let ack = client.send_batch(&[]).await.unwrap();
    assert_eq!(ack, 0);
    assert!(sink.events().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn sink_failures_do_not_break_acknowledgment() {
    let (addr, shutdown, _server) = start_server(test_config(), Arc::new(FailingSink)).await;

    let mut client = ShipperClient::connect(&addr.to_string()).await.unwrap();
    let ack = client
        .send_batch(&[json!({"a": 1}), json!({"b": 2})])
        .await
        .unwrap();
    assert_eq!(ack, 2, "acks depend on decode-and-enqueue, not on the sink");

    // The connection stays usable afterwards.
    let ack = client.send_batch_from(&[json!({"c": 3})], 3).await.unwrap();
    assert_eq!(ack, 3);

    shutdown.trigger();
}
