//! Shared utilities for integration testing.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tokio::task::JoinHandle;

use beats_server::event::sink::{EventSink, SinkError};
use beats_server::{ConnectionContext, Event, Listener, ServerConfig, Shutdown};

/// Config bound to an ephemeral port so tests never collide.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Bind a server with the given sink and run it in the background.
pub async fn start_server(
    config: ServerConfig,
    sink: Arc<dyn EventSink>,
) -> (SocketAddr, Arc<Shutdown>, JoinHandle<()>) {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let ctx = ConnectionContext {
        limits: config.limits.frame_limits(),
        idle_timeout: config.listener.idle_timeout(),
        common: config.common.clone(),
        sink,
    };
    let handle = tokio::spawn(listener.run(ctx, Arc::clone(&shutdown)));
    (addr, shutdown, handle)
}

/// Sink that records every delivered event.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn deliver(&self, event: Event) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Sink that rejects every delivery.
#[derive(Default)]
#[allow(dead_code)]
pub struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn deliver(&self, _event: Event) -> Result<(), SinkError> {
        Err("downstream unavailable".into())
    }
}

/// Poll the sink until `count` events arrived or two seconds elapse.
#[allow(dead_code)]
pub async fn wait_for_events(sink: &CollectingSink, count: usize) -> Vec<Event> {
    for _ in 0..200 {
        let events = sink.events();
        if events.len() >= count {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {} events, got {} within the deadline",
        count,
        sink.events().len()
    );
}

// Raw frame builders, for driving the server with hand-built (and broken)
// wire traffic that the SDK's happy path will not produce.

#[allow(dead_code)]
pub fn zlib_compress(payload: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

/// `2W` + window, then `2C` + length + zlib(payload).
#[allow(dead_code)]
pub fn batch_frames(window: u32, payload: &[u8]) -> Vec<u8> {
    let compressed = zlib_compress(payload);
    let mut out = Vec::new();
    out.extend_from_slice(b"2W");
    out.extend_from_slice(&window.to_be_bytes());
    out.extend_from_slice(b"2C");
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    out.extend_from_slice(&compressed);
    out
}

#[allow(dead_code)]
pub fn json_subframe(seq: u32, doc: &serde_json::Value) -> Vec<u8> {
    let body = serde_json::to_vec(doc).unwrap();
    let mut out = Vec::new();
    out.extend_from_slice(b"2J");
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

#[allow(dead_code)]
pub fn data_subframe(seq: u32, pairs: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"2D");
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    for (key, value) in pairs {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        out.extend_from_slice(value);
    }
    out
}
