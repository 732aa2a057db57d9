//! Connection lifecycle and the per-connection task pair.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track live connections so shutdown can wait for the drain
//! - Run the decode task / forward loop pair over a bounded queue
//!
//! # Data Flow
//! ```text
//! accepted stream
//!     → decode task (FrameDecoder::run, raced against shutdown)
//!         → bounded mpsc queue (capacity 3: backpressure, not buffering)
//!     → forward loop (enrich, then EventSink::deliver)
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::CommonFields;
use crate::event::sink::EventSink;
use crate::event::Event;
use crate::lifecycle::Shutdown;
use crate::protocol::{DecodeEnd, FrameDecoder, FrameLimits};

/// Queue depth between the decode task and the forward loop. Small on
/// purpose: a slow sink must stall the wire, not grow a buffer.
const EVENT_QUEUE_DEPTH: usize = 3;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks live connections so the listener can wait for them to finish
/// after the shutdown broadcast.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a new live connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has finished. No upper bound:
    /// the listener drains for as long as handlers take to exit.
    pub async fn wait_for_drain(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection = %self.id, "Connection closed");
    }
}

/// Shared state handed to every accepted connection.
#[derive(Clone)]
pub struct ConnectionContext {
    pub limits: FrameLimits,
    pub idle_timeout: Option<Duration>,
    pub common: CommonFields,
    pub sink: Arc<dyn EventSink>,
}

/// Supervises one accepted connection until it ends.
///
/// Spawns the decode task, then runs the forward loop in place: events are
/// popped in decode order, enriched with the configured common fields, and
/// delivered to the sink. The loop exits once the queue is closed and
/// drained, so events decoded before a teardown are never dropped.
pub async fn handle<S>(
    stream: S,
    peer: SocketAddr,
    ctx: ConnectionContext,
    shutdown: Arc<Shutdown>,
    guard: ConnectionGuard,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = guard.id();
    debug!(connection = %id, peer = %peer, "Connection accepted");
    metrics::counter!("beats_connections_total").increment(1);
    metrics::gauge!("beats_active_connections").increment(1.0);

    let (tx, mut rx) = mpsc::channel::<Event>(EVENT_QUEUE_DEPTH);
    let decoder = FrameDecoder::new(stream, ctx.limits, ctx.idle_timeout, tx);
    let decode = tokio::spawn(decode_task(decoder, id, peer, shutdown));

    while let Some(mut event) = rx.recv().await {
        event.apply_common(&ctx.common);
        match ctx.sink.deliver(event).await {
            Ok(()) => metrics::counter!("beats_events_total").increment(1),
            // A sink failure is downstream's problem; the batch was already
            // decoded and queued, so the connection stays up.
            Err(e) => warn!(connection = %id, error = %e, "Sink delivery failed"),
        }
    }

    let _ = decode.await;
    metrics::gauge!("beats_active_connections").decrement(1.0);
    debug!(connection = %id, peer = %peer, "Connection finished");
    drop(guard);
}

/// Drives the frame decoder, racing it against the shutdown broadcast.
///
/// Cancelling the in-flight read on shutdown is the async equivalent of the
/// immediate read deadline: the blocked read returns promptly, the queue
/// sender drops, and the forward loop drains whatever was already decoded.
async fn decode_task<S>(
    decoder: FrameDecoder<S>,
    id: ConnectionId,
    peer: SocketAddr,
    shutdown: Arc<Shutdown>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // Subscribe, then re-check the flag: a broadcast sent before this
    // subscription would otherwise be missed forever.
    let mut shutdown_rx = shutdown.subscribe();
    if shutdown.is_triggered() {
        debug!(connection = %id, "Shutdown already triggered, not decoding");
        return;
    }
    tokio::select! {
        res = decoder.run() => match res {
            Ok(DecodeEnd::PeerClosed) => {
                debug!(connection = %id, peer = %peer, "Peer closed connection")
            }
            Ok(DecodeEnd::IdleTimeout) => {
                debug!(connection = %id, peer = %peer, "Connection idle, closing")
            }
            Ok(DecodeEnd::QueueClosed) => {
                debug!(connection = %id, "Forward queue closed under decoder")
            }
            Err(e) => {
                metrics::counter!("beats_decode_errors_total").increment(1);
                warn!(connection = %id, peer = %peer, error = %e, "Protocol error, closing connection");
            }
        },
        _ = shutdown_rx.recv() => {
            debug!(connection = %id, "Shutdown: abandoning in-flight read");
        }
    }
}
