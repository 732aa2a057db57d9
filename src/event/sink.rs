//! The downstream boundary: where decoded events leave this input.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::event::Event;

/// Error surfaced by a sink. Delivery failures are logged by the forward
/// loop and never tear down the connection: acknowledgment correctness
/// depends on decode-and-enqueue, not on downstream persistence.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receives each decoded event after enrichment. Implemented by whatever
/// pipeline stage sits downstream of this input.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: Event) -> Result<(), SinkError>;
}

/// Writes each event to stdout as one JSON document per line.
pub struct StdoutSink {
    out: Mutex<tokio::io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for StdoutSink {
    async fn deliver(&self, event: Event) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&event.fields)?;
        line.push(b'\n');
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }
}
