//! Two-level frame decoder for the lumberjack v2 protocol.
//!
//! Outer frames arrive directly on the connection: `2W` declares how many
//! sub-frames the next batch carries, `2C` carries the batch itself as a
//! zlib stream. Sub-frames (`2D` raw key/value, `2J` JSON) only ever appear
//! inside a decompressed batch, and a batch must yield exactly the declared
//! window of them.

use std::io::Read;
use std::time::Duration;

use flate2::read::ZlibDecoder;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::event::Event;
use crate::protocol::ack;
use crate::protocol::frame::{self, FrameLimits};

/// Errors that abort the owning connection. None of them propagate past the
/// connection handler.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Read from the connection failed, including truncation mid-frame.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// An outer frame carried a tag other than `2W` or `2C`.
    #[error("unknown frame code {:?}", String::from_utf8_lossy(.0))]
    UnknownFrame([u8; 2]),

    /// A sub-frame inside a batch carried a tag other than `2D` or `2J`.
    #[error("unknown sub-frame code {:?} inside batch", String::from_utf8_lossy(.0))]
    UnknownSubFrame([u8; 2]),

    /// A `2D` key length exceeded the configured bound.
    #[error("key length {got} exceeds limit {limit}")]
    KeyTooLong { got: u32, limit: u32 },

    /// A `2D` value length exceeded the configured bound.
    #[error("value length {got} exceeds limit {limit}")]
    ValueTooLong { got: u32, limit: u32 },

    /// A `2J` document length exceeded the configured bound.
    #[error("JSON document length {got} exceeds limit {limit}")]
    PayloadTooLong { got: u32, limit: u32 },

    /// The decompressed batch ended before a declared length was satisfied.
    #[error("batch truncated inside a sub-frame")]
    Truncated,

    /// The `2C` payload was not a valid zlib stream.
    #[error("batch decompression failed: {0}")]
    Decompress(std::io::Error),

    /// A `2J` payload did not parse as a JSON object.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// The `2A` acknowledgment could not be written back to the shipper.
    #[error("acknowledgment write failed: {0}")]
    AckWrite(std::io::Error),
}

/// Why a decode loop ended without a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeEnd {
    /// The peer closed the connection at a frame boundary.
    PeerClosed,
    /// No frame arrived within the configured idle window.
    IdleTimeout,
    /// The forward queue shut down underneath the decoder (drain in
    /// progress); the unacked remainder will be redelivered on reconnect.
    QueueClosed,
}

enum BatchEnd {
    Acked,
    QueueClosed,
}

/// Per-connection protocol state machine.
///
/// Owns the connection stream for its whole life: reads frames off it and
/// writes acknowledgments back on it. Decoded events go out through the
/// bounded forward queue, which is also where backpressure from a slow sink
/// reaches the wire.
pub struct FrameDecoder<S> {
    stream: S,
    limits: FrameLimits,
    idle_timeout: Option<Duration>,
    window: u32,
    tx: mpsc::Sender<Event>,
}

enum OuterRead {
    Code([u8; 2]),
    Eof,
    Idle,
}

impl<S> FrameDecoder<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        limits: FrameLimits,
        idle_timeout: Option<Duration>,
        tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            stream,
            limits,
            idle_timeout,
            window: 0,
            tx,
        }
    }

    /// Drives the outer frame loop until the peer closes, the idle window
    /// expires, or the stream violates the protocol.
    pub async fn run(mut self) -> Result<DecodeEnd, DecodeError> {
        loop {
            let code = match self.read_outer_code().await? {
                OuterRead::Code(code) => code,
                OuterRead::Eof => return Ok(DecodeEnd::PeerClosed),
                OuterRead::Idle => return Ok(DecodeEnd::IdleTimeout),
            };

            match code {
                frame::CODE_WINDOW => {
                    self.window = self.stream.read_u32().await?;
                    trace!(window = self.window, "window frame");
                }
                frame::CODE_COMPRESSED => {
                    if let BatchEnd::QueueClosed = self.read_batch().await? {
                        return Ok(DecodeEnd::QueueClosed);
                    }
                }
                other => return Err(DecodeError::UnknownFrame(other)),
            }
        }
    }

    /// Reads the next 2-byte outer tag. The idle timeout, when configured,
    /// applies only here: between frames is the one place a healthy shipper
    /// legitimately goes quiet.
    async fn read_outer_code(&mut self) -> Result<OuterRead, DecodeError> {
        let mut code = [0u8; 2];
        let read = match self.idle_timeout {
            Some(window) => match timeout(window, self.stream.read_exact(&mut code)).await {
                Ok(read) => read,
                Err(_) => return Ok(OuterRead::Idle),
            },
            None => self.stream.read_exact(&mut code).await,
        };
        match read {
            Ok(_) => Ok(OuterRead::Code(code)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(OuterRead::Eof),
            Err(e) => Err(e.into()),
        }
    }

    /// Handles one `2C` frame: reads the declared extent of the compressed
    /// payload, decompresses it, decodes exactly `window` sub-frames from
    /// the buffer, and acknowledges the batch once every event is queued.
    async fn read_batch(&mut self) -> Result<BatchEnd, DecodeError> {
        let compressed_len = self.stream.read_u32().await?;
        let mut compressed = vec![0u8; compressed_len as usize];
        self.stream.read_exact(&mut compressed).await?;

        let mut payload = Vec::new();
        ZlibDecoder::new(&compressed[..])
            .read_to_end(&mut payload)
            .map_err(DecodeError::Decompress)?;

        let mut batch = &payload[..];
        let mut last_seq = 0u32;
        for _ in 0..self.window {
            let (seq, event) = read_subframe(&mut batch, &self.limits)?;
            last_seq = last_seq.max(seq);
            if self.tx.send(event).await.is_err() {
                return Ok(BatchEnd::QueueClosed);
            }
        }
        debug!(window = self.window, last_seq, "batch decoded");

        ack::write_ack(&mut self.stream, last_seq)
            .await
            .map_err(DecodeError::AckWrite)?;
        metrics::counter!("beats_batches_acked_total").increment(1);
        Ok(BatchEnd::Acked)
    }
}

/// Decodes one sub-frame from the decompressed batch buffer, returning its
/// sequence number and the event it carries.
fn read_subframe(buf: &mut &[u8], limits: &FrameLimits) -> Result<(u32, Event), DecodeError> {
    match take_code(buf)? {
        frame::CODE_DATA => {
            let seq = take_u32(buf)?;
            let pairs = take_u32(buf)?;
            for _ in 0..pairs {
                let klen = take_u32(buf)?;
                if klen > limits.max_key_bytes {
                    return Err(DecodeError::KeyTooLong {
                        got: klen,
                        limit: limits.max_key_bytes,
                    });
                }
                take_bytes(buf, klen)?;
                let vlen = take_u32(buf)?;
                if vlen > limits.max_value_bytes {
                    return Err(DecodeError::ValueTooLong {
                        got: vlen,
                        limit: limits.max_value_bytes,
                    });
                }
                take_bytes(buf, vlen)?;
            }
            // Pairs are consumed to keep the batch aligned, but not surfaced
            // as fields: shippers that speak this dialect carry their payload
            // in 2J sub-frames.
            Ok((seq, Event::empty()))
        }
        frame::CODE_JSON => {
            let seq = take_u32(buf)?;
            let len = take_u32(buf)?;
            if len > limits.max_value_bytes {
                return Err(DecodeError::PayloadTooLong {
                    got: len,
                    limit: limits.max_value_bytes,
                });
            }
            let raw = take_bytes(buf, len)?;
            let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(raw)?;
            Ok((seq, Event::from_fields(fields)))
        }
        other => Err(DecodeError::UnknownSubFrame(other)),
    }
}

fn take_bytes<'a>(buf: &mut &'a [u8], len: u32) -> Result<&'a [u8], DecodeError> {
    let len = len as usize;
    if buf.len() < len {
        return Err(DecodeError::Truncated);
    }
    let (head, rest) = buf.split_at(len);
    *buf = rest;
    Ok(head)
}

fn take_u32(buf: &mut &[u8]) -> Result<u32, DecodeError> {
    let raw = take_bytes(buf, 4)?;
    Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn take_code(buf: &mut &[u8]) -> Result<[u8; 2], DecodeError> {
    let raw = take_bytes(buf, 2)?;
    Ok([raw[0], raw[1]])
}
