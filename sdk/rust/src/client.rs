use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Frames a set of JSON documents as one window + compressed-batch pair:
/// `2W` with the document count, then `2C` carrying a zlib stream of `2J`
/// sub-frames numbered from `first_seq`.
pub fn encode_batch(docs: &[Value], first_seq: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        let body = serde_json::to_vec(doc).expect("JSON documents are serializable");
        payload.extend_from_slice(b"2J");
        payload.extend_from_slice(&(first_seq + i as u32).to_be_bytes());
        payload.extend_from_slice(&(body.len() as u32).to_be_bytes());
        payload.extend_from_slice(&body);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&payload)
        .expect("writing to an in-memory encoder cannot fail");
    let compressed = encoder
        .finish()
        .expect("finishing an in-memory encoder cannot fail");

    let mut frame = Vec::with_capacity(compressed.len() + 12);
    frame.extend_from_slice(b"2W");
    frame.extend_from_slice(&(docs.len() as u32).to_be_bytes());
    frame.extend_from_slice(b"2C");
    frame.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    frame.extend_from_slice(&compressed);
    frame
}

/// A minimal beats shipper: one TCP connection, synchronous batch/ack cycle.
pub struct ShipperClient {
    stream: TcpStream,
}

impl ShipperClient {
    pub async fn connect(addr: &str) -> std::io::Result<Self> {
        Ok(Self {
            stream: TcpStream::connect(addr).await?,
        })
    }

    /// Ship one batch of JSON documents, sequenced from 1, and wait for the
    /// acknowledgment. Returns the acknowledged sequence number.
    pub async fn send_batch(&mut self, docs: &[Value]) -> std::io::Result<u32> {
        self.send_batch_from(docs, 1).await
    }

    /// Ship one batch with an explicit starting sequence number.
    pub async fn send_batch_from(&mut self, docs: &[Value], first_seq: u32) -> std::io::Result<u32> {
        self.stream.write_all(&encode_batch(docs, first_seq)).await?;
        self.read_ack().await
    }

    /// Send raw bytes, for driving a server with hand-built frames.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await
    }

    /// Read one `2A` acknowledgment frame.
    pub async fn read_ack(&mut self) -> std::io::Result<u32> {
        let mut ack = [0u8; 6];
        self.stream.read_exact(&mut ack).await?;
        if &ack[..2] != b"2A" {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "expected a 2A acknowledgment",
            ));
        }
        Ok(u32::from_be_bytes([ack[2], ack[3], ack[4], ack[5]]))
    }

    /// Read until the server closes the connection; returns the bytes seen.
    /// Useful for asserting that no acknowledgment precedes a teardown.
    pub async fn read_until_close(&mut self) -> std::io::Result<Vec<u8>> {
        let mut leftover = Vec::new();
        self.stream.read_to_end(&mut leftover).await?;
        Ok(leftover)
    }
}
