//! Batch acknowledgments.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::frame;

/// Writes a `2A` acknowledgment carrying the batch's final sequence number.
///
/// Issued only after every sub-frame of the batch has been decoded and
/// accepted into the forward queue. If the process dies before this write
/// reaches the shipper, the shipper redelivers the whole batch on reconnect:
/// delivery is at-least-once, never at-most-once.
pub async fn write_ack<W>(writer: &mut W, seq: u32) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 6];
    buf[..2].copy_from_slice(&frame::CODE_ACK);
    buf[2..].copy_from_slice(&seq.to_be_bytes());
    writer.write_all(&buf).await?;
    writer.flush().await
}
