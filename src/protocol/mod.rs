//! Lumberjack v2 wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Connection byte stream
//!     → decoder.rs (outer loop: "2W" window / "2C" compressed batch)
//!         → zlib decompression into an in-memory batch buffer
//!         → inner loop: "2D" raw / "2J" JSON sub-frames → Event
//!     → bounded forward queue (owned by the connection handler)
//!     → ack.rs ("2A" + last sequence, written after the whole batch
//!       is decoded and queued)
//! ```
//!
//! # Design Decisions
//! - All multi-byte integers are big-endian on the wire
//! - Declared lengths are validated before any allocation follows them
//! - A protocol violation aborts only the offending connection

pub mod ack;
pub mod decoder;
pub mod frame;

pub use decoder::{DecodeEnd, DecodeError, FrameDecoder};
pub use frame::FrameLimits;
