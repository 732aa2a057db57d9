//! Client side of the lumberjack v2 shipper protocol.
//!
//! Used to drive a beats-server instance from tests and tooling: frames JSON
//! documents into window + compressed-batch frames, ships them over TCP, and
//! reads back acknowledgments.

mod client;

pub use client::{encode_batch, ShipperClient};
