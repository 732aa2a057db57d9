//! Frame tags and length bounds for the lumberjack v2 wire format.

/// Declares how many sub-frames the next compressed batch carries.
pub const CODE_WINDOW: [u8; 2] = *b"2W";

/// Introduces a zlib-compressed batch of sub-frames.
pub const CODE_COMPRESSED: [u8; 2] = *b"2C";

/// Raw key/value sub-frame, only valid inside a decompressed batch.
pub const CODE_DATA: [u8; 2] = *b"2D";

/// JSON sub-frame, only valid inside a decompressed batch.
pub const CODE_JSON: [u8; 2] = *b"2J";

/// Server-to-client acknowledgment of a fully processed batch.
pub const CODE_ACK: [u8; 2] = *b"2A";

/// Default upper bound for a key length inside a `2D` sub-frame.
pub const DEFAULT_MAX_KEY_BYTES: u32 = 100 * 1024 * 1024;

/// Default upper bound for a value or JSON document length.
pub const DEFAULT_MAX_VALUE_BYTES: u32 = 250 * 1024 * 1024;

/// Length bounds enforced while decoding sub-frames.
///
/// A declared length above either bound is a protocol violation and closes
/// the connection before any payload bytes are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_key_bytes: u32,
    pub max_value_bytes: u32,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_key_bytes: DEFAULT_MAX_KEY_BYTES,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}
