//! Decoded events and their downstream hand-off.
//!
//! # Data Flow
//! ```text
//! Frame Decoder
//!     → Event (field map + optional message text)
//!     → forward loop: apply_common (configured fields / tags / type)
//!     → sink.rs (EventSink::deliver, the pipeline boundary)
//! ```
//!
//! # Design Decisions
//! - Events are transient: created by the decoder, enriched, delivered, dropped
//! - Enrichment never overwrites fields the shipper already set

pub mod sink;

use serde_json::{Map, Value};

use crate::config::schema::CommonFields;

/// A single decoded record: the field mapping carried by a sub-frame plus
/// the free-text message when the shipper provided one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub fields: Map<String, Value>,
    pub message: Option<String>,
}

impl Event {
    /// Event with no fields, as produced by a raw `2D` sub-frame.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds an event from a decoded field mapping, lifting the `message`
    /// field into the free-text slot when it is a string.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self { fields, message }
    }

    /// Applies the statically configured enrichment attached on hand-off:
    /// extra fields, tags, and the event type. Shipper-set fields win; tags
    /// are appended to any the shipper already sent.
    pub fn apply_common(&mut self, common: &CommonFields) {
        for (key, value) in &common.add_field {
            self.fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if !common.tags.is_empty() {
            let tags = self
                .fields
                .entry("tags".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = tags {
                list.extend(common.tags.iter().cloned().map(Value::String));
            }
        }
        if let Some(kind) = &common.event_type {
            self.fields
                .entry("type".to_string())
                .or_insert_with(|| Value::String(kind.clone()));
        }
    }
}
