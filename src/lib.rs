//! Beats/Lumberjack v2 ingestion server library.

pub mod config;
pub mod event;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;

pub use config::ServerConfig;
pub use event::sink::{EventSink, SinkError, StdoutSink};
pub use event::Event;
pub use lifecycle::Shutdown;
pub use net::{ConnectionContext, Listener};
