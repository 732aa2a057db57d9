//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits, shutdown select)
//!     → tls.rs (optional TLS handshake)
//!     → connection.rs (decode task + forward loop, drain tracking)
//!     → protocol decoder / event sink
//! ```
//!
//! # Design Decisions
//! - Semaphore-bounded accepts prevent resource exhaustion
//! - Each connection is tracked so shutdown can wait for the drain
//! - TLS is optional and handled transparently per connection

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::ConnectionContext;
pub use listener::Listener;
