//! Beats/Lumberjack v2 ingestion server.
//!
//! Accepts batched log records from beats-style shippers over TCP
//! (optionally TLS), decodes the two-level framing, and acknowledges each
//! fully-processed batch.
//!
//! # Architecture Overview
//!
//! ```text
//!   Shipper ──TCP/TLS──▶ ┌──────────────────────────────────────────────┐
//!                        │  net/listener   accept loop, conn limits     │
//!                        │       │                                      │
//!                        │       ▼            per connection            │
//!                        │  protocol/decoder ──▶ bounded queue ──▶      │
//!                        │  (2W/2C frames,       (capacity 3)    forward│
//!                        │   zlib batches,                       loop   │
//!                        │   2D/2J sub-frames)                     │    │
//!   Shipper ◀──"2A" ack──┤       │                                ▼    │
//!                        │  protocol/ack                     event/sink │
//!                        │                                              │
//!                        │  cross-cutting: config · lifecycle ·         │
//!                        │                 observability                │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use beats_server::config::loader::load_config;
use beats_server::{observability, ConnectionContext, Listener, ServerConfig, Shutdown, StdoutSink};

#[derive(Parser)]
#[command(name = "beats-server")]
#[command(about = "Lumberjack/Beats protocol ingestion server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    observability::logging::init_logging(&config.observability.log_filter);

    tracing::info!("beats-server v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        tls = config.listener.tls.is_some(),
        idle_timeout_secs = config.listener.idle_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            beats_server::lifecycle::signals::wait_for_signal().await;
            shutdown.trigger();
        });
    }

    let ctx = ConnectionContext {
        limits: config.limits.frame_limits(),
        idle_timeout: config.listener.idle_timeout(),
        common: config.common.clone(),
        sink: Arc::new(StdoutSink::new()),
    };
    listener.run(ctx, shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
