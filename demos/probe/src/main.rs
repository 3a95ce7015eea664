//! webtransport-session probe
//!
//! Runs one session per path against the loopback peer and prints what the
//! listeners saw.
//!
//! Environment variables:
//! - WT_PROBE_HOST: endpoint host (default example.com)
//! - WT_PROBE_PORT: endpoint port (default 4433)
//! - WT_PROBE_PATHS: comma-separated paths
//!   (default /success,/reject,/closeafter0ms,/closeafter100ms)
//! - WT_PROBE_HANDSHAKE_TIMEOUT_MS: handshake bound (default 10000)
//! - WT_PROBE_LOG_LEVEL: tracing filter, e.g. debug|info|warn (default info)

use std::env;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use webtransport_session::prelude::*;

#[derive(Debug, Error)]
enum ProbeError {
    #[error("invalid {name}: {value}")]
    BadEnv { name: &'static str, value: String },

    #[error(transparent)]
    Session(#[from] WebTransportError),

    #[error("listener channel closed")]
    ChannelClosed,
}

type ProbeResult<T> = std::result::Result<T, ProbeError>;

struct ProbeConfig {
    host: String,
    port: u16,
    paths: Vec<String>,
    handshake_timeout: Duration,
}

impl ProbeConfig {
    fn from_env() -> ProbeResult<Self> {
        let host = env::var("WT_PROBE_HOST").unwrap_or_else(|_| "example.com".into());
        let port = parse_env("WT_PROBE_PORT", 4433u16)?;
        let timeout_ms = parse_env("WT_PROBE_HANDSHAKE_TIMEOUT_MS", 10_000u64)?;
        let paths = env::var("WT_PROBE_PATHS")
            .unwrap_or_else(|_| "/success,/reject,/closeafter0ms,/closeafter100ms".into())
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            host,
            port,
            paths,
            handshake_timeout: Duration::from_millis(timeout_ms),
        })
    }

    fn uri(&self, path: &str) -> String {
        format!("https://{}:{}{}", self.host, self.port, path)
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> ProbeResult<T> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ProbeError::BadEnv { name, value }),
        Err(_) => Ok(default),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("WT_PROBE_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn probe(manager: &TransportManager, uri: &str) -> ProbeResult<()> {
    let session = manager.new_transport_session();
    let (events_tx, mut events) = mpsc::unbounded_channel::<SessionEvent>();
    session.async_connect(uri, Principal::System, SecurityFlags::NONE, events_tx)?;

    match events.recv().await.ok_or(ProbeError::ChannelClosed)? {
        SessionEvent::Ready(id) => info!(%uri, session_id = %id, "ready"),
        SessionEvent::Closed { error_code, reason } => {
            info!(%uri, error_code, %reason, "closed during handshake");
            return Ok(());
        }
    }

    let (streams_tx, mut streams) = mpsc::unbounded_channel::<StreamEvent>();
    session.create_outgoing_unidirectional_stream(streams_tx);
    match streams.recv().await.ok_or(ProbeError::ChannelClosed)? {
        StreamEvent::Unidirectional(stream) => {
            stream.write(b"123456", 6)?;
            tokio::time::sleep(Duration::from_millis(100)).await;

            let (stats_tx, mut stats) = mpsc::unbounded_channel::<StatsEvent>();
            stream.get_send_stream_stats(stats_tx);
            match stats.recv().await.ok_or(ProbeError::ChannelClosed)? {
                Ok(s) => info!(%uri, written = s.bytes_written, sent = s.bytes_sent, "stream stats"),
                Err(e) => info!(%uri, error = %e, "stream stats unavailable"),
            }
        }
        StreamEvent::Error(e) => info!(%uri, error = %e, code = e.code(), "stream refused"),
        StreamEvent::Bidirectional(_) => {}
    }

    session.close_session(NO_ERROR, "probe done");
    if let Some(SessionEvent::Closed { error_code, reason }) = events.recv().await {
        info!(%uri, error_code, %reason, "closed");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        error!(error = %e, "probe failed");
        std::process::exit(1);
    }
}

async fn run() -> ProbeResult<()> {
    let config = ProbeConfig::from_env()?;
    let session_config = SessionConfigBuilder::new()
        .handshake_timeout(config.handshake_timeout)
        .build();
    let manager = TransportManager::new(session_config, LoopbackConnector::new())?;

    for path in &config.paths {
        probe(&manager, &config.uri(path)).await?;
    }
    Ok(())
}
