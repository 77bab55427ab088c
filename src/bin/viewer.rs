//! Headless viewer: follows one script's synchronized playback.
//!
//! Snapshots are written to stdout as newline-delimited JSON whenever the
//! highlighted cues change. All tracing output goes to stderr so that stdout
//! stays machine-readable.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cuesync::clock::{SharedClock, SystemClock};
use cuesync::cue::{CueElement, ScriptInfo};
use cuesync::session::{ScriptSession, SessionDriver, SessionEvent, SessionSnapshot};
use cuesync::transport::{ScriptConnection, StaticTokenSource};
use cuesync::SyncConfig;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Follow a live cue script.
#[derive(Parser)]
#[command(name = "cuesync-viewer", version, about)]
struct Cli {
    /// Script to open.
    script_id: String,

    /// Share-link token. Used instead of the user token when both are given.
    #[arg(long, env = "CUESYNC_SHARE_TOKEN")]
    share_token: Option<String>,

    /// Signed-in user token.
    #[arg(long, env = "CUESYNC_USER_TOKEN")]
    user_token: Option<String>,

    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON array of the script's cue elements.
    #[arg(long)]
    elements: Option<PathBuf>,

    /// Declared show start time (RFC 3339).
    #[arg(long)]
    start_time: Option<String>,

    /// Server base URL, overriding the configuration.
    #[arg(long)]
    server: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let path = SyncConfig::default_config_path();
            if path.exists() {
                SyncConfig::from_file(&path)?
            } else {
                SyncConfig::default()
            }
        }
    };
    if let Some(server) = &cli.server {
        config.transport.server_url.clone_from(server);
    }
    config.validate()?;
    Ok(config)
}

fn load_elements(path: Option<&PathBuf>) -> anyhow::Result<Vec<CueElement>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing elements in {}", path.display()))
}

/// Log display events and print snapshots whose cue highlighting changed.
async fn follow(mut rx: broadcast::Receiver<SessionEvent>) {
    let mut last: Option<SessionSnapshot> = None;
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "display fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            SessionEvent::Connection(status) => tracing::info!(%status, "connection"),
            SessionEvent::ServerError(message) => tracing::warn!(%message, "server error"),
            SessionEvent::Snapshot(snapshot) => {
                let unchanged = last.as_ref().is_some_and(|prev| {
                    prev.playback_state == snapshot.playback_state
                        && prev.current == snapshot.current
                        && prev.upcoming == snapshot.upcoming
                        && prev.visible == snapshot.visible
                });
                if unchanged {
                    continue;
                }
                tracing::info!(
                    state = %snapshot.playback_state,
                    show_time_ms = ?snapshot.show_time_ms,
                    current = ?snapshot.current,
                    upcoming = ?snapshot.upcoming,
                    hidden = snapshot.hidden_count,
                    "cues"
                );
                if let Ok(line) = serde_json::to_string(&snapshot) {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{line}");
                    let _ = out.flush();
                }
                last = Some(snapshot);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cuesync=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let elements = load_elements(cli.elements.as_ref())?;

    let clock: SharedClock = Arc::new(SystemClock);
    let tokens = Arc::new(StaticTokenSource {
        user_token: cli.user_token.clone(),
        share_token: cli.share_token.clone(),
    });

    tracing::info!(
        script_id = %cli.script_id,
        server = %config.transport.server_url,
        "cuesync-viewer starting"
    );

    let (connection, transport_events) =
        ScriptConnection::open(&config.transport, &cli.script_id, tokens, Arc::clone(&clock));

    let mut session = ScriptSession::new(
        ScriptInfo::new(&cli.script_id, cli.start_time.clone()),
        &config,
        clock,
        Box::new(connection.sender()),
    );
    session.load_elements(elements);

    let driver = SessionDriver::new(session);
    let display = tokio::spawn(follow(driver.subscribe()));
    let cancel = driver.cancel_token();
    let running = tokio::spawn(driver.run(transport_events));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    cancel.cancel();
    running
        .await
        .map_err(|e| anyhow::anyhow!("session driver failed: {e}"))?;
    connection.close().await;
    let _ = display.await;

    tracing::info!("cuesync-viewer shut down cleanly");
    Ok(())
}
