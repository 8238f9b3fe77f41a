//! padlink host server: entry point.
//!
//! Accepts WebSocket connections from touch clients on `/ws`, replays their
//! input on this machine, relays screen frames between producer and mirror
//! connections, and hands out access tokens to the local UI.
//!
//! # Usage
//!
//! ```text
//! padlink-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>        Settings file [default: platform config dir]
//!   --host <ADDR>          Interface to bind
//!   --port <PORT>          Listener port
//!   --throttle-ms <MS>     Move/scroll coalescing window (1-1000)
//!   --advertise-ip <ADDR>  Address reported to clients
//! ```
//!
//! # Configuration layering
//!
//! Built-in defaults, then the settings file, then CLI flags (or their
//! environment variables).  CLI values are not written back to the file
//! unless a client later sends `update-config`.
//!
//! | Variable               | Flag             |
//! |------------------------|------------------|
//! | `PADLINK_CONFIG`       | `--config`       |
//! | `PADLINK_BIND`         | `--host`         |
//! | `PADLINK_PORT`         | `--port`         |
//! | `PADLINK_THROTTLE_MS`  | `--throttle-ms`  |
//! | `PADLINK_ADVERTISE_IP` | `--advertise-ip` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use padlink_server::application::{MemorySettingsStore, SettingsStore};
use padlink_server::domain::{ServerConfig, ServerSettings};
use padlink_server::infrastructure::{
    detect_lan_ip, run_server, ServerState, TomlSettingsStore, TracingActuator,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// padlink host server.
#[derive(Debug, Parser)]
#[command(
    name = "padlink-server",
    about = "Drives this machine's pointer and keyboard from a touch client",
    version
)]
struct Cli {
    /// Settings file; defaults to `server.toml` in the platform config dir.
    #[arg(long, env = "PADLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind, e.g. `127.0.0.1` for local-only.
    #[arg(long, env = "PADLINK_BIND")]
    host: Option<String>,

    #[arg(long, env = "PADLINK_PORT")]
    port: Option<u16>,

    /// Move/scroll coalescing window in milliseconds.
    #[arg(long, env = "PADLINK_THROTTLE_MS")]
    throttle_ms: Option<u64>,

    /// Address reported to clients instead of the detected LAN address.
    #[arg(long, env = "PADLINK_ADVERTISE_IP")]
    advertise_ip: Option<String>,
}

impl Cli {
    /// Applies CLI overrides on top of `settings` and resolves the runtime config.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address or the throttle is
    /// outside 1-1000 ms.
    fn resolve(
        self,
        mut settings: ServerSettings,
        settings_path: Option<PathBuf>,
    ) -> anyhow::Result<(ServerConfig, ServerSettings)> {
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(port) = self.port {
            settings.frontend_port = port;
        }
        if let Some(ms) = self.throttle_ms {
            if !(1..=1000).contains(&ms) {
                bail!("--throttle-ms must be 1-1000, got {ms}");
            }
            settings.input_throttle_ms = ms;
        }
        if let Some(ip) = self.advertise_ip {
            settings.address = Some(ip);
        }

        let ip: IpAddr = settings
            .host
            .parse()
            .with_context(|| format!("invalid bind address: '{}'", settings.host))?;
        let config = ServerConfig {
            bind_addr: SocketAddr::new(ip, settings.frontend_port),
            settings_path,
            ..ServerConfig::default()
        };
        Ok((config, settings))
    }
}

fn open_store(path: Option<PathBuf>) -> (Arc<dyn SettingsStore>, Option<PathBuf>) {
    let store = match path {
        Some(path) => Ok(TomlSettingsStore::new(path)),
        None => TomlSettingsStore::at_default_location(),
    };
    match store {
        Ok(store) => {
            let path = store.path().to_path_buf();
            (Arc::new(store), Some(path))
        }
        Err(e) => {
            warn!("{e}; settings will not be persisted");
            (Arc::new(MemorySettingsStore::new()), None)
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut cli = Cli::parse();
    let (store, settings_path) = open_store(cli.config.take());
    let settings = store.load().context("failed to load settings")?;
    let (config, settings) = cli.resolve(settings, settings_path)?;

    let detected_ip = detect_lan_ip().to_string();
    info!(
        "padlink server starting: bind={}, advertise={}, throttle={}ms",
        config.bind_addr,
        settings.address.as_deref().unwrap_or(&detected_ip),
        settings.input_throttle_ms
    );
    if let Some(path) = &config.settings_path {
        info!("settings file: {}", path.display());
    }

    let state = ServerState::new(
        &config,
        settings,
        store,
        Arc::new(TracingActuator::new()),
        detected_ip,
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C: {e}"),
        }
    });

    run_server(&config, state, running).await?;

    info!("padlink server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
