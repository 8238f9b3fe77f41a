//! padlink touch client: entry point.
//!
//! Connects to a padlink host and turns newline-delimited JSON touch events
//! read from stdin into input on the host.  Messages from the host are
//! printed to stdout, one JSON object per line.
//!
//! # Usage
//!
//! ```text
//! padlink-client [OPTIONS]
//!
//! Options:
//!   --url <URL>                WebSocket URL [default: ws://127.0.0.1:3000/ws]
//!   --token <TOKEN>            Access token (required off-host)
//!   --sensitivity <X>          Pointer/scroll multiplier [default: 1.0]
//!   --invert-scroll            Natural scrolling
//!   --axis-threshold <RATIO>   Scroll-mode axis lock ratio [default: 2.5]
//! ```
//!
//! | Variable                 | Flag               |
//! |--------------------------|--------------------|
//! | `PADLINK_URL`            | `--url`            |
//! | `PADLINK_TOKEN`          | `--token`          |
//! | `PADLINK_SENSITIVITY`    | `--sensitivity`    |
//! | `PADLINK_INVERT_SCROLL`  | `--invert-scroll`  |
//! | `PADLINK_AXIS_THRESHOLD` | `--axis-threshold` |
//!
//! # Runtime structure
//!
//! ```text
//! main()
//!  ├─ TransportChannel::connect()   -- supervisor task with reconnect
//!  ├─ one printer task per server message type
//!  └─ select loop
//!       ├─ stdin line      -> Trackpad::apply
//!       ├─ release timer   -> Trackpad::fire_release
//!       └─ Ctrl+C / EOF    -> TransportChannel::close
//! ```

use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use padlink_core::protocol::messages::SERVER_MESSAGE_TYPES;
use padlink_core::{encode_server_message, GestureConfig};
use padlink_client::application::{parse_event, Trackpad};
use padlink_client::domain::{ClientConfig, TransportConfig, DEFAULT_SERVER_URL};
use padlink_client::infrastructure::TransportChannel;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// padlink touch client.
#[derive(Debug, Parser)]
#[command(
    name = "padlink-client",
    about = "Sends trackpad gestures and keys to a padlink host",
    version
)]
struct Cli {
    #[arg(long, env = "PADLINK_URL", default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Access token issued by the host.
    #[arg(long, env = "PADLINK_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "PADLINK_SENSITIVITY", default_value_t = 1.0)]
    sensitivity: f64,

    #[arg(long, env = "PADLINK_INVERT_SCROLL")]
    invert_scroll: bool,

    /// How much one axis must dominate before scroll mode locks to it.
    #[arg(long, env = "PADLINK_AXIS_THRESHOLD", default_value_t = 2.5)]
    axis_threshold: f64,
}

impl Cli {
    /// # Errors
    ///
    /// Returns an error for a non-positive sensitivity or an axis threshold
    /// below 1.
    fn into_config(self) -> anyhow::Result<ClientConfig> {
        if self.sensitivity.is_nan() || self.sensitivity <= 0.0 {
            bail!("--sensitivity must be positive, got {}", self.sensitivity);
        }
        if self.axis_threshold.is_nan() || self.axis_threshold < 1.0 {
            bail!("--axis-threshold must be at least 1, got {}", self.axis_threshold);
        }
        Ok(ClientConfig {
            transport: TransportConfig {
                url: self.url,
                token: self.token.filter(|t| !t.is_empty()),
                ..TransportConfig::default()
            },
            gesture: GestureConfig {
                sensitivity: self.sensitivity,
                invert_scroll: self.invert_scroll,
                axis_threshold: self.axis_threshold,
            },
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config()?;
    info!("padlink client starting: url={}", config.transport.url);

    let channel = TransportChannel::new(config.transport);
    channel.connect().context("failed to start transport")?;

    for tag in SERVER_MESSAGE_TYPES {
        let mut rx = channel.subscribe(tag);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match encode_server_message(&msg) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("failed to print {}: {e}", msg.type_tag()),
                }
            }
        });
    }

    let mut trackpad = Trackpad::new(config.gesture, channel.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let release = trackpad.release_deadline();
        let release_at = release
            .map(|timer| tokio::time::Instant::from_std(timer.deadline))
            .unwrap_or_else(tokio::time::Instant::now);

        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => match parse_event(&line) {
                        Ok(Some(event)) => trackpad.apply(event, Instant::now()),
                        Ok(None) => {}
                        Err(e) => warn!("{e}"),
                    },
                    None => {
                        info!("stdin closed; shutting down");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(release_at), if release.is_some() => {
                if let Some(timer) = release {
                    trackpad.fire_release(timer.token);
                }
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::error!("failed to listen for Ctrl+C: {e}");
                }
                info!("received Ctrl+C; shutting down");
                break;
            }
        }
    }

    channel.close().await;
    info!("padlink client stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("padlink-client").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_target_local_host() {
        // Arrange / Act
        let config = cli(&[]).into_config().unwrap();

        // Assert
        assert_eq!(config.transport.url, DEFAULT_SERVER_URL);
        assert_eq!(config.transport.token, None);
        assert_eq!(config.gesture, GestureConfig::default());
    }

    #[test]
    fn test_flags_are_applied() {
        // Arrange
        let args = [
            "--url", "ws://10.0.0.4:3000/ws", "--token", "abc", "--sensitivity", "1.5",
            "--invert-scroll", "--axis-threshold", "3",
        ];

        // Act
        let config = cli(&args).into_config().unwrap();

        // Assert
        assert_eq!(config.transport.url, "ws://10.0.0.4:3000/ws");
        assert_eq!(config.transport.token.as_deref(), Some("abc"));
        assert_eq!(
            config.gesture,
            GestureConfig { sensitivity: 1.5, invert_scroll: true, axis_threshold: 3.0 }
        );
    }

    #[test]
    fn test_empty_token_means_none() {
        let config = cli(&["--token", ""]).into_config().unwrap();
        assert_eq!(config.transport.token, None);
    }

    #[test]
    fn test_zero_sensitivity_is_an_error() {
        assert!(cli(&["--sensitivity", "0"]).into_config().is_err());
    }

    #[test]
    fn test_axis_threshold_below_one_is_an_error() {
        assert!(cli(&["--axis-threshold", "0.5"]).into_config().is_err());
    }
}
