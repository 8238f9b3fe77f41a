//! Per-connection input dispatch: validation, coalescing and actuation.
//!
//! An [`InputDispatcher`] is owned by the dispatcher task of one WebSocket
//! connection.  It validates every [`Intent`] (untrusted input), coalesces
//! high-rate `move` and `scroll` traffic with a leading-edge throttle, and
//! drives the shared [`ActuatorQueue`].
//!
//! Coalescing is connection-scoped: a pending trailing value lives in the
//! dispatcher, so it disappears together with the connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use padlink_core::{Intent, Key, KeyCode, MAX_COMBO_KEYS};

use super::actuator::{press_chord, tap_key, ActuatorError, ActuatorQueue, ScrollAxis};
use crate::domain::SwipeBindings;

/// Largest accepted magnitude for a move or scroll component.
pub const MAX_DELTA: f64 = 2000.0;

/// Longest `text` payload typed; longer input is truncated.
pub const MAX_TEXT_CHARS: usize = 500;

/// Scroll ticks applied per axis for one event.
pub const MAX_SCROLL_TICKS: i32 = 20;

/// Wheel ticks emitted per zoom event are capped at this magnitude.
const MAX_ZOOM_STEP: f64 = 5.0;
const ZOOM_SCALE: f64 = 0.5;

/// How long a combo holds its keys down before releasing.
pub const CHORD_DWELL: Duration = Duration::from_millis(10);

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    /// The intent failed validation and was dropped without touching the host.
    #[error("{kind} rejected: {reason}")]
    Rejected { kind: &'static str, reason: String },

    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

impl DispatchError {
    fn rejected(kind: &'static str, reason: impl Into<String>) -> Self {
        DispatchError::Rejected {
            kind,
            reason: reason.into(),
        }
    }
}

/// Modifier used for the host's copy and paste shortcuts.
pub fn platform_clipboard_modifier() -> KeyCode {
    if cfg!(target_os = "macos") {
        KeyCode::MetaLeft
    } else {
        KeyCode::ControlLeft
    }
}

/// Connection-independent dispatch settings, snapshotted when a connection opens.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub clipboard_modifier: KeyCode,
    pub swipe: SwipeBindings,
    /// Wait between the copy chord and the clipboard read.
    pub copy_settle: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            clipboard_modifier: platform_clipboard_modifier(),
            swipe: SwipeBindings::default(),
            copy_settle: Duration::from_millis(50),
        }
    }
}

// ── Throttle ──────────────────────────────────────────────────────────────────

/// Leading-edge throttle with a single trailing value.
///
/// The first value in a window passes straight through.  Values arriving
/// inside the window replace each other; the latest is released once the
/// window ends.
#[derive(Debug)]
pub struct Throttle<T> {
    last_emit: Option<Instant>,
    pending: Option<(T, Instant)>,
}

impl<T> Default for Throttle<T> {
    fn default() -> Self {
        Self {
            last_emit: None,
            pending: None,
        }
    }
}

impl<T> Throttle<T> {
    /// Offers a value; returns it when it may be applied immediately.
    pub fn offer(&mut self, value: T, now: Instant, interval: Duration) -> Option<T> {
        match self.last_emit {
            Some(last) if now < last + interval => {
                self.pending = Some((value, last + interval));
                None
            }
            _ => {
                self.last_emit = Some(now);
                self.pending = None;
                Some(value)
            }
        }
    }

    /// When the trailing value becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Takes the trailing value if its window has ended.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if *at <= now => {
                self.last_emit = Some(now);
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// Takes the trailing value regardless of its deadline.
    pub fn take_pending(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }
}

// ── InputDispatcher ───────────────────────────────────────────────────────────

pub struct InputDispatcher {
    queue: ActuatorQueue,
    throttle_ms: Arc<AtomicU64>,
    settings: DispatchSettings,
    moves: Throttle<(f64, f64)>,
    scrolls: Throttle<(f64, f64)>,
    /// Sub-pixel movement not yet applied.
    remainder: (f64, f64),
}

impl InputDispatcher {
    /// `throttle_ms` is read on every event so `update-config` applies live.
    pub fn new(queue: ActuatorQueue, throttle_ms: Arc<AtomicU64>, settings: DispatchSettings) -> Self {
        Self {
            queue,
            throttle_ms,
            settings,
            moves: Throttle::default(),
            scrolls: Throttle::default(),
            remainder: (0.0, 0.0),
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms.load(Ordering::Relaxed))
    }

    /// Validates and applies one intent.
    ///
    /// `move` and `scroll` may be deferred; call [`Self::flush_due`] at
    /// [`Self::next_flush`] to apply the trailing value.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Rejected`] when validation drops the intent,
    /// [`DispatchError::Actuator`] when the host refused the operation.
    pub async fn submit(&mut self, intent: Intent, now: Instant) -> Result<(), DispatchError> {
        match intent {
            Intent::Move { dx, dy } => {
                let delta = (bounded("move", dx)?, bounded("move", dy)?);
                let interval = self.interval();
                match self.moves.offer(delta, now, interval) {
                    Some((dx, dy)) => self.apply_move(dx, dy).await,
                    None => Ok(()),
                }
            }
            Intent::Scroll { dx, dy } => {
                let delta = (bounded("scroll", dx)?, bounded("scroll", dy)?);
                let interval = self.interval();
                match self.scrolls.offer(delta, now, interval) {
                    Some((dx, dy)) => self.apply_scroll(dx, dy).await,
                    None => Ok(()),
                }
            }
            Intent::Zoom { delta } => {
                if !delta.is_finite() {
                    return Err(DispatchError::rejected("zoom", "non-finite delta"));
                }
                self.apply_zoom(delta).await
            }
            Intent::Click { button, pressed } => {
                // The trailing move lands before the button changes state.
                if let Some((dx, dy)) = self.moves.take_pending() {
                    self.apply_move(dx, dy).await?;
                }
                Ok(self.queue.lease().await.button(button, pressed).await?)
            }
            Intent::Swipe { direction } => {
                let names = self.settings.swipe.chord(direction).to_vec();
                let keys = resolve_chord("swipe", &names)?;
                let lease = self.queue.lease().await;
                Ok(press_chord(&*lease, &keys, CHORD_DWELL).await?)
            }
            Intent::Key { name } => self.apply_key(&name).await,
            Intent::Text { value } => {
                let text: String = value.chars().take(MAX_TEXT_CHARS).collect();
                if text.is_empty() {
                    return Ok(());
                }
                Ok(self.queue.lease().await.type_text(&text).await?)
            }
            Intent::Combo { keys } => {
                let names = &keys[..keys.len().min(MAX_COMBO_KEYS)];
                let keys = resolve_chord("combo", names)?;
                let lease = self.queue.lease().await;
                Ok(press_chord(&*lease, &keys, CHORD_DWELL).await?)
            }
        }
    }

    /// Earliest instant at which a coalesced value is due.
    pub fn next_flush(&self) -> Option<Instant> {
        match (self.moves.deadline(), self.scrolls.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Applies every coalesced value whose window has ended.
    pub async fn flush_due(&mut self, now: Instant) -> Result<(), DispatchError> {
        if let Some((dx, dy)) = self.moves.take_due(now) {
            self.apply_move(dx, dy).await?;
        }
        if let Some((dx, dy)) = self.scrolls.take_due(now) {
            self.apply_scroll(dx, dy).await?;
        }
        Ok(())
    }

    /// Copies the host selection and returns the clipboard text.
    pub async fn copy(&mut self) -> Result<String, DispatchError> {
        let chord = [
            Key::Named(self.settings.clipboard_modifier),
            Key::Named(KeyCode::KeyC),
        ];
        // One lease through the read; another connection's paste waits.
        let lease = self.queue.lease().await;
        press_chord(&*lease, &chord, Duration::ZERO).await?;
        tokio::time::sleep(self.settings.copy_settle).await;
        Ok(lease.read_clipboard().await?)
    }

    /// Optionally replaces the host clipboard, then pastes.
    pub async fn paste(&mut self, text: Option<&str>) -> Result<(), DispatchError> {
        let lease = self.queue.lease().await;
        if let Some(text) = text {
            lease.write_clipboard(text).await?;
        }
        let chord = [
            Key::Named(self.settings.clipboard_modifier),
            Key::Named(KeyCode::KeyV),
        ];
        Ok(press_chord(&*lease, &chord, Duration::ZERO).await?)
    }

    // ── Actions ───────────────────────────────────────────────────────────

    async fn apply_move(&mut self, dx: f64, dy: f64) -> Result<(), DispatchError> {
        let x = self.remainder.0 + dx;
        let y = self.remainder.1 + dy;
        let (step_x, step_y) = (x.round(), y.round());
        self.remainder = (x - step_x, y - step_y);
        if step_x == 0.0 && step_y == 0.0 {
            return Ok(());
        }
        let lease = self.queue.lease().await;
        Ok(lease.move_by(step_x as i32, step_y as i32).await?)
    }

    async fn apply_scroll(&mut self, dx: f64, dy: f64) -> Result<(), DispatchError> {
        let lease = self.queue.lease().await;
        let vertical = scroll_ticks(dy);
        if vertical != 0 {
            lease.scroll(ScrollAxis::Vertical, vertical).await?;
        }
        let horizontal = scroll_ticks(dx);
        if horizontal != 0 {
            lease.scroll(ScrollAxis::Horizontal, horizontal).await?;
        }
        Ok(())
    }

    async fn apply_zoom(&mut self, delta: f64) -> Result<(), DispatchError> {
        let ticks = zoom_ticks(delta);
        if ticks == 0 {
            return Ok(());
        }
        let lease = self.queue.lease().await;
        lease.key(KeyCode::ControlLeft, true).await?;
        let scrolled = lease.scroll(ScrollAxis::Vertical, ticks).await;
        let released = lease.key(KeyCode::ControlLeft, false).await;
        scrolled.and(released)?;
        Ok(())
    }

    async fn apply_key(&mut self, name: &str) -> Result<(), DispatchError> {
        let mut chars = name.chars();
        if let (Some(_), None) = (chars.next(), chars.next()) {
            // A single character is typed so case and layout are preserved.
            return Ok(self.queue.lease().await.type_text(name).await?);
        }
        match Key::parse(name) {
            Some(Key::Named(code)) => Ok(tap_key(&*self.queue.lease().await, code).await?),
            _ => {
                warn!("unmapped key name dropped");
                Err(DispatchError::rejected("key", "Unmapped key"))
            }
        }
    }
}

// ── Validation helpers ────────────────────────────────────────────────────────

fn bounded(kind: &'static str, value: f64) -> Result<f64, DispatchError> {
    if !value.is_finite() {
        return Err(DispatchError::rejected(kind, "non-finite delta"));
    }
    Ok(value.clamp(-MAX_DELTA, MAX_DELTA))
}

fn scroll_ticks(delta: f64) -> i32 {
    (delta.round() as i32).clamp(-MAX_SCROLL_TICKS, MAX_SCROLL_TICKS)
}

/// Wheel ticks for a pinch delta; spreading fingers (positive) zooms in.
fn zoom_ticks(delta: f64) -> i32 {
    let scaled = delta.signum() * (delta.abs() * ZOOM_SCALE).min(MAX_ZOOM_STEP);
    (-scaled).round() as i32
}

/// Resolves chord names, skipping unknown ones.
fn resolve_chord(kind: &'static str, names: &[String]) -> Result<Vec<Key>, DispatchError> {
    let keys: Vec<Key> = names
        .iter()
        .filter_map(|name| {
            let key = Key::parse(name);
            if key.is_none() {
                warn!(kind, "unknown key in chord skipped");
            }
            key
        })
        .collect();
    if keys.is_empty() {
        return Err(DispatchError::rejected(kind, "no valid keys"));
    }
    debug!(kind, keys = keys.len(), "chord resolved");
    Ok(keys)
}
