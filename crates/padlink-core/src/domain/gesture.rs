//! Gesture recognition: raw contact samples in, [`Intent`]s out.
//!
//! The engine tracks every live contact in an owned record keyed by its
//! platform identifier and classifies each batch of samples into exactly one
//! interpretation: pointer move, drag, scroll, pinch-zoom, three-finger swipe,
//! or (on lift) a tap.
//!
//! # Timing model
//!
//! The engine never reads a clock.  Every entry point takes the sample
//! timestamp, and the one timer it needs (the deferred release after a
//! one-finger tap) is exposed as a [`ReleaseTimer`] the caller schedules.
//! When the deadline passes the caller hands the timer's token back through
//! [`GestureEngine::on_release_timer`].  Arming a new timer or promoting the
//! tap to a drag invalidates the previous token, so a late callback is a no-op.
//!
//! # Tap to drag
//!
//! ```text
//!   tap lifts ──► press(left) + arm timer ──► timer fires ──► release(left)
//!                                 │
//!                                 └─ contact down before deadline
//!                                        ──► cancel timer, dragging = true
//!                                        ──► moves route as pointer motion
//!                                        ──► last lift releases(left)
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::intent::{round_tenth, Intent, MouseButton, SwipeDirection};

// ── Tuning constants ──────────────────────────────────────────────────────────

/// Distance from start (px) a contact must travel before the session counts as
/// moved, indexed by live contact count minus one.  Larger counts reuse the
/// last entry.
pub const MOVE_THRESHOLDS: [f64; 3] = [8.0, 12.0, 16.0];

/// Window for tap recognition, the stationary-press timeout, and the deferred
/// left-button release.
pub const TAP_TIMEOUT: Duration = Duration::from_millis(250);

/// Change in inter-contact distance (px per sample) that starts a pinch.
pub const PINCH_THRESHOLD: f64 = 5.0;

/// Averaged three-finger travel (px) that completes a swipe.
pub const SWIPE_THRESHOLD: f64 = 80.0;

/// Upper bound of the pointer acceleration multiplier.
pub const MAX_ACCELERATION: f64 = 3.0;

/// Speed (px/s) at which acceleration reaches ~63% of its range.
const ACCELERATION_SCALE: f64 = 1500.0;

/// Pointer acceleration multiplier for a contact moving at `speed` px/s.
///
/// Monotonically increasing, `1.0` at rest, and bounded by
/// [`MAX_ACCELERATION`].
pub fn acceleration_multiplier(speed: f64) -> f64 {
    if !speed.is_finite() || speed <= 0.0 {
        return 1.0;
    }
    1.0 + (MAX_ACCELERATION - 1.0) * (1.0 - (-speed / ACCELERATION_SCALE).exp())
}

fn move_threshold(live_contacts: usize) -> f64 {
    let idx = live_contacts.saturating_sub(1).min(MOVE_THRESHOLDS.len() - 1);
    MOVE_THRESHOLDS[idx]
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// Platform identifier of a touch point, stable for the life of the contact.
pub type ContactId = u32;

/// One position sample for one contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactSample {
    pub id: ContactId,
    pub x: f64,
    pub y: f64,
}

impl ContactSample {
    pub fn new(id: ContactId, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }
}

/// User-tunable gesture parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Multiplier applied to every emitted move, scroll and zoom value.
    pub sensitivity: f64,
    /// Flips the sign of scroll and zoom output.
    pub invert_scroll: bool,
    /// Ratio one axis must exceed the other by before scroll mode locks to it.
    pub axis_threshold: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            invert_scroll: false,
            axis_threshold: 2.5,
        }
    }
}

/// Handle for the armed deferred-release timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseTimer {
    /// When the pending left-button release should fire.
    pub deadline: Instant,
    /// Identifies this arming; stale tokens are ignored.
    pub token: u64,
}

#[derive(Debug, Clone)]
struct Contact {
    id: ContactId,
    x: f64,
    y: f64,
    start_x: f64,
    start_y: f64,
    last_sample_at: Instant,
}

impl Contact {
    fn from_sample(sample: &ContactSample, at: Instant) -> Self {
        Self {
            id: sample.id,
            x: sample.x,
            y: sample.y,
            start_x: sample.x,
            start_y: sample.y,
            last_sample_at: at,
        }
    }
}

fn distance(a: &Contact, b: &Contact) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// State that lives from the first contact-down until the last contact-up.
#[derive(Debug, Default)]
struct GestureSession {
    /// Live contacts in arrival order; the first two define the pinch pair.
    contacts: Vec<Contact>,
    moved: bool,
    started_at: Option<Instant>,
    released_count: usize,
    pinching: bool,
    last_pinch_distance: Option<f64>,
    swipe_dx: f64,
    swipe_dy: f64,
}

impl GestureSession {
    fn position_of(&self, id: ContactId) -> Option<usize> {
        self.contacts.iter().position(|c| c.id == id)
    }

    fn reset_pinch(&mut self) {
        self.pinching = false;
        self.last_pinch_distance = None;
    }
}

// ── GestureEngine ─────────────────────────────────────────────────────────────

/// Converts contact samples into intents.
///
/// Single-threaded by construction: every method takes `&mut self` and runs to
/// completion.
#[derive(Debug)]
pub struct GestureEngine {
    config: GestureConfig,
    scroll_mode: bool,
    session: GestureSession,
    /// Survives session resets: the deferred release is armed as the last
    /// contact lifts and consumed by the next session's first contact.
    dragging: bool,
    pending_release: Option<ReleaseTimer>,
    next_token: u64,
}

impl Default for GestureEngine {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureEngine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            scroll_mode: false,
            session: GestureSession::default(),
            dragging: false,
            pending_release: None,
            next_token: 0,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GestureConfig) {
        self.config = config;
    }

    /// When set, single-finger motion scrolls instead of moving the pointer.
    pub fn set_scroll_mode(&mut self, enabled: bool) {
        self.scroll_mode = enabled;
    }

    pub fn scroll_mode(&self) -> bool {
        self.scroll_mode
    }

    /// Returns `true` while at least one contact is down.
    pub fn is_tracking(&self) -> bool {
        !self.session.contacts.is_empty()
    }

    pub fn live_contacts(&self) -> usize {
        self.session.contacts.len()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// The armed deferred-release timer, if any.
    pub fn pending_release(&self) -> Option<ReleaseTimer> {
        self.pending_release
    }

    // ── Contact down ──────────────────────────────────────────────────────

    pub fn on_contact_down(&mut self, sample: ContactSample, at: Instant) {
        self.on_contacts_down(&[sample], at);
    }

    /// Registers new contacts.
    ///
    /// A sample whose id is already live replaces that contact's record.
    /// If the deferred-release timer is armed it is cancelled and the tap
    /// becomes a drag.
    pub fn on_contacts_down(&mut self, samples: &[ContactSample], at: Instant) {
        let session = &mut self.session;
        if session.contacts.is_empty() {
            session.started_at = Some(at);
            session.moved = false;
        }

        for sample in samples {
            let contact = Contact::from_sample(sample, at);
            match session.position_of(sample.id) {
                Some(idx) => session.contacts[idx] = contact,
                None => session.contacts.push(contact),
            }
        }

        match session.contacts.len() {
            2 => {
                session.last_pinch_distance =
                    Some(distance(&session.contacts[0], &session.contacts[1]));
                session.pinching = false;
            }
            3 => {
                session.swipe_dx = 0.0;
                session.swipe_dy = 0.0;
            }
            _ => {}
        }

        if self.pending_release.take().is_some() {
            self.dragging = true;
        }
    }

    // ── Contact move ──────────────────────────────────────────────────────

    pub fn on_contact_move(&mut self, sample: ContactSample, at: Instant) -> Vec<Intent> {
        self.on_contacts_move(&[sample], at)
    }

    /// Processes one frame of position updates.
    ///
    /// Samples for unknown ids are skipped.  Nothing is emitted until the
    /// session has moved past its noise threshold.
    pub fn on_contacts_move(&mut self, samples: &[ContactSample], at: Instant) -> Vec<Intent> {
        let live = self.session.contacts.len();
        let threshold = move_threshold(live);
        let started_at = self.session.started_at;
        let mut moved = self.session.moved;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut matched = 0usize;

        for sample in samples {
            let Some(idx) = self.session.position_of(sample.id) else {
                continue;
            };
            let contact = &mut self.session.contacts[idx];
            matched += 1;

            if !moved {
                let travelled = (sample.x - contact.start_x).hypot(sample.y - contact.start_y);
                let held_long = started_at
                    .map(|s| at.saturating_duration_since(s) >= TAP_TIMEOUT)
                    .unwrap_or(false);
                if travelled > threshold || held_long {
                    moved = true;
                }
            }

            let dx = sample.x - contact.x;
            let dy = sample.y - contact.y;
            let elapsed = at.saturating_duration_since(contact.last_sample_at).as_secs_f64();
            if elapsed > 0.0 {
                let multiplier = acceleration_multiplier(dx.hypot(dy) / elapsed);
                sum_x += dx * multiplier;
                sum_y += dy * multiplier;
            }

            contact.x = sample.x;
            contact.y = sample.y;
            contact.last_sample_at = at;
        }

        self.session.moved = moved;
        if !moved || matched == 0 {
            return Vec::new();
        }
        self.route_movement(sum_x, sum_y, matched).into_iter().collect()
    }

    fn route_movement(&mut self, sum_x: f64, sum_y: f64, matched: usize) -> Option<Intent> {
        let sensitivity = self.config.sensitivity;
        let invert = if self.config.invert_scroll { -1.0 } else { 1.0 };

        if self.dragging {
            return pointer_move(sum_x * sensitivity, sum_y * sensitivity);
        }

        let live = self.session.contacts.len();
        match live {
            3 => self.accumulate_swipe(sum_x / matched as f64, sum_y / matched as f64),
            n if n > 3 => None,
            2 if !self.scroll_mode => {
                let session = &mut self.session;
                let dist = distance(&session.contacts[0], &session.contacts[1]);
                let delta = session.last_pinch_distance.map(|last| dist - last).unwrap_or(0.0);
                session.last_pinch_distance = Some(dist);
                if session.pinching || delta.abs() > PINCH_THRESHOLD {
                    session.pinching = true;
                    let delta = delta * sensitivity * invert;
                    (delta != 0.0).then_some(Intent::Zoom { delta })
                } else {
                    scroll(-sum_x * sensitivity * invert, -sum_y * sensitivity * invert)
                }
            }
            _ if self.scroll_mode || live == 2 => {
                let (mut dx, mut dy) = (sum_x, sum_y);
                if self.scroll_mode {
                    let threshold = self.config.axis_threshold;
                    if dx.abs() > dy.abs() * threshold {
                        dy = 0.0;
                    } else if dy.abs() > dx.abs() * threshold {
                        dx = 0.0;
                    }
                }
                scroll(-dx * sensitivity * invert, -dy * sensitivity * invert)
            }
            1 => pointer_move(sum_x * sensitivity, sum_y * sensitivity),
            _ => None,
        }
    }

    fn accumulate_swipe(&mut self, dx: f64, dy: f64) -> Option<Intent> {
        let session = &mut self.session;
        session.swipe_dx += dx;
        session.swipe_dy += dy;
        if session.swipe_dx.abs().max(session.swipe_dy.abs()) < SWIPE_THRESHOLD {
            return None;
        }
        let direction = SwipeDirection::from_displacement(session.swipe_dx, session.swipe_dy);
        session.swipe_dx = 0.0;
        session.swipe_dy = 0.0;
        Some(Intent::Swipe { direction })
    }

    // ── Contact up ────────────────────────────────────────────────────────

    pub fn on_contact_up(&mut self, id: ContactId, at: Instant) -> Vec<Intent> {
        self.on_contacts_up(&[id], at)
    }

    /// Removes lifted contacts and, when the last one lifts, resolves drag
    /// release and tap recognition.
    ///
    /// Ids that are not live are ignored.
    pub fn on_contacts_up(&mut self, ids: &[ContactId], at: Instant) -> Vec<Intent> {
        let mut intents = Vec::new();
        let session = &mut self.session;

        for id in ids {
            if let Some(idx) = session.position_of(*id) {
                session.contacts.remove(idx);
                session.released_count += 1;
            }
        }

        if session.contacts.len() < 2 {
            session.reset_pinch();
        }
        if session.released_count > MOVE_THRESHOLDS.len() {
            session.moved = true;
        }

        if !session.contacts.is_empty() || session.released_count == 0 {
            return intents;
        }

        if self.dragging {
            self.dragging = false;
            intents.push(Intent::Click {
                button: MouseButton::Left,
                pressed: false,
            });
        }

        let within_timeout = session
            .started_at
            .map(|s| at.saturating_duration_since(s) < TAP_TIMEOUT)
            .unwrap_or(false);
        let tap_button = if !session.moved && within_timeout {
            MouseButton::from_tap_count(session.released_count)
        } else {
            None
        };

        self.session = GestureSession::default();

        if let Some(button) = tap_button {
            intents.push(Intent::Click {
                button,
                pressed: true,
            });
            if button == MouseButton::Left {
                self.arm_release(at + TAP_TIMEOUT);
            } else {
                intents.push(Intent::Click {
                    button,
                    pressed: false,
                });
            }
        }

        intents
    }

    // ── Deferred release ──────────────────────────────────────────────────

    fn arm_release(&mut self, deadline: Instant) {
        self.next_token = self.next_token.wrapping_add(1);
        self.pending_release = Some(ReleaseTimer {
            deadline,
            token: self.next_token,
        });
    }

    /// Fires the deferred release identified by `token`.
    ///
    /// Emits `click{left, pressed: false}` only when `token` names the timer
    /// that is still armed.
    pub fn on_release_timer(&mut self, token: u64) -> Vec<Intent> {
        match self.pending_release {
            Some(timer) if timer.token == token => {
                self.pending_release = None;
                vec![Intent::Click {
                    button: MouseButton::Left,
                    pressed: false,
                }]
            }
            _ => Vec::new(),
        }
    }

    /// Fires the armed release if its deadline is at or before `now`.
    pub fn poll_release(&mut self, now: Instant) -> Vec<Intent> {
        match self.pending_release {
            Some(timer) if timer.deadline <= now => self.on_release_timer(timer.token),
            _ => Vec::new(),
        }
    }
}

fn pointer_move(dx: f64, dy: f64) -> Option<Intent> {
    let (dx, dy) = (round_tenth(dx), round_tenth(dy));
    (dx != 0.0 || dy != 0.0).then_some(Intent::Move { dx, dy })
}

fn scroll(dx: f64, dy: f64) -> Option<Intent> {
    let (dx, dy) = (round_tenth(dx), round_tenth(dy));
    (dx != 0.0 || dy != 0.0).then_some(Intent::Scroll { dx, dy })
}
