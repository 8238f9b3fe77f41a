//! Sticky-modifier combo recording.
//!
//! On a touch keyboard the user cannot hold `Ctrl` while tapping `C`, so the
//! client records the chord one key at a time:
//!
//! ```text
//!            toggle                 toggle (buffer non-empty)
//!  Release ─────────► Active ─────────────────────────────► Hold
//!     ▲                  │  toggle (buffer empty)             │
//!     └──────────────────┴────────────────────────────────────┘
//!                        toggle from Hold clears the buffer
//! ```
//!
//! In `Active` every key is appended to the buffer.  In `Hold` every key fires
//! `combo(buffer + key)` and the buffer stays, so `Ctrl+Shift` can be applied
//! to several keys in a row.  Escape always returns to `Release`.

use serde::{Deserialize, Serialize};

use super::intent::Intent;

/// Longest chord the buffer records; the host applies the same ceiling.
pub const MAX_COMBO_KEYS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComboState {
    #[default]
    Release,
    Active,
    Hold,
}

/// What the caller should do with a key after the buffer has seen it.
#[derive(Debug, Clone, PartialEq)]
pub enum ComboOutcome {
    /// Not recording; send the key normally.
    PassThrough,
    /// Appended to the buffer; send nothing.
    Recorded,
    /// Send this combo intent.
    Fire(Intent),
}

#[derive(Debug, Default)]
pub struct ComboBuffer {
    state: ComboState,
    keys: Vec<String>,
}

impl ComboBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ComboState {
        self.state
    }

    pub fn buffer(&self) -> &[String] {
        &self.keys
    }

    /// Human-readable chord, e.g. `"control + shift"`.
    pub fn label(&self) -> String {
        self.keys.join(" + ")
    }

    /// Advances the modifier button through its cycle and returns the new state.
    pub fn toggle(&mut self) -> ComboState {
        self.state = match self.state {
            ComboState::Active if !self.keys.is_empty() => ComboState::Hold,
            ComboState::Active => ComboState::Release,
            ComboState::Hold => {
                self.keys.clear();
                ComboState::Release
            }
            ComboState::Release => {
                self.keys.clear();
                ComboState::Active
            }
        };
        self.state
    }

    /// Feeds one key name through the buffer.
    pub fn handle_key(&mut self, name: &str) -> ComboOutcome {
        match self.state {
            ComboState::Release => ComboOutcome::PassThrough,
            ComboState::Active => {
                if self.keys.len() < MAX_COMBO_KEYS {
                    self.keys.push(name.to_owned());
                }
                ComboOutcome::Recorded
            }
            ComboState::Hold => {
                let mut keys = self.keys.clone();
                keys.push(name.to_owned());
                ComboOutcome::Fire(Intent::Combo { keys })
            }
        }
    }

    /// Abandons any recording and returns to `Release`.
    pub fn escape(&mut self) {
        self.state = ComboState::Release;
        self.keys.clear();
    }
}
