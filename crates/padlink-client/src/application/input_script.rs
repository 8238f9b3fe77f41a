//! Newline-delimited JSON touch events.
//!
//! The client binary has no touch screen of its own; it reads one event per
//! line from stdin so a UI shell (or a test harness) can drive it:
//!
//! ```text
//! {"kind":"down","contacts":[{"id":1,"x":10,"y":10}]}
//! {"kind":"move","contacts":[{"id":1,"x":30,"y":12}]}
//! {"kind":"up","ids":[1]}
//! {"kind":"key","name":"enter"}
//! {"kind":"modifier"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use serde::Deserialize;
use thiserror::Error;

use padlink_core::{ContactId, ContactSample};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("malformed input event: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InputEvent {
    Down { contacts: Vec<ContactSample> },
    Move { contacts: Vec<ContactSample> },
    Up { ids: Vec<ContactId> },
    Key { name: String },
    Text { value: String },
    /// Presses the on-screen modifier button.
    Modifier,
    Escape,
    ScrollMode { enabled: bool },
    Copy,
    Paste {
        #[serde(default)]
        text: Option<String>,
    },
}

/// Parses one line.  `Ok(None)` for blank and comment lines.
pub fn parse_event(line: &str) -> Result<Option<InputEvent>, ScriptError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}
