//! Key names accepted in `key` and `combo` messages.
//!
//! A name either resolves to a [`KeyCode`] from the table or, when it is a
//! single character outside the table, is treated as literal text to type.

pub mod key_code;

pub use key_code::KeyCode;

/// A resolved key reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A physical key the actuator can press and release.
    Named(KeyCode),
    /// A character with no key of its own; typed as text.
    Char(char),
}

impl Key {
    /// Resolves a client-supplied key name.
    ///
    /// Returns `None` for unknown multi-character names.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use padlink_core::keymap::{Key, KeyCode};
    ///
    /// assert_eq!(Key::parse("Enter"), Some(Key::Named(KeyCode::Enter)));
    /// assert_eq!(Key::parse("@"), Some(Key::Char('@')));
    /// assert_eq!(Key::parse("hyperspace"), None);
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(code) = KeyCode::from_name(name) {
            return Some(Key::Named(code));
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Key::Char(c)),
            _ => None,
        }
    }
}
