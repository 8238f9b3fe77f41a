//! The Input Actuator contract: the OS automation primitives the host needs.
//!
//! Implementations live in `infrastructure::actuator`.  The dispatcher only
//! talks to this trait, always through an [`ActuatorQueue`] so that a key
//! chord from one connection can never interleave with input from another.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use padlink_core::{Key, KeyCode, MouseButton};

/// Errors that can occur while driving the host's input devices.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActuatorError {
    /// The backend rejected or failed the operation.
    #[error("actuator backend error: {0}")]
    Backend(String),

    /// This backend cannot perform the operation at all.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Scroll wheel axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollAxis {
    /// Positive ticks scroll down.
    Vertical,
    /// Positive ticks scroll right.
    Horizontal,
}

/// OS-level input injection.
///
/// # Contract
///
/// - Methods may block for a few milliseconds while the OS processes the
///   event; callers serialise access through [`ActuatorQueue`].
/// - `key(code, true)` must eventually be paired with `key(code, false)` by
///   the caller; the actuator does not track held keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InputActuator: Send + Sync {
    /// Moves the pointer to an absolute screen position.
    async fn move_to(&self, x: i32, y: i32) -> Result<(), ActuatorError>;

    /// Moves the pointer relative to where it is now.
    async fn move_by(&self, dx: i32, dy: i32) -> Result<(), ActuatorError>;

    async fn button(&self, button: MouseButton, pressed: bool) -> Result<(), ActuatorError>;

    /// Scrolls `ticks` wheel notches; the sign picks the direction.
    async fn scroll(&self, axis: ScrollAxis, ticks: i32) -> Result<(), ActuatorError>;

    async fn key(&self, key: KeyCode, pressed: bool) -> Result<(), ActuatorError>;

    /// Types a Unicode string independent of the active keyboard layout.
    async fn type_text(&self, text: &str) -> Result<(), ActuatorError>;

    async fn read_clipboard(&self) -> Result<String, ActuatorError>;

    async fn write_clipboard(&self, text: &str) -> Result<(), ActuatorError>;
}

// ── ActuatorQueue ─────────────────────────────────────────────────────────────

/// Serialises every actuator operation across all connections.
///
/// A lease holds the turn for as long as it lives, so a multi-step sequence
/// (press modifiers, scroll, release) runs without interleaving.
#[derive(Clone)]
pub struct ActuatorQueue {
    actuator: Arc<dyn InputActuator>,
    turn: Arc<Mutex<()>>,
}

impl ActuatorQueue {
    pub fn new(actuator: Arc<dyn InputActuator>) -> Self {
        Self {
            actuator,
            turn: Arc::new(Mutex::new(())),
        }
    }

    /// Waits for exclusive access to the actuator.
    pub async fn lease(&self) -> ActuatorLease<'_> {
        let turn = self.turn.lock().await;
        ActuatorLease {
            _turn: turn,
            actuator: self.actuator.as_ref(),
        }
    }
}

/// Exclusive access to the actuator; released on drop.
pub struct ActuatorLease<'a> {
    _turn: MutexGuard<'a, ()>,
    actuator: &'a dyn InputActuator,
}

impl<'a> Deref for ActuatorLease<'a> {
    type Target = dyn InputActuator + 'a;

    fn deref(&self) -> &Self::Target {
        self.actuator
    }
}

// ── Held-key sequences ────────────────────────────────────────────────────────

/// Presses `keys` in order, waits `dwell`, then releases in reverse.
///
/// Single characters with no key of their own are typed where they appear.
/// Pressing stops at the first failure, but every key that did go down is
/// released regardless; the first error seen is returned afterwards.
pub async fn press_chord(
    actuator: &dyn InputActuator,
    keys: &[Key],
    dwell: Duration,
) -> Result<(), ActuatorError> {
    let mut held: Vec<KeyCode> = Vec::with_capacity(keys.len());
    let mut first_error = None;

    for key in keys {
        let result = match key {
            Key::Named(code) => actuator.key(*code, true).await.map(|()| held.push(*code)),
            Key::Char(c) => actuator.type_text(c.encode_utf8(&mut [0u8; 4])).await,
        };
        if let Err(e) = result {
            first_error = Some(e);
            break;
        }
    }

    if first_error.is_none() && !dwell.is_zero() {
        tokio::time::sleep(dwell).await;
    }

    for code in held.iter().rev() {
        if let Err(e) = actuator.key(*code, false).await {
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Presses and releases a single key; the release runs even if the press failed.
pub async fn tap_key(actuator: &dyn InputActuator, code: KeyCode) -> Result<(), ActuatorError> {
    let pressed = actuator.key(code, true).await;
    let released = actuator.key(code, false).await;
    pressed.and(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{predicate::eq, Sequence};

    #[tokio::test]
    async fn test_lease_forwards_to_actuator() {
        // Arrange
        let mut mock = MockInputActuator::new();
        mock.expect_button()
            .withf(|b, pressed| *b == MouseButton::Left && *pressed)
            .times(1)
            .returning(|_, _| Ok(()));
        let queue = ActuatorQueue::new(Arc::new(mock));

        // Act
        let result = queue.lease().await.button(MouseButton::Left, true).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_lease_waits_for_first_to_drop() {
        // Arrange
        let queue = ActuatorQueue::new(Arc::new(MockInputActuator::new()));
        let first = queue.lease().await;
        let contender = queue.clone();

        // Act
        let waiter = tokio::spawn(async move {
            let _lease = contender.lease().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let blocked = !waiter.is_finished();
        drop(first);
        let joined = tokio::time::timeout(Duration::from_millis(10), waiter).await;

        // Assert
        assert!(blocked, "second lease must wait while the first is held");
        assert!(joined.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_chord_releases_in_reverse_order() {
        // Arrange
        let mut mock = MockInputActuator::new();
        let mut seq = Sequence::new();
        for (code, pressed) in [
            (KeyCode::ControlLeft, true),
            (KeyCode::ShiftLeft, true),
            (KeyCode::KeyT, true),
            (KeyCode::KeyT, false),
            (KeyCode::ShiftLeft, false),
            (KeyCode::ControlLeft, false),
        ] {
            mock.expect_key()
                .with(eq(code), eq(pressed))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }
        let keys = [
            Key::Named(KeyCode::ControlLeft),
            Key::Named(KeyCode::ShiftLeft),
            Key::Named(KeyCode::KeyT),
        ];

        // Act
        let result = press_chord(&mock, &keys, Duration::from_millis(10)).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_chord_types_single_chars_mid_chord() {
        // Arrange
        let mut mock = MockInputActuator::new();
        let mut seq = Sequence::new();
        mock.expect_key()
            .with(eq(KeyCode::ControlLeft), eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_type_text()
            .withf(|text| text == "@")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_key()
            .with(eq(KeyCode::ControlLeft), eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        // Act
        let result = press_chord(
            &mock,
            &[Key::Named(KeyCode::ControlLeft), Key::Char('@')],
            Duration::from_millis(10),
        )
        .await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_chord_releases_held_keys_after_failure() {
        // Arrange
        let mut mock = MockInputActuator::new();
        mock.expect_key()
            .with(eq(KeyCode::AltLeft), eq(true))
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_key()
            .with(eq(KeyCode::Tab), eq(true))
            .times(1)
            .returning(|_, _| Err(ActuatorError::Backend("injected".into())));
        mock.expect_key()
            .with(eq(KeyCode::AltLeft), eq(false))
            .times(1)
            .returning(|_, _| Ok(()));

        // Act
        let result = press_chord(
            &mock,
            &[Key::Named(KeyCode::AltLeft), Key::Named(KeyCode::Tab)],
            Duration::from_millis(10),
        )
        .await;

        // Assert
        assert_eq!(result, Err(ActuatorError::Backend("injected".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_chord_keeps_releasing_after_a_release_fails() {
        // Arrange
        let mut mock = MockInputActuator::new();
        let mut seq = Sequence::new();
        mock.expect_key()
            .with(eq(KeyCode::ControlLeft), eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_key()
            .with(eq(KeyCode::KeyC), eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_key()
            .with(eq(KeyCode::KeyC), eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ActuatorError::Backend("release".into())));
        mock.expect_key()
            .with(eq(KeyCode::ControlLeft), eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        // Act
        let result = press_chord(
            &mock,
            &[Key::Named(KeyCode::ControlLeft), Key::Named(KeyCode::KeyC)],
            Duration::from_millis(10),
        )
        .await;

        // Assert
        assert_eq!(result, Err(ActuatorError::Backend("release".into())));
    }

    #[tokio::test]
    async fn test_tap_key_releases_even_when_press_fails() {
        // Arrange
        let mut mock = MockInputActuator::new();
        mock.expect_key()
            .with(eq(KeyCode::Enter), eq(true))
            .times(1)
            .returning(|_, _| Err(ActuatorError::Unsupported("key")));
        mock.expect_key()
            .with(eq(KeyCode::Enter), eq(false))
            .times(1)
            .returning(|_, _| Ok(()));

        // Act
        let result = tap_key(&mock, KeyCode::Enter).await;

        // Assert
        assert_eq!(result, Err(ActuatorError::Unsupported("key")));
    }
}
