//! In-memory actuator that records every call.
//!
//! Used by integration tests that drive a real server over a socket and then
//! assert on what reached the host.  Every call is appended to one ordered
//! log so tests can check sequencing (press before release, clipboard write
//! before paste).
//!
//! Set `should_fail` to make every call return [`ActuatorError::Backend`]
//! (the call is still logged).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use padlink_core::{KeyCode, MouseButton};

use crate::application::{ActuatorError, InputActuator, ScrollAxis};

/// One recorded actuator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorCall {
    MoveTo(i32, i32),
    MoveBy(i32, i32),
    Button(MouseButton, bool),
    Scroll(ScrollAxis, i32),
    Key(KeyCode, bool),
    TypeText(String),
    ReadClipboard,
    WriteClipboard(String),
}

#[derive(Debug, Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<ActuatorCall>>,
    clipboard: Mutex<String>,
    pub should_fail: AtomicBool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actuator whose clipboard starts with `text`.
    pub fn with_clipboard(text: &str) -> Self {
        let actuator = Self::default();
        *actuator.clipboard.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
        actuator
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn fail_all(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: ActuatorCall) -> Result<(), ActuatorError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ActuatorError::Backend("recording actuator set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl InputActuator for RecordingActuator {
    async fn move_to(&self, x: i32, y: i32) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::MoveTo(x, y))
    }

    async fn move_by(&self, dx: i32, dy: i32) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::MoveBy(dx, dy))
    }

    async fn button(&self, button: MouseButton, pressed: bool) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::Button(button, pressed))
    }

    async fn scroll(&self, axis: ScrollAxis, ticks: i32) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::Scroll(axis, ticks))
    }

    async fn key(&self, key: KeyCode, pressed: bool) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::Key(key, pressed))
    }

    async fn type_text(&self, text: &str) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::TypeText(text.to_string()))
    }

    async fn read_clipboard(&self) -> Result<String, ActuatorError> {
        self.record(ActuatorCall::ReadClipboard)?;
        Ok(self.clipboard.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::WriteClipboard(text.to_string()))?;
        *self.clipboard.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_are_logged_in_order() {
        // Arrange
        let actuator = RecordingActuator::new();

        // Act
        actuator.key(KeyCode::ShiftLeft, true).await.unwrap();
        actuator.type_text("X").await.unwrap();
        actuator.key(KeyCode::ShiftLeft, false).await.unwrap();

        // Assert
        assert_eq!(
            actuator.calls(),
            vec![
                ActuatorCall::Key(KeyCode::ShiftLeft, true),
                ActuatorCall::TypeText("X".into()),
                ActuatorCall::Key(KeyCode::ShiftLeft, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_should_fail_returns_backend_error_but_still_logs() {
        let actuator = RecordingActuator::new();
        actuator.fail_all(true);
        let error = tokio_test::assert_err!(actuator.move_by(1, 1).await);
        assert!(matches!(error, ActuatorError::Backend(_)));
        assert_eq!(actuator.calls(), vec![ActuatorCall::MoveBy(1, 1)]);
    }

    #[tokio::test]
    async fn test_clipboard_write_then_read() {
        let actuator = RecordingActuator::with_clipboard("old");
        assert_eq!(actuator.read_clipboard().await.unwrap(), "old");
        tokio_test::assert_ok!(actuator.write_clipboard("new").await);
        assert_eq!(actuator.read_clipboard().await.unwrap(), "new");
    }
}
