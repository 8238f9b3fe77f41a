//! Actuator that logs instead of injecting input.
//!
//! The default backend of the `padlink-server` binary.  It tracks a virtual
//! pointer position and an in-memory clipboard so the full protocol (copy
//! round-trips included) works end to end on a machine without an OS
//! automation backend.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};

use padlink_core::{KeyCode, MouseButton};

use crate::application::{ActuatorError, InputActuator, ScrollAxis};

#[derive(Debug, Default)]
pub struct TracingActuator {
    pointer: Mutex<(i32, i32)>,
    clipboard: Mutex<String>,
}

impl TracingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> (i32, i32) {
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InputActuator for TracingActuator {
    async fn move_to(&self, x: i32, y: i32) -> Result<(), ActuatorError> {
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner) = (x, y);
        debug!(x, y, "pointer moved to");
        Ok(())
    }

    async fn move_by(&self, dx: i32, dy: i32) -> Result<(), ActuatorError> {
        let mut pointer = self.pointer.lock().unwrap_or_else(PoisonError::into_inner);
        pointer.0 = pointer.0.saturating_add(dx);
        pointer.1 = pointer.1.saturating_add(dy);
        debug!(dx, dy, x = pointer.0, y = pointer.1, "pointer moved by");
        Ok(())
    }

    async fn button(&self, button: MouseButton, pressed: bool) -> Result<(), ActuatorError> {
        info!(?button, pressed, "button");
        Ok(())
    }

    async fn scroll(&self, axis: ScrollAxis, ticks: i32) -> Result<(), ActuatorError> {
        debug!(?axis, ticks, "scroll");
        Ok(())
    }

    async fn key(&self, key: KeyCode, pressed: bool) -> Result<(), ActuatorError> {
        info!(key = key.name(), pressed, "key");
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), ActuatorError> {
        // Length only; typed text may be a password.
        info!(chars = text.chars().count(), "type text");
        Ok(())
    }

    async fn read_clipboard(&self) -> Result<String, ActuatorError> {
        Ok(self.clipboard.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), ActuatorError> {
        info!(chars = text.chars().count(), "clipboard written");
        *self.clipboard.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
        Ok(())
    }
}
