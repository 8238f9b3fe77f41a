//! Semantic input intents produced by the touch client.

use serde::{Deserialize, Serialize};

/// Pointer button addressed by a click intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Maps the number of fingers lifted in a tap to the button it clicks.
    ///
    /// Returns `None` for zero or more than three fingers.
    pub fn from_tap_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(MouseButton::Left),
            2 => Some(MouseButton::Right),
            3 => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// Direction of a three-finger swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    /// Picks the direction from an accumulated displacement.
    ///
    /// The axis with the larger magnitude wins; ties go to the horizontal axis.
    pub fn from_displacement(dx: f64, dy: f64) -> Self {
        if dx.abs() >= dy.abs() {
            if dx < 0.0 {
                SwipeDirection::Left
            } else {
                SwipeDirection::Right
            }
        } else if dy < 0.0 {
            SwipeDirection::Up
        } else {
            SwipeDirection::Down
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
        }
    }
}

/// One semantic action.
///
/// Intents are produced by the gesture engine or the combo buffer on the
/// client, serialised onto the wire, and consumed exactly once by the host's
/// dispatcher.  Coordinates are relative pixel deltas; scroll deltas follow
/// the host convention (positive `dy` scrolls down, positive `dx` scrolls right).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Intent {
    Move { dx: f64, dy: f64 },
    Scroll { dx: f64, dy: f64 },
    Zoom { delta: f64 },
    Click { button: MouseButton, pressed: bool },
    Swipe { direction: SwipeDirection },
    Key { name: String },
    Text { value: String },
    Combo { keys: Vec<String> },
}

impl Intent {
    /// Short tag for log lines; never includes field values.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Move { .. } => "move",
            Intent::Scroll { .. } => "scroll",
            Intent::Zoom { .. } => "zoom",
            Intent::Click { .. } => "click",
            Intent::Swipe { .. } => "swipe",
            Intent::Key { .. } => "key",
            Intent::Text { .. } => "text",
            Intent::Combo { .. } => "combo",
        }
    }
}

/// Rounds to one decimal place, the resolution used for emitted deltas.
pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tap_count_maps_one_two_three_fingers() {
        assert_eq!(MouseButton::from_tap_count(1), Some(MouseButton::Left));
        assert_eq!(MouseButton::from_tap_count(2), Some(MouseButton::Right));
        assert_eq!(MouseButton::from_tap_count(3), Some(MouseButton::Middle));
        assert_eq!(MouseButton::from_tap_count(0), None);
        assert_eq!(MouseButton::from_tap_count(4), None);
    }

    #[test]
    fn test_swipe_direction_uses_dominant_axis_and_sign() {
        assert_eq!(SwipeDirection::from_displacement(-90.0, 10.0), SwipeDirection::Left);
        assert_eq!(SwipeDirection::from_displacement(90.0, -10.0), SwipeDirection::Right);
        assert_eq!(SwipeDirection::from_displacement(5.0, -85.0), SwipeDirection::Up);
        assert_eq!(SwipeDirection::from_displacement(-5.0, 85.0), SwipeDirection::Down);
    }

    #[test]
    fn test_intent_serializes_with_lowercase_type_tag() {
        // Arrange
        let intent = Intent::Click {
            button: MouseButton::Right,
            pressed: true,
        };

        // Act
        let json = serde_json::to_value(&intent).unwrap();

        // Assert
        assert_eq!(json["type"], "click");
        assert_eq!(json["button"], "right");
        assert_eq!(json["pressed"], true);
    }

    #[test]
    fn test_round_tenth_rounds_half_away_from_zero() {
        assert_eq!(round_tenth(1.25), 1.3);
        assert_eq!(round_tenth(-1.25), -1.3);
        assert_eq!(round_tenth(0.04), 0.0);
    }
}
