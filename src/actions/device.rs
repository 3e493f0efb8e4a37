//! Concrete device actions consumed by the environment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scroll direction, named by the dominant displacement axis of the gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Parse a named direction, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        };
        write!(f, "{}", name)
    }
}

/// The wire form of an action as the device environment executes it.
///
/// Serializes with an `action_type` tag, e.g.
/// `{"action_type":"click","index":3}` or
/// `{"action_type":"scroll","direction":"down"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum DeviceAction {
    Click {
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
    },
    Scroll {
        direction: ScrollDirection,
    },
    InputText {
        text: String,
    },
    Wait,
}

impl DeviceAction {
    /// Click the UI element at the given index of the element sequence.
    pub fn click_index(index: usize) -> Self {
        Self::Click {
            index: Some(index),
            x: None,
            y: None,
        }
    }

    /// Click at absolute pixel coordinates.
    pub fn click_at(x: i32, y: i32) -> Self {
        Self::Click {
            index: None,
            x: Some(x),
            y: Some(y),
        }
    }
}
