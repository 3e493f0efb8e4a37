//! Translation from abstract agent actions to concrete device actions.

use crate::env::UiElement;

use super::device::{DeviceAction, ScrollDirection};
use super::parser::{AgentAction, ClickTarget};

/// Outcome of translating one agent action.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// A concrete device action, ready to execute.
    Device(DeviceAction),
    /// A descriptive reference matched no element; the carried wait is a
    /// behavior-compatible no-op, tagged so callers can tell it apart from
    /// a deliberate wait.
    Unresolved(DeviceAction),
    /// The terminal marker.
    Terminal,
}

impl Translation {
    /// The device action to execute, if any.
    pub fn device_action(&self) -> Option<&DeviceAction> {
        match self {
            Translation::Device(action) | Translation::Unresolved(action) => Some(action),
            Translation::Terminal => None,
        }
    }
}

/// Maps high-level action calls to the device action representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionTranslator;

impl ActionTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Translate one agent action against the current UI element sequence.
    pub fn translate(&self, action: &AgentAction, ui_elements: &[UiElement]) -> Translation {
        match action {
            AgentAction::Click { target } => self.translate_click(target, ui_elements),
            AgentAction::Swipe { start, end, .. } => Translation::Device(DeviceAction::Scroll {
                direction: swipe_direction(*start, *end),
            }),
            AgentAction::Scroll { direction } => Translation::Device(DeviceAction::Scroll {
                direction: *direction,
            }),
            AgentAction::Type { text } => Translation::Device(DeviceAction::InputText {
                text: text.clone(),
            }),
            AgentAction::Wait { .. } => Translation::Device(DeviceAction::Wait),
            AgentAction::Done => Translation::Terminal,
        }
    }

    fn translate_click(&self, target: &ClickTarget, ui_elements: &[UiElement]) -> Translation {
        match target {
            ClickTarget::Coordinates { x, y } => {
                Translation::Device(DeviceAction::click_at(*x, *y))
            }
            ClickTarget::Description(description) => {
                let keywords: Vec<&str> = description.split_whitespace().collect();

                match ui_elements
                    .iter()
                    .position(|element| element.matches_keywords(&keywords))
                {
                    Some(index) => Translation::Device(DeviceAction::click_index(index)),
                    None => {
                        tracing::warn!(
                            "No UI element matches click description '{}', degrading to wait",
                            description
                        );
                        Translation::Unresolved(DeviceAction::Wait)
                    }
                }
            }
        }
    }
}

/// Derive the scroll direction from a swipe gesture.
///
/// The axis with the larger absolute displacement wins; its sign picks the
/// direction.
fn swipe_direction(start: (i32, i32), end: (i32, i32)) -> ScrollDirection {
    let delta_x = end.0 - start.0;
    let delta_y = end.1 - start.1;

    if delta_y.abs() > delta_x.abs() {
        if delta_y > 0 {
            ScrollDirection::Down
        } else {
            ScrollDirection::Up
        }
    } else if delta_x > 0 {
        ScrollDirection::Right
    } else {
        ScrollDirection::Left
    }
}
