//! Environment collaborator seam for UI test runs.
//!
//! The orchestrator drives a [`UiEnvironment`] through a fixed interface:
//! reset, execute an action, read the current state, close. State exposes a
//! rendered screenshot and the ordered UI element sequence; the agents never
//! look deeper than that.

mod android;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::DeviceAction;
use crate::adb::Screenshot;

pub use android::AndroidEnv;

/// Environment errors.
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Device not available: {0}")]
    DeviceUnavailable(String),
    #[error("Failed to capture UI state: {0}")]
    StateCaptureFailed(String),
    #[error("Action cannot be executed: {0}")]
    InvalidAction(String),
    #[error("Action execution failed: {0}")]
    ExecutionFailed(String),
}

/// A single element of the on-screen UI hierarchy.
///
/// Read-only once captured; used for text matching and verification
/// prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    /// Visible text, if any.
    pub text: Option<String>,
    /// Accessibility content description.
    pub content_description: Option<String>,
    /// Android resource identifier.
    pub resource_id: Option<String>,
    /// Widget class name (e.g. `android.widget.Switch`).
    pub class_name: Option<String>,
    /// Checked state for toggles, if reported.
    pub checked: Option<bool>,
    /// Screen bounds as (left, top, right, bottom).
    pub bounds: Option<(i32, i32, i32, i32)>,
}

impl UiElement {
    /// Combined lowercase blob of text, content description, and resource id.
    fn text_blob(&self) -> String {
        let mut blob = String::new();
        for part in [&self.text, &self.content_description, &self.resource_id] {
            if let Some(value) = part {
                if !blob.is_empty() {
                    blob.push(' ');
                }
                blob.push_str(&value.to_lowercase());
            }
        }
        blob
    }

    /// Check whether every keyword occurs in the element's combined text.
    ///
    /// Keywords are matched case-insensitively. An empty keyword list
    /// matches any element.
    pub fn matches_keywords(&self, keywords: &[&str]) -> bool {
        let blob = self.text_blob();
        keywords
            .iter()
            .all(|keyword| blob.contains(&keyword.to_lowercase()))
    }

    /// Center point of the element's bounds, if known.
    pub fn center(&self) -> Option<(i32, i32)> {
        self.bounds
            .map(|(left, top, right, bottom)| ((left + right) / 2, (top + bottom) / 2))
    }
}

impl fmt::Display for UiElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(text) = &self.text {
            if !text.is_empty() {
                parts.push(format!("text=\"{}\"", text));
            }
        }
        if let Some(desc) = &self.content_description {
            if !desc.is_empty() {
                parts.push(format!("desc=\"{}\"", desc));
            }
        }
        if let Some(id) = &self.resource_id {
            if !id.is_empty() {
                parts.push(format!("id=\"{}\"", id));
            }
        }
        if let Some(class) = &self.class_name {
            if !class.is_empty() {
                parts.push(format!("class=\"{}\"", class));
            }
        }
        if let Some(checked) = self.checked {
            parts.push(format!("checked={}", checked));
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Raw device state as returned by the environment.
#[derive(Debug, Clone)]
pub struct EnvState {
    pub screenshot: Screenshot,
    pub ui_elements: Vec<UiElement>,
}

/// What the agents see each step: a rendered snapshot plus the ordered UI
/// element sequence. Immutable once captured; replaced wholesale per step.
#[derive(Debug, Clone)]
pub struct Observation {
    pub screenshot: Screenshot,
    pub ui_elements: Vec<UiElement>,
}

impl Observation {
    /// Render the UI elements as one descriptive line each, for prompts.
    pub fn describe_elements(&self) -> String {
        self.ui_elements
            .iter()
            .map(|element| format!("- {}", element))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<EnvState> for Observation {
    fn from(state: EnvState) -> Self {
        Self {
            screenshot: state.screenshot,
            ui_elements: state.ui_elements,
        }
    }
}

/// Environment lifecycle interface.
///
/// Calls are blocking; the run loop is strictly sequential, so a hanging
/// environment stalls the whole run.
pub trait UiEnvironment: Send {
    /// Bring the device to a known initial state and return it.
    fn reset(&mut self) -> Result<EnvState, EnvError>;

    /// Execute a concrete device action.
    ///
    /// Returns the post-action state when the environment captures one as a
    /// side effect, or `None` when the caller should fetch it via
    /// [`UiEnvironment::get_state`].
    fn execute_action(&mut self, action: &DeviceAction) -> Result<Option<EnvState>, EnvError>;

    /// Capture the current device state.
    fn get_state(&mut self) -> Result<EnvState, EnvError>;

    /// Release the environment.
    fn close(&mut self);
}
