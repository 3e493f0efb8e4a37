//! ADB-backed implementation of the environment interface.

use std::thread;
use std::time::Duration;

use crate::actions::{DeviceAction, ScrollDirection};
use crate::adb::{
    check_device, dump_ui_elements, get_screenshot, home, swipe, tap, type_text, wake,
};

use super::{EnvError, EnvState, UiEnvironment};

/// Android device environment driven over ADB.
///
/// Keeps the most recent UI element sequence so index-based clicks can be
/// resolved to screen coordinates.
pub struct AndroidEnv {
    device_id: Option<String>,
    last_elements: Vec<super::UiElement>,
    screen_size: (u32, u32),
}

impl AndroidEnv {
    /// Create an environment for the default (only) connected device.
    pub fn new() -> Self {
        Self::with_device(None)
    }

    /// Create an environment bound to a specific ADB device ID.
    pub fn with_device(device_id: Option<String>) -> Self {
        Self {
            device_id,
            last_elements: Vec::new(),
            screen_size: (1080, 2400),
        }
    }

    fn device(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    fn capture_state(&mut self) -> Result<EnvState, EnvError> {
        let screenshot = get_screenshot(self.device());
        let ui_elements = dump_ui_elements(self.device())
            .map_err(|e| EnvError::StateCaptureFailed(e.to_string()))?;

        self.screen_size = (screenshot.width, screenshot.height);
        self.last_elements = ui_elements.clone();

        Ok(EnvState {
            screenshot,
            ui_elements,
        })
    }

    /// Endpoints of a mid-screen swipe producing the given scroll direction.
    fn scroll_gesture(&self, direction: ScrollDirection) -> ((i32, i32), (i32, i32)) {
        let (width, height) = self.screen_size;
        let (cx, cy) = (width as i32 / 2, height as i32 / 2);
        let dx = width as i32 / 4;
        let dy = height as i32 / 4;

        match direction {
            ScrollDirection::Down => ((cx, cy - dy), (cx, cy + dy)),
            ScrollDirection::Up => ((cx, cy + dy), (cx, cy - dy)),
            ScrollDirection::Right => ((cx - dx, cy), (cx + dx, cy)),
            ScrollDirection::Left => ((cx + dx, cy), (cx - dx, cy)),
        }
    }
}

impl Default for AndroidEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl UiEnvironment for AndroidEnv {
    fn reset(&mut self) -> Result<EnvState, EnvError> {
        check_device(self.device()).map_err(|e| EnvError::DeviceUnavailable(e.to_string()))?;

        wake(self.device()).map_err(|e| EnvError::ExecutionFailed(e.to_string()))?;
        home(self.device()).map_err(|e| EnvError::ExecutionFailed(e.to_string()))?;

        self.capture_state()
    }

    fn execute_action(&mut self, action: &DeviceAction) -> Result<Option<EnvState>, EnvError> {
        match action {
            DeviceAction::Click {
                index: Some(index), ..
            } => {
                let element = self.last_elements.get(*index).ok_or_else(|| {
                    EnvError::InvalidAction(format!(
                        "element index {} out of range ({} elements)",
                        index,
                        self.last_elements.len()
                    ))
                })?;
                let (x, y) = element.center().ok_or_else(|| {
                    EnvError::InvalidAction(format!("element {} has no bounds", index))
                })?;
                tap(x, y, self.device()).map_err(|e| EnvError::ExecutionFailed(e.to_string()))?;
            }
            DeviceAction::Click {
                x: Some(x),
                y: Some(y),
                ..
            } => {
                tap(*x, *y, self.device())
                    .map_err(|e| EnvError::ExecutionFailed(e.to_string()))?;
            }
            DeviceAction::Click { .. } => {
                return Err(EnvError::InvalidAction(
                    "click carries neither index nor coordinates".to_string(),
                ));
            }
            DeviceAction::Scroll { direction } => {
                let (start, end) = self.scroll_gesture(*direction);
                swipe(start.0, start.1, end.0, end.1, None, self.device())
                    .map_err(|e| EnvError::ExecutionFailed(e.to_string()))?;
            }
            DeviceAction::InputText { text } => {
                type_text(text, self.device())
                    .map_err(|e| EnvError::ExecutionFailed(e.to_string()))?;
            }
            DeviceAction::Wait => {
                thread::sleep(Duration::from_secs(1));
            }
        }

        // State capture is left to the caller via get_state.
        Ok(None)
    }

    fn get_state(&mut self) -> Result<EnvState, EnvError> {
        self.capture_state()
    }

    fn close(&mut self) {
        tracing::info!("Android environment closed");
    }
}
