//! ADB (Android Debug Bridge) module for device interaction.

mod connection;
mod device;
mod screenshot;
mod ui_dump;

pub use connection::{check_device, AdbError};
pub use device::{home, swipe, tap, type_text, wake};
pub use screenshot::{get_screenshot, Screenshot};
pub use ui_dump::{dump_ui_elements, parse_ui_dump};
