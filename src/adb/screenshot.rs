//! Screenshot capture for the Android environment.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, RgbImage};
use std::io::Cursor;

use super::connection::adb_exec_out;

/// A captured screenshot, ready for model consumption.
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Base64-encoded PNG data.
    pub base64_data: String,
    pub width: u32,
    pub height: u32,
}

impl Screenshot {
    /// Create a new screenshot.
    pub fn new(base64_data: String, width: u32, height: u32) -> Self {
        Self {
            base64_data,
            width,
            height,
        }
    }

    /// Create a fallback black screenshot.
    pub fn fallback() -> Self {
        create_fallback_screenshot()
    }
}

/// Capture a screenshot from the connected Android device.
///
/// Uses `adb exec-out screencap -p` to stream the PNG to stdout, avoiding
/// disk I/O on both the device and host.
///
/// # Arguments
/// * `device_id` - Optional ADB device ID for multi-device setups.
///
/// # Note
/// If the capture fails (device gone, secure surface, truncated payload) a
/// black fallback image is returned so the run can continue.
pub fn get_screenshot(device_id: Option<&str>) -> Screenshot {
    let png_data = match adb_exec_out(device_id, &["screencap", "-p"]) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Screenshot command failed: {}", e);
            return create_fallback_screenshot();
        }
    };

    if png_data.len() < 8 || &png_data[0..8] != b"\x89PNG\r\n\x1a\n" {
        tracing::error!("Invalid screenshot payload ({} bytes)", png_data.len());
        return create_fallback_screenshot();
    }

    match image::load_from_memory(&png_data) {
        Ok(img) => {
            let width = img.width();
            let height = img.height();
            Screenshot::new(STANDARD.encode(&png_data), width, height)
        }
        Err(e) => {
            tracing::error!("Failed to parse screenshot image: {}", e);
            create_fallback_screenshot()
        }
    }
}

/// Create a black fallback image when screenshot capture fails.
fn create_fallback_screenshot() -> Screenshot {
    let default_width: u32 = 1080;
    let default_height: u32 = 2400;

    let black_img = RgbImage::from_fn(default_width, default_height, |_, _| {
        image::Rgb([0u8, 0u8, 0u8])
    });
    let dynamic_img = DynamicImage::ImageRgb8(black_img);

    let mut buffer = Cursor::new(Vec::new());
    let _ = dynamic_img.write_to(&mut buffer, image::ImageFormat::Png);
    let base64_data = STANDARD.encode(buffer.into_inner());

    Screenshot::new(base64_data, default_width, default_height)
}
