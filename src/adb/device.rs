//! Device input primitives for Android UI automation.

use std::thread;
use std::time::Duration;

use super::connection::{adb_shell, AdbError};

/// Default delay after each input event, giving the UI time to settle.
const DEFAULT_INPUT_DELAY_MS: u64 = 1000;

/// Tap at the specified coordinates.
///
/// # Arguments
/// * `x` - X coordinate.
/// * `y` - Y coordinate.
/// * `device_id` - Optional ADB device ID.
pub fn tap(x: i32, y: i32, device_id: Option<&str>) -> Result<(), AdbError> {
    adb_shell(
        device_id,
        &["input", "tap", &x.to_string(), &y.to_string()],
    )?;
    settle(None);
    Ok(())
}

/// Swipe from start to end coordinates.
///
/// Duration is derived from the swipe distance when not provided.
pub fn swipe(
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    duration_ms: Option<u64>,
    device_id: Option<&str>,
) -> Result<(), AdbError> {
    let duration = duration_ms.unwrap_or_else(|| {
        let dist_sq = ((start_x - end_x).pow(2) + (start_y - end_y).pow(2)) as u64;
        (dist_sq / 1000).clamp(300, 2000)
    });

    adb_shell(
        device_id,
        &[
            "input",
            "swipe",
            &start_x.to_string(),
            &start_y.to_string(),
            &end_x.to_string(),
            &end_y.to_string(),
            &duration.to_string(),
        ],
    )?;
    settle(None);
    Ok(())
}

/// Type text into the focused input field.
pub fn type_text(text: &str, device_id: Option<&str>) -> Result<(), AdbError> {
    let encoded = encode_input_text(text);
    adb_shell(device_id, &["input", "text", &encoded])?;
    settle(None);
    Ok(())
}

/// Encode text for `input text`: spaces become `%s`, shell metacharacters
/// are escaped.
fn encode_input_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' ' => "%s".to_string(),
            '"' | '\'' | '\\' | '`' | '$' => format!("\\{}", c),
            _ => c.to_string(),
        })
        .collect()
}

/// Press the home button.
pub fn home(device_id: Option<&str>) -> Result<(), AdbError> {
    adb_shell(device_id, &["input", "keyevent", "KEYCODE_HOME"])?;
    settle(None);
    Ok(())
}

/// Wake the screen if it is off.
pub fn wake(device_id: Option<&str>) -> Result<(), AdbError> {
    adb_shell(device_id, &["input", "keyevent", "KEYCODE_WAKEUP"])?;
    settle(Some(500));
    Ok(())
}

fn settle(delay_ms: Option<u64>) {
    thread::sleep(Duration::from_millis(delay_ms.unwrap_or(DEFAULT_INPUT_DELAY_MS)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_encoding() {
        assert_eq!(
            encode_input_text("hello world \"quoted\""),
            "hello%sworld%s\\\"quoted\\\""
        );
        assert_eq!(encode_input_text("plain"), "plain");
    }
}
