//! ADB command plumbing shared by the device helpers.

use std::process::Command;
use thiserror::Error;

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Unexpected command output: {0}")]
    UnexpectedOutput(String),
}

/// Get ADB command prefix with optional device specifier.
pub(crate) fn get_adb_prefix(device_id: Option<&str>) -> Vec<String> {
    match device_id {
        Some(id) => vec!["adb".to_string(), "-s".to_string(), id.to_string()],
        None => vec!["adb".to_string()],
    }
}

/// Run an `adb shell` command and capture its stdout.
pub(crate) fn adb_shell(device_id: Option<&str>, args: &[&str]) -> Result<String, AdbError> {
    let prefix = get_adb_prefix(device_id);
    let output = Command::new(&prefix[0])
        .args(&prefix[1..])
        .arg("shell")
        .args(args)
        .output()
        .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run an `adb exec-out` command and capture raw stdout bytes.
///
/// `exec-out` skips the pty layer, so binary payloads (screenshots, XML
/// dumps) arrive unmangled.
pub(crate) fn adb_exec_out(device_id: Option<&str>, args: &[&str]) -> Result<Vec<u8>, AdbError> {
    let prefix = get_adb_prefix(device_id);
    let output = Command::new(&prefix[0])
        .args(&prefix[1..])
        .arg("exec-out")
        .args(args)
        .output()
        .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

    Ok(output.stdout)
}

/// Check that the target device is connected and in the `device` state.
pub fn check_device(device_id: Option<&str>) -> Result<(), AdbError> {
    let output = Command::new("adb")
        .args(["devices"])
        .output()
        .map_err(|e| AdbError::CommandFailed(e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let available = stdout.lines().skip(1).any(|line| {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(id), Some("device")) => device_id.map(|want| want == id).unwrap_or(true),
            _ => false,
        }
    });

    if available {
        Ok(())
    } else {
        Err(AdbError::DeviceNotFound(
            device_id.unwrap_or("<any>").to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_adb_prefix() {
        let prefix = get_adb_prefix(None);
        assert_eq!(prefix, vec!["adb"]);

        let prefix_with_device = get_adb_prefix(Some("emulator-5554"));
        assert_eq!(prefix_with_device, vec!["adb", "-s", "emulator-5554"]);
    }
}
