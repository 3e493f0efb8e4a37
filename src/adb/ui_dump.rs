//! UI hierarchy dump via `uiautomator`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::connection::{adb_exec_out, AdbError};
use crate::env::UiElement;

static NODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<node\b[^>]*>").unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([\w-]+)="([^"]*)""#).unwrap());
static BOUNDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").unwrap());

/// Dump the current UI hierarchy and parse it into elements.
///
/// Streams the XML to stdout via `/dev/tty` so no file round-trip through
/// the device filesystem is needed.
pub fn dump_ui_elements(device_id: Option<&str>) -> Result<Vec<UiElement>, AdbError> {
    let raw = adb_exec_out(device_id, &["uiautomator", "dump", "/dev/tty"])?;
    let xml = String::from_utf8_lossy(&raw);

    if !xml.contains("<node") {
        return Err(AdbError::UnexpectedOutput(
            xml.chars().take(200).collect::<String>(),
        ));
    }

    Ok(parse_ui_dump(&xml))
}

/// Parse a uiautomator XML dump into the ordered UI element sequence.
///
/// Element order follows document order, which matches what the on-device
/// accessibility tree reports.
pub fn parse_ui_dump(xml: &str) -> Vec<UiElement> {
    NODE_RE
        .find_iter(xml)
        .map(|node| parse_node(node.as_str()))
        .collect()
}

fn parse_node(node: &str) -> UiElement {
    let mut element = UiElement::default();

    for capture in ATTR_RE.captures_iter(node) {
        let value = unescape_xml(&capture[2]);
        match &capture[1] {
            "text" => element.text = non_empty(value),
            "content-desc" => element.content_description = non_empty(value),
            "resource-id" => element.resource_id = non_empty(value),
            "class" => element.class_name = non_empty(value),
            "checked" => element.checked = value.parse().ok(),
            "bounds" => {
                element.bounds = BOUNDS_RE.captures(&value).and_then(|b| {
                    Some((
                        b[1].parse().ok()?,
                        b[2].parse().ok()?,
                        b[3].parse().ok()?,
                        b[4].parse().ok()?,
                    ))
                });
            }
            _ => {}
        }
    }

    element
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
