//! High-level agent actions and the call grammar the planner model emits.
//!
//! The planner answers with a single call such as `click("wifi toggle")`,
//! `swipe(100, 100, 100, 300)`, `type("hello")`, `wait(2)` or `done()`.
//! This module parses those calls into [`AgentAction`] values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::device::ScrollDirection;

/// Action parsing errors.
#[derive(Error, Debug)]
pub enum ActionParseError {
    #[error("Not an action call: {0}")]
    NotACall(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid arguments for {0}: {1}")]
    InvalidArguments(&'static str, String),
}

/// Target of a click action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClickTarget {
    /// Absolute pixel coordinates.
    Coordinates { x: i32, y: i32 },
    /// Free-text description matched against on-screen elements.
    Description(String),
}

/// An abstract action proposed by the planning collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Click {
        target: ClickTarget,
    },
    Swipe {
        start: (i32, i32),
        end: (i32, i32),
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    Scroll {
        direction: ScrollDirection,
    },
    Type {
        text: String,
    },
    Wait {
        seconds: f64,
    },
    /// Terminal marker: the goal is complete and the loop should stop.
    Done,
}

impl AgentAction {
    /// Whether this action is the terminal marker.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

static CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^\s*(\w+)\s*\((.*)\)\s*$").unwrap());

/// Parse a single action call into an [`AgentAction`].
pub fn parse_action(input: &str) -> Result<AgentAction, ActionParseError> {
    let captures = CALL_RE
        .captures(input)
        .ok_or_else(|| ActionParseError::NotACall(input.trim().to_string()))?;

    let name = captures[1].to_lowercase();
    let args = split_args(&captures[2]);

    match name.as_str() {
        "click" | "tap" => parse_click(&args),
        "swipe" => parse_swipe(&args),
        "scroll" => parse_scroll(&args),
        "type" | "input" => parse_type(&args),
        "wait" => parse_wait(&args),
        "done" | "finish" => Ok(AgentAction::Done),
        _ => Err(ActionParseError::UnknownAction(name)),
    }
}

/// One parsed argument: a quoted string or a number.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Text(String),
    Number(f64),
}

impl Arg {
    fn as_i32(&self) -> Option<i32> {
        match self {
            Arg::Number(n) => Some(*n as i32),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Split a call's argument list on commas outside of quotes.
///
/// Quoted tokens stay text even when they look numeric.
fn split_args(raw: &str) -> Vec<Arg> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;
    let mut escaped = false;

    for c in raw.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => {
                in_quotes = !in_quotes;
                was_quoted = true;
            }
            ',' if !in_quotes => {
                push_arg(&mut args, &current, was_quoted, raw);
                current.clear();
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    push_arg(&mut args, &current, was_quoted, raw);

    args
}

fn push_arg(args: &mut Vec<Arg>, token: &str, was_quoted: bool, raw: &str) {
    let trimmed = token.trim();
    if trimmed.is_empty() && !was_quoted && args.is_empty() && !raw.contains(',') {
        return; // empty argument list
    }
    if was_quoted {
        args.push(Arg::Text(trimmed.to_string()));
    } else if let Ok(number) = trimmed.parse::<f64>() {
        args.push(Arg::Number(number));
    } else {
        args.push(Arg::Text(trimmed.to_string()));
    }
}

fn parse_click(args: &[Arg]) -> Result<AgentAction, ActionParseError> {
    match args {
        [Arg::Text(description)] => Ok(AgentAction::Click {
            target: ClickTarget::Description(description.clone()),
        }),
        [a, b] => {
            let (x, y) = match (a.as_i32(), b.as_i32()) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    return Err(ActionParseError::InvalidArguments(
                        "click",
                        format!("{:?}", args),
                    ))
                }
            };
            Ok(AgentAction::Click {
                target: ClickTarget::Coordinates { x, y },
            })
        }
        _ => Err(ActionParseError::InvalidArguments(
            "click",
            format!("{:?}", args),
        )),
    }
}

fn parse_swipe(args: &[Arg]) -> Result<AgentAction, ActionParseError> {
    if args.len() != 4 && args.len() != 5 {
        return Err(ActionParseError::InvalidArguments(
            "swipe",
            format!("expected 4 or 5 arguments, got {}", args.len()),
        ));
    }

    let coords: Vec<i32> = args[..4].iter().filter_map(Arg::as_i32).collect();
    if coords.len() != 4 {
        return Err(ActionParseError::InvalidArguments(
            "swipe",
            format!("{:?}", args),
        ));
    }

    let duration_ms = args.get(4).and_then(Arg::as_i32).map(|d| d as u64);

    Ok(AgentAction::Swipe {
        start: (coords[0], coords[1]),
        end: (coords[2], coords[3]),
        duration_ms,
    })
}

fn parse_scroll(args: &[Arg]) -> Result<AgentAction, ActionParseError> {
    let direction = args
        .first()
        .and_then(Arg::as_text)
        .and_then(ScrollDirection::parse)
        .ok_or_else(|| ActionParseError::InvalidArguments("scroll", format!("{:?}", args)))?;
    Ok(AgentAction::Scroll { direction })
}

fn parse_type(args: &[Arg]) -> Result<AgentAction, ActionParseError> {
    let text = args
        .first()
        .and_then(Arg::as_text)
        .ok_or_else(|| ActionParseError::InvalidArguments("type", format!("{:?}", args)))?;
    Ok(AgentAction::Type {
        text: text.to_string(),
    })
}

fn parse_wait(args: &[Arg]) -> Result<AgentAction, ActionParseError> {
    let seconds = match args {
        [] => 1.0,
        [Arg::Number(n)] => *n,
        _ => {
            return Err(ActionParseError::InvalidArguments(
                "wait",
                format!("{:?}", args),
            ))
        }
    };
    Ok(AgentAction::Wait { seconds })
}
