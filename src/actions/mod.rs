//! Action model: the planner's abstract actions, the device wire form, and
//! the translation between them.

mod device;
mod parser;
mod translator;

pub use device::{DeviceAction, ScrollDirection};
pub use parser::{parse_action, ActionParseError, AgentAction, ClickTarget};
pub use translator::{ActionTranslator, Translation};
