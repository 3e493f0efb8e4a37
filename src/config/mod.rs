//! Configuration module for the QA agent.

mod prompts;

pub use prompts::{
    planner_system_prompt, supervisor_prompt, verifier_prompt, PLANNER_SYSTEM_PROMPT,
};
