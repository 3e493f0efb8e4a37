//! Model client module for AI inference.

mod client;
mod judge;

pub use client::{
    MessageBuilder, ModelClient, ModelConfig, ModelError, ModelResponse, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY_SECS,
};
pub use judge::{Judge, JudgmentRequest};
