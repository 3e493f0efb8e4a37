//! Judgment-request seam for the Verifier and Supervisor.
//!
//! A `Judge` is a stateless prompt-in, text-out function: each call builds
//! its message list from scratch, so no conversational state carries over
//! between judgments.

use async_trait::async_trait;

use super::client::{MessageBuilder, ModelClient, ModelError};

/// A single judgment request: one prompt plus optional image attachments.
#[derive(Debug, Clone, Default)]
pub struct JudgmentRequest {
    /// The full prompt text.
    pub prompt: String,
    /// Base64-encoded PNG attachments, in presentation order.
    pub images_base64: Vec<String>,
}

impl JudgmentRequest {
    /// Create a text-only judgment request.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images_base64: Vec::new(),
        }
    }

    /// Attach base64-encoded PNG images to the request.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images_base64 = images;
        self
    }
}

/// Language-model collaborator interface.
///
/// Returns raw text with no schema enforcement; callers parse defensively.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, request: JudgmentRequest) -> Result<String, ModelError>;
}

#[async_trait]
impl Judge for ModelClient {
    async fn judge(&self, request: JudgmentRequest) -> Result<String, ModelError> {
        let message = MessageBuilder::create_user_message_with_images(
            &request.prompt,
            &request.images_base64,
        );
        let response = self.request(&[message]).await?;
        Ok(response.raw_content)
    }
}
