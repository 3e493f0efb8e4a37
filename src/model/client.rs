//! Model client for AI inference using OpenAI-compatible API.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

/// Configuration for the AI model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub extra_body: HashMap<String, Value>,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "gpt-4-turbo".to_string(),
            max_tokens: 2000,
            temperature: 0.0,
            top_p: 0.85,
            extra_body: HashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl ModelConfig {
    /// Create a new ModelConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new ModelConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Create a new ModelConfig with custom model name.
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    ///
    /// Judgment calls (verification) use 0 so a verdict is attempted exactly
    /// once per step.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }
}

/// Response from the AI model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub thinking: String,
    pub answer: String,
    pub raw_content: String,
}

/// OpenAI API response structures.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

/// Client for interacting with OpenAI-compatible vision-language models.
pub struct ModelClient {
    config: ModelConfig,
    client: Client,
}

impl ModelClient {
    /// Create a new ModelClient with the given configuration.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create a new ModelClient with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ModelConfig::default())
    }

    /// Send a request to the model.
    ///
    /// # Arguments
    /// * `messages` - List of message dictionaries in OpenAI format.
    ///
    /// # Returns
    /// ModelResponse containing thinking and answer parts.
    pub async fn request(&self, messages: &[Value]) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut body = json!({
            "messages": messages,
            "model": self.config.model_name,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
        });

        // Merge extra_body
        if let Value::Object(ref mut map) = body {
            for (key, value) in &self.config.extra_body {
                map.insert(key.clone(), value.clone());
            }
        }

        let mut last_error: Option<ModelError> = None;
        let max_attempts = self.config.max_retries + 1; // +1 for the initial attempt

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &body).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let is_retryable = Self::is_retryable_error(&e);

                    if attempt < max_attempts && is_retryable {
                        tracing::warn!(
                            "Request failed (attempt {}/{}): {}. Retrying in {}s",
                            attempt,
                            max_attempts,
                            e,
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                        last_error = Some(e);
                    } else if !is_retryable {
                        // Non-retryable error, return immediately
                        return Err(e);
                    } else {
                        last_error = Some(e);
                    }
                }
            }
        }

        if self.config.max_retries == 0 {
            // Single-attempt mode: surface the original error unchanged.
            return Err(
                last_error.unwrap_or_else(|| ModelError::ApiError("Unknown error".to_string()))
            );
        }

        Err(ModelError::MaxRetriesExceeded(
            self.config.max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    /// Check if an error is retryable (network errors, timeouts, etc.)
    fn is_retryable_error(error: &ModelError) -> bool {
        match error {
            ModelError::RequestFailed(_) => true, // Network errors are retryable
            ModelError::ApiError(msg) => {
                // Retry on server errors (5xx) or rate limits (429)
                msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("timeout")
                    || msg.to_lowercase().contains("rate limit")
            }
            ModelError::ParseError(_) => false, // Parse errors are not retryable
            ModelError::MaxRetriesExceeded(_, _) => false,
        }
    }

    /// Send a single request to the API.
    async fn send_request(&self, url: &str, body: &Value) -> Result<ModelResponse, ModelError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(error_text));
        }

        let completion: ChatCompletionResponse = response.json().await?;

        if completion.choices.is_empty() {
            return Err(ModelError::ParseError("No choices in response".to_string()));
        }

        let raw_content = &completion.choices[0].message.content;
        let (thinking, answer) = Self::parse_response(raw_content);

        Ok(ModelResponse {
            thinking,
            answer,
            raw_content: raw_content.clone(),
        })
    }

    /// Parse the model response into thinking and answer parts.
    ///
    /// Content without an `<answer>` tag is returned whole as the answer.
    pub(crate) fn parse_response(content: &str) -> (String, String) {
        if !content.contains("<answer>") {
            return (String::new(), content.to_string());
        }

        let parts: Vec<&str> = content.splitn(2, "<answer>").collect();
        let thinking = parts[0]
            .replace("<think>", "")
            .replace("</think>", "")
            .trim()
            .to_string();
        let answer = parts
            .get(1)
            .map(|s| s.replace("</answer>", "").trim().to_string())
            .unwrap_or_default();

        (thinking, answer)
    }
}

/// Helper class for building conversation messages.
pub struct MessageBuilder;

impl MessageBuilder {
    /// Create a system message.
    pub fn create_system_message(content: &str) -> Value {
        json!({
            "role": "system",
            "content": content
        })
    }

    /// Create a user message with optional image.
    ///
    /// # Arguments
    /// * `text` - Text content.
    /// * `image_base64` - Optional base64-encoded PNG image.
    pub fn create_user_message(text: &str, image_base64: Option<&str>) -> Value {
        match image_base64 {
            Some(img) => Self::create_user_message_with_images(text, std::slice::from_ref(&img)),
            None => Self::create_user_message_with_images::<&str>(text, &[]),
        }
    }

    /// Create a user message carrying several image attachments.
    ///
    /// Images are listed before the text block, mirroring the order the
    /// OpenAI vision API expects.
    pub fn create_user_message_with_images<S: AsRef<str>>(text: &str, images: &[S]) -> Value {
        let mut content = Vec::new();

        for img_data in images {
            content.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/png;base64,{}", img_data.as_ref())
                }
            }));
        }

        content.push(json!({
            "type": "text",
            "text": text
        }));

        json!({
            "role": "user",
            "content": content
        })
    }

    /// Create an assistant message.
    pub fn create_assistant_message(content: &str) -> Value {
        json!({
            "role": "assistant",
            "content": content
        })
    }

    /// Remove image content from a message to save context space.
    pub fn remove_images_from_message(message: &mut Value) {
        if let Some(content) = message.get_mut("content") {
            if let Value::Array(arr) = content {
                arr.retain(|item| {
                    item.get("type")
                        .and_then(|t| t.as_str())
                        .map(|t| t == "text")
                        .unwrap_or(false)
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_model_config_builder() {
        let config = ModelConfig::default()
            .with_base_url("https://api.example.com/v1")
            .with_model_name("gpt-4-vision-preview")
            .with_max_retries(0);
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.model_name, "gpt-4-vision-preview");
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_parse_response() {
        let content = "<think>The toggle looks off</think><answer>subtask: open settings\naction: click(\"settings icon\")</answer>";
        let (thinking, answer) = ModelClient::parse_response(content);
        assert_eq!(thinking, "The toggle looks off");
        assert_eq!(
            answer,
            "subtask: open settings\naction: click(\"settings icon\")"
        );
    }

    #[test]
    fn test_parse_response_no_answer() {
        let content = "some raw content";
        let (thinking, answer) = ModelClient::parse_response(content);
        assert_eq!(thinking, "");
        assert_eq!(answer, "some raw content");
    }

    #[test]
    fn test_message_builder() {
        let system_msg = MessageBuilder::create_system_message("You are a QA verifier");
        assert_eq!(system_msg["role"], "system");

        let user_msg = MessageBuilder::create_user_message("Hello", None);
        assert_eq!(user_msg["role"], "user");
        assert_eq!(user_msg["content"][0]["type"], "text");

        let with_images =
            MessageBuilder::create_user_message_with_images("Look at these", &["aaa", "bbb"]);
        assert_eq!(with_images["content"][0]["type"], "image_url");
        assert_eq!(with_images["content"][1]["type"], "image_url");
        assert_eq!(with_images["content"][2]["type"], "text");
    }

    #[test]
    fn test_remove_images() {
        let mut msg = MessageBuilder::create_user_message("text", Some("imgdata"));
        MessageBuilder::remove_images_from_message(&mut msg);
        let content = msg["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
    }
}
