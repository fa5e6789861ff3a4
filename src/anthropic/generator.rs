use async_trait::async_trait;
use tracing::{debug, warn};

use super::client::MessageSender;
use super::types::{Message, MessagesRequest};
use crate::content::ContentType;
use crate::error::GenerationError;
use crate::generation::TextGenerator;

const SYSTEM_PROMPT: &str = "You are an expert instructional designer. \
Write accurate, well-structured educational material in markdown. \
Use headings for every section and never add commentary outside the material.";

/// [`TextGenerator`] backed by the Anthropic Messages API.
pub struct AnthropicGenerator<S> {
    sender: S,
    model: String,
}

impl<S: MessageSender> AnthropicGenerator<S> {
    pub fn new(sender: S, model: impl Into<String>) -> Self {
        Self {
            sender,
            model: model.into(),
        }
    }
}

#[async_trait]
impl<S: MessageSender> TextGenerator for AnthropicGenerator<S> {
    async fn generate(
        &self,
        prompt: &str,
        content_type: ContentType,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let req = MessagesRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![Message {
                role: "user".into(),
                content: prompt.to_string(),
            }],
        };

        let response = self.sender.send_message(&req).await?;
        debug!(
            content_type = %content_type,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "generation call finished"
        );
        if response.is_truncated() {
            warn!(content_type = %content_type, max_tokens, "response hit the token budget");
        }

        let text = response.text();
        if text.trim().is_empty() {
            return Err(GenerationError::Retryable("empty response".into()));
        }
        Ok(text)
    }
}
