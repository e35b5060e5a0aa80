//! Gateway-wrapped AI operations.

use crate::client::gateway::{Gateway, GatewayError};
use crate::platform::{
    ChatMessage, ChatOptions, ChatPrompt, ChatResponse, ContentPart, ImageInput, MessageContent,
};

/// Model requested for resume feedback.
pub const FEEDBACK_MODEL: &str = "claude-sonnet-4";

#[derive(Clone)]
pub struct InferenceClient {
    gateway: Gateway,
}

impl InferenceClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn chat(
        &self,
        prompt: ChatPrompt,
        options: Option<ChatOptions>,
    ) -> Result<ChatResponse, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.ai().chat(prompt, options).await })
            .await
    }

    /// Asks the model about a stored file: one user message carrying the file
    /// reference followed by the instructions.
    pub async fn feedback(&self, path: &str, message: &str) -> Result<ChatResponse, GatewayError> {
        self.chat(feedback_prompt(path, message), Some(feedback_options()))
            .await
    }

    pub async fn img2txt(&self, image: ImageInput) -> Result<String, GatewayError> {
        self.gateway
            .invoke(|p| async move { p.ai().img2txt(image).await })
            .await
    }
}

fn feedback_prompt(path: &str, message: &str) -> ChatPrompt {
    ChatPrompt::Messages(vec![ChatMessage::user(MessageContent::Parts(vec![
        ContentPart::File {
            puter_path: path.to_string(),
        },
        ContentPart::Text {
            text: message.to_string(),
        },
    ]))])
}

fn feedback_options() -> ChatOptions {
    ChatOptions {
        model: Some(FEEDBACK_MODEL.to_string()),
    }
}
