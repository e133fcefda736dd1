//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the upstream content generation
//! model. It implements the `ContentGenerationService` port from the `core`
//! crate against an OpenAI-compatible chat-completion endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use regex::Regex;

use trashtalk_core::ports::{ContentGenerationService, PortError, PortResult};

/// Generation parameters tuned for short, chaotic output.
const TEMPERATURE: f32 = 0.9;
const MAX_OUTPUT_TOKENS: u32 = 300;

/// Posts are tweets; anything longer gets cut at a character boundary.
const MAX_POST_CHARS: usize = 280;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerationService` using an
/// OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Models love to wrap tweets in quotes or code fences; strip that
    /// framing and enforce the length cap.
    fn clean_output(text: &str) -> String {
        let fence = Regex::new(r"^```[a-z]*\n?|\n?```$").unwrap();
        let unfenced = fence.replace_all(text.trim(), "");

        let mut cleaned = unfenced.trim();
        if cleaned.len() >= 2 && cleaned.starts_with('"') && cleaned.ends_with('"') {
            cleaned = &cleaned[1..cleaned.len() - 1];
        }
        let cleaned = cleaned.trim();

        match cleaned.char_indices().nth(MAX_POST_CHARS) {
            Some((byte_index, _)) => cleaned[..byte_index].trim_end().to_string(),
            None => cleaned.to_string(),
        }
    }
}

//=========================================================================================
// `ContentGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerationService for OpenAiGenerationAdapter {
    async fn complete(&self, prompt: &str) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()])
            .temperature(TEMPERATURE)
            .max_completion_tokens(MAX_OUTPUT_TOKENS)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        // The gateway treats empty text as a failure; pass it through as-is
        // rather than inventing content here.
        Ok(Self::clean_output(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_output_strips_wrapping_quotes() {
        assert_eq!(
            OpenAiGenerationAdapter::clean_output("\"me: chaos\""),
            "me: chaos"
        );
    }

    #[test]
    fn clean_output_strips_code_fences() {
        assert_eq!(
            OpenAiGenerationAdapter::clean_output("```\nme: chaos\n```"),
            "me: chaos"
        );
    }

    #[test]
    fn clean_output_preserves_interior_quotes_and_linebreaks() {
        let text = "me: \"adulting\"\nalso me: not adulting";
        assert_eq!(OpenAiGenerationAdapter::clean_output(text), text);
    }

    #[test]
    fn clean_output_enforces_the_280_char_cap() {
        let long = "a".repeat(500);
        assert_eq!(OpenAiGenerationAdapter::clean_output(&long).chars().count(), 280);
    }

    #[test]
    fn clean_output_cuts_on_char_boundaries() {
        let long = "é".repeat(500);
        let cleaned = OpenAiGenerationAdapter::clean_output(&long);
        assert_eq!(cleaned.chars().count(), 280);
    }
}
