//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. Every pipeline stage reaches the model
//! through this seam, so tests substitute scripted providers here.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, system_message, user_message};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer (HTTP, SDK calls) for a
/// specific provider while presenting a uniform interface to stages.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Single-turn completion: one system and one user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        max_tokens: Option<u32>,
    ) -> Result<ChatResponse, AgentError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![system_message(system), user_message(user)],
            temperature: None,
            max_tokens,
            json_mode: false,
        };
        self.chat(&request).await
    }
}
