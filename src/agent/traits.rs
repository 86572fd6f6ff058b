//! Agent trait definition.
//!
//! Every capability call (gate, classifier, extractor, synthesizer,
//! composer, specialists) goes through this trait, which provides a uniform
//! interface and a per-call timeout for the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Default per-call timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all pipeline agents.
///
/// Agents encapsulate a specific role with a fixed system prompt and model
/// configuration. Stages call [`Agent::execute`] to run the agent against a
/// provider.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Upper bound on one provider call.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Executes the agent with the given user message.
    ///
    /// Builds a [`ChatRequest`] from the agent's configuration and
    /// delegates to the provider, bounded by [`Agent::timeout`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Timeout`] when the call exceeds the timeout,
    /// or the provider's error.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        let limit = self.timeout();
        let response: ChatResponse = tokio::time::timeout(limit, provider.chat(&request))
            .await
            .map_err(|_| AgentError::Timeout {
                stage: self.name(),
                secs: limit.as_secs(),
            })??;

        debug!(
            agent = self.name(),
            tokens = response.usage.total_tokens,
            finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
            "agent call complete"
        );

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}
