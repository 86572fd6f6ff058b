//! Compliance gate.
//!
//! Binary allow/deny decision taken before any other stage. The gate fails
//! closed: anything but an explicit allow verdict denies the question.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::message::TokenUsage;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::error::AgentError;

/// Refusal returned for denied questions.
pub const DENIED_MESSAGE: &str = "I’m sorry, but your query appears to be non-compliant with our \
    usage policies. Please ensure your question is related to the OECD STRI and does not contain \
    any inappropriate content.";

/// Agent that screens questions for policy violations.
pub struct GateAgent {
    model: String,
    timeout: Duration,
    system_prompt: String,
}

impl GateAgent {
    /// Creates a new gate agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            timeout: config.timeout,
            system_prompt,
        }
    }

    /// Returns `true` if the question may be processed.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the provider call fails.
    pub async fn check(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
    ) -> Result<(bool, TokenUsage), AgentError> {
        let response = self.execute(provider, question).await?;
        let allow = Self::parse_verdict(&response.content);
        debug!(allow, verdict = %response.content.trim(), "compliance verdict");
        Ok((allow, response.usage))
    }

    /// `1` allows; everything else denies.
    fn parse_verdict(content: &str) -> bool {
        content.trim() == "1"
    }
}

#[async_trait]
impl Agent for GateAgent {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        2
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
