//! Intent classifier.
//!
//! Maps a question to one [`IntentClass`]. The mapping from verdict text to
//! class lives in [`IntentClass::parse_verdict`], so classification is
//! deterministic for a given provider response.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::message::TokenUsage;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::intent::IntentClass;
use crate::error::AgentError;

/// Agent that classifies question intent.
pub struct ClassifierAgent {
    model: String,
    timeout: Duration,
    system_prompt: String,
}

impl ClassifierAgent {
    /// Creates a new classifier agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            timeout: config.timeout,
            system_prompt,
        }
    }

    /// Classifies a question. Malformed verdicts classify as
    /// [`IntentClass::Unrelated`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the provider call fails.
    pub async fn classify(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
    ) -> Result<(IntentClass, TokenUsage), AgentError> {
        let response = self.execute(provider, question).await?;
        let intent = IntentClass::parse_verdict(&response.content);
        debug!(%intent, verdict = %response.content.trim(), "question classified");
        Ok((intent, response.usage))
    }
}

#[async_trait]
impl Agent for ClassifierAgent {
    fn name(&self) -> &'static str {
        "classifier"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        8
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
