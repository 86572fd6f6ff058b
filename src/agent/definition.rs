//! Definition specialist.
//!
//! Answers definition questions from the fixed knowledge base only. When no
//! entry matches, the fixed no-definition message is returned without a
//! model call.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::message::TokenUsage;
use super::prompt::build_definition_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::knowledge::{KnowledgeBase, NO_DEFINITION_MESSAGE};
use crate::error::AgentError;

/// Agent that answers definition questions.
pub struct DefinitionAgent {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    system_prompt: String,
}

impl DefinitionAgent {
    /// Creates a new definition agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.answer_model.clone(),
            max_tokens: config.answer_max_tokens,
            timeout: config.timeout,
            system_prompt,
        }
    }

    /// Defines the terms in `question`, plus any extracted `terms`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn define(
        &self,
        provider: &dyn LlmProvider,
        knowledge: &KnowledgeBase,
        question: &str,
        terms: &[String],
    ) -> Result<(String, TokenUsage), AgentError> {
        let probe = if terms.is_empty() {
            question.to_string()
        } else {
            format!("{question} {}", terms.join(" "))
        };
        let entries = knowledge.lookup(&probe);
        debug!(
            matched = entries.len(),
            terms = ?entries.iter().map(|e| e.term.as_str()).collect::<Vec<_>>(),
            "knowledge base lookup"
        );
        if entries.is_empty() {
            return Ok((NO_DEFINITION_MESSAGE.to_string(), TokenUsage::default()));
        }

        let response = self
            .execute(provider, &build_definition_prompt(question, &entries))
            .await?;
        let text = response.content.trim();
        let text = if text.is_empty() {
            NO_DEFINITION_MESSAGE
        } else {
            text
        };
        Ok((text.to_string(), response.usage))
    }
}

#[async_trait]
impl Agent for DefinitionAgent {
    fn name(&self) -> &'static str {
        "definition"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::ScriptedProvider;
    use crate::agent::prompt::DEFINITION_SYSTEM_PROMPT;

    fn agent() -> DefinitionAgent {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        DefinitionAgent::new(&config, DEFINITION_SYSTEM_PROMPT.to_string())
    }

    #[tokio::test]
    async fn test_defines_from_knowledge_base() {
        let provider = ScriptedProvider::new().route(
            "STRI expert",
            "The STRI measures restrictions on trade in services.",
        );
        let (text, usage) = agent()
            .define(&provider, &KnowledgeBase::standard(), "What is STRI?", &[])
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(text, "The STRI measures restrictions on trade in services.");
        assert!(usage.total_tokens > 0);
    }

    #[tokio::test]
    async fn test_unknown_term_skips_model() {
        let provider = ScriptedProvider::new();
        let (text, _) = agent()
            .define(
                &provider,
                &KnowledgeBase::standard(),
                "What is a quokka?",
                &["quokka".to_string()],
            )
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(text, NO_DEFINITION_MESSAGE);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_extracted_terms_widen_lookup() {
        let provider = ScriptedProvider::new().route("STRI expert", "Overall score.");
        let (text, _) = agent()
            .define(
                &provider,
                &KnowledgeBase::standard(),
                "What does that sentinel mean?",
                &["ALLSEC".to_string()],
            )
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(text, "Overall score.");
        assert_eq!(provider.calls_matching("STRI expert"), 1);
    }
}
