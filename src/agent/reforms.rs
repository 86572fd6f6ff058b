//! Reforms specialist.
//!
//! Runs its own extraction pass with the reforms format, filters the reforms
//! table, and narrates only the matching records. Countries and years are
//! exact filters; the sector filter is relaxed when it would leave nothing.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::composer::finish;
use super::config::AgentConfig;
use super::extractor::ExtractorAgent;
use super::message::TokenUsage;
use super::prompt::{PromptSet, build_reforms_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::intent::IntentClass;
use crate::core::query::QueryScope;
use crate::core::table::{ReformsRow, ReformsTable};
use crate::core::vocab::ALLSEC;
use crate::error::AgentError;

/// Message returned when no reform matches.
pub const NO_REFORMS_MESSAGE: &str = "No recorded reforms match this query in the reforms database.";

/// Most records handed to the model in one prompt.
const MAX_PROMPT_ROWS: usize = 200;

/// Result of one reforms invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReformsOutcome {
    /// Narrative; never empty.
    pub message: String,
    /// Records the narrative is based on.
    pub rows: Vec<ReformsRow>,
    /// Tokens used by the extraction and narrative calls.
    #[serde(skip)]
    pub usage: TokenUsage,
}

/// Agent that answers reform questions from the reforms table.
pub struct ReformsAgent {
    model: String,
    max_tokens: u32,
    timeout: Duration,
    system_prompt: String,
    extractor: ExtractorAgent,
}

impl ReformsAgent {
    /// Creates a reforms agent from the configuration and prompt set.
    #[must_use]
    pub fn new(config: &AgentConfig, prompts: &PromptSet) -> Self {
        Self {
            model: config.answer_model.clone(),
            max_tokens: config.answer_max_tokens,
            timeout: config.timeout,
            system_prompt: prompts.reforms.clone(),
            extractor: ExtractorAgent::new(config, prompts, IntentClass::Reforms),
        }
    }

    /// Answers a reform question.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ExtractionMalformed`] when the reforms
    /// extraction fails, or the provider's error.
    pub async fn invoke(
        &self,
        provider: &dyn LlmProvider,
        table: &ReformsTable,
        question: &str,
    ) -> Result<ReformsOutcome, AgentError> {
        let (query, mut usage) = self
            .extractor
            .extract(provider, question, IntentClass::Reforms)
            .await?;
        let rows = select_reforms(table, &query.scope);
        debug!(matched = rows.len(), "reforms selected");
        if rows.is_empty() {
            return Ok(ReformsOutcome {
                message: NO_REFORMS_MESSAGE.to_string(),
                rows,
                usage,
            });
        }

        let shown = &rows[..rows.len().min(MAX_PROMPT_ROWS)];
        let response = self
            .execute(provider, &build_reforms_prompt(question, shown))
            .await?;
        usage.accumulate(response.usage);
        let message = finish(&response.content, None);
        let message = if message.is_empty() {
            NO_REFORMS_MESSAGE.to_string()
        } else {
            message
        };
        Ok(ReformsOutcome {
            message,
            rows,
            usage,
        })
    }
}

#[async_trait]
impl Agent for ReformsAgent {
    fn name(&self) -> &'static str {
        "reforms"
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

/// Filters reforms by scope, in table order.
#[must_use]
pub fn select_reforms(table: &ReformsTable, scope: &QueryScope) -> Vec<ReformsRow> {
    let base: Vec<&ReformsRow> = table
        .rows()
        .iter()
        .filter(|r| scope.countries.is_empty() || scope.countries.contains(&r.country))
        .filter(|r| scope.years.is_empty() || scope.years.contains(&r.year))
        .collect();

    let sectors: Vec<&String> = scope.sectors.iter().filter(|s| *s != ALLSEC).collect();
    if !sectors.is_empty() {
        let narrowed: Vec<ReformsRow> = base
            .iter()
            .filter(|r| sectors.contains(&&r.sector))
            .map(|r| (*r).clone())
            .collect();
        if !narrowed.is_empty() {
            return narrowed;
        }
        debug!("sector filter matched no reforms; dropped");
    }
    base.into_iter().cloned().collect()
}
