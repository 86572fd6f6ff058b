//! Orchestrator for the question-answering pipeline.
//!
//! Coordinates the full flow: compliance gate → classification → branch
//! dispatch. Generic branches run extraction → synthesis → execution →
//! composition; summaries run that quantitative chain and the reforms
//! specialist concurrently, then fuse both halves.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::classifier::ClassifierAgent;
use super::composer::{ComposerAgent, FusionAgent, render_facts};
use super::config::AgentConfig;
use super::definition::DefinitionAgent;
use super::executor::Executor;
use super::extractor::ExtractorAgent;
use super::gate::{DENIED_MESSAGE, GateAgent};
use super::message::TokenUsage;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::reforms::ReformsAgent;
use super::synthesizer::SynthesizerAgent;
use crate::core::envelope::{FusedAnswer, ResultEnvelope};
use crate::core::intent::IntentClass;
use crate::core::knowledge::KnowledgeBase;
use crate::core::query::QueryKind;
use crate::core::table::{ReformsTable, ScoreTable};
use crate::error::AgentError;

/// Maximum accepted question length in bytes.
const MAX_QUERY_LEN: usize = 10_000;

/// Answer for questions that are not about the STRI.
pub const UNRELATED_MESSAGE: &str = "I’m sorry, this doesn’t look like a question about the \
    OECD STRI. Could you rephrase your question about services trade restrictiveness?";

/// Prefix of answers produced from a pipeline error.
pub const ERROR_PREFIX: &str = "An error occurred while processing your query:";

/// Output of the quantitative chain.
struct Quantitative {
    envelope: ResultEnvelope,
    narrative: String,
    usage: TokenUsage,
}

/// Orchestrates the question-answering workflow.
///
/// Owns the provider, configuration, prompts and the read-only tables.
/// [`Orchestrator::invoke`] is the single entry point and never fails.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    prompts: PromptSet,
    scores: Arc<ScoreTable>,
    reforms: Arc<ReformsTable>,
    knowledge: KnowledgeBase,
}

impl Orchestrator {
    /// Creates a new orchestrator over the given tables.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`AgentConfig::prompt_dir`], falling back to compiled-in defaults.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: AgentConfig,
        scores: Arc<ScoreTable>,
        reforms: Arc<ReformsTable>,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            config,
            prompts,
            scores,
            reforms,
            knowledge: KnowledgeBase::standard(),
        }
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the knowledge base.
    #[must_use]
    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// The score table questions are answered from.
    #[must_use]
    pub fn scores(&self) -> &ScoreTable {
        &self.scores
    }

    /// Answers one question.
    ///
    /// Every failure is converted into an answer carrying the error
    /// message; token usage and elapsed time cover all calls made.
    pub async fn invoke(&self, question: &str) -> FusedAnswer {
        let started = Instant::now();
        let mut usage = TokenUsage::default();

        let mut answer = match self.run(question, &mut usage).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "query failed");
                FusedAnswer::from_message(format!("{ERROR_PREFIX} {e}"))
            }
        };
        answer.total_tokens = usage.total_tokens;
        answer.elapsed = started.elapsed();

        info!(
            intent = answer.intent.map(|i| i.as_str()),
            tokens = answer.total_tokens,
            elapsed_ms = answer.elapsed.as_millis(),
            has_data = answer.data.is_some(),
            has_figure = answer.figure.is_some(),
            reforms = answer.reforms_rows.len(),
            "query answered"
        );
        answer
    }

    async fn run(&self, question: &str, usage: &mut TokenUsage) -> Result<FusedAnswer, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::Orchestration {
                message: "query is empty".to_string(),
            });
        }
        if question.len() > MAX_QUERY_LEN {
            return Err(AgentError::Orchestration {
                message: format!(
                    "query too long ({} bytes, max {MAX_QUERY_LEN})",
                    question.len()
                ),
            });
        }

        let gate = GateAgent::new(&self.config, self.prompts.gate.clone());
        let (allow, gate_usage) = gate.check(&*self.provider, question).await?;
        usage.accumulate(gate_usage);
        if !allow {
            info!("question denied by compliance gate");
            return Ok(FusedAnswer::from_message(DENIED_MESSAGE));
        }

        let classifier = ClassifierAgent::new(&self.config, self.prompts.classifier.clone());
        let (intent, class_usage) = classifier.classify(&*self.provider, question).await?;
        usage.accumulate(class_usage);
        info!(%intent, "question classified");

        let answer = match intent {
            IntentClass::Unrelated => FusedAnswer::from_message(UNRELATED_MESSAGE),
            IntentClass::Definition => self.definition(question, usage).await?,
            IntentClass::Reforms => self.reforms(question, usage).await?,
            IntentClass::Summary => self.summary(question, usage).await?,
            IntentClass::General
            | IntentClass::Score
            | IntentClass::Graphical
            | IntentClass::Comparative => {
                let quant = self.quantitative(question, intent).await?;
                usage.accumulate(quant.usage);
                FusedAnswer::from_envelope(quant.envelope, quant.narrative)
            }
        };
        Ok(answer.with_intent(intent))
    }

    /// Extraction → synthesis → execution → composition.
    async fn quantitative(
        &self,
        question: &str,
        intent: IntentClass,
    ) -> Result<Quantitative, AgentError> {
        let provider = &*self.provider;

        let extractor = ExtractorAgent::new(&self.config, &self.prompts, intent);
        let (query, mut usage) = extractor.extract(provider, question, intent).await?;

        let synthesizer = SynthesizerAgent::new(&self.config, self.prompts.coder.clone());
        let (source, synth_usage) = synthesizer.synthesize(provider, &query).await?;
        usage.accumulate(synth_usage);

        let envelope = Executor::new(&self.scores)
            .with_default_top_n(self.config.summary_top_n)
            .execute(&source);

        let composer = ComposerAgent::new(&self.config, self.prompts.answer.clone());
        let (narrative, compose_usage) = composer.compose(provider, question, &envelope).await?;
        usage.accumulate(compose_usage);

        Ok(Quantitative {
            envelope,
            narrative,
            usage,
        })
    }

    async fn definition(
        &self,
        question: &str,
        usage: &mut TokenUsage,
    ) -> Result<FusedAnswer, AgentError> {
        let extractor = ExtractorAgent::new(&self.config, &self.prompts, IntentClass::Definition);
        let (query, extract_usage) = extractor
            .extract(&*self.provider, question, IntentClass::Definition)
            .await?;
        usage.accumulate(extract_usage);
        let terms = match query.kind {
            QueryKind::Definition { terms } => terms,
            _ => Vec::new(),
        };

        let agent = DefinitionAgent::new(&self.config, self.prompts.definition.clone());
        let (message, define_usage) = agent
            .define(&*self.provider, &self.knowledge, question, &terms)
            .await?;
        usage.accumulate(define_usage);
        Ok(FusedAnswer::from_message(message))
    }

    async fn reforms(
        &self,
        question: &str,
        usage: &mut TokenUsage,
    ) -> Result<FusedAnswer, AgentError> {
        let agent = ReformsAgent::new(&self.config, &self.prompts);
        let outcome = agent.invoke(&*self.provider, &self.reforms, question).await?;
        usage.accumulate(outcome.usage);
        Ok(FusedAnswer {
            reforms_rows: outcome.rows,
            ..FusedAnswer::from_message(outcome.message)
        })
    }

    /// Runs both halves concurrently; a failing half is reported as
    /// unavailable to the fusion step.
    async fn summary(
        &self,
        question: &str,
        usage: &mut TokenUsage,
    ) -> Result<FusedAnswer, AgentError> {
        let reforms_agent = ReformsAgent::new(&self.config, &self.prompts);
        let (quant, qual) = tokio::join!(
            self.quantitative(question, IntentClass::Summary),
            reforms_agent.invoke(&*self.provider, &self.reforms, question),
        );

        let quant = match quant {
            Ok(quant) => {
                usage.accumulate(quant.usage);
                Some(quant)
            }
            Err(e) => {
                warn!(error = %e, "quantitative half of summary failed");
                None
            }
        };
        let qual = match qual {
            Ok(outcome) => {
                usage.accumulate(outcome.usage);
                Some(outcome)
            }
            Err(e) => {
                warn!(error = %e, "reforms half of summary failed");
                None
            }
        };
        if quant.is_none() && qual.is_none() {
            return Err(AgentError::Orchestration {
                message: "both halves of the summary failed".to_string(),
            });
        }
        debug!(
            quantitative = quant.is_some(),
            qualitative = qual.is_some(),
            "summary halves joined"
        );

        let quantitative_text = quant.as_ref().map(|q| {
            if q.envelope.has_content() {
                format!("{}\n\n{}", render_facts(&q.envelope), q.narrative)
            } else {
                q.narrative.clone()
            }
        });
        let fusion = FusionAgent::new(&self.config, self.prompts.fusion.clone());
        let (message, fusion_usage) = fusion
            .fuse(
                &*self.provider,
                question,
                quantitative_text.as_deref(),
                qual.as_ref().map(|o| o.message.as_str()),
                quant.as_ref().and_then(|q| q.envelope.data.as_ref()),
            )
            .await?;
        usage.accumulate(fusion_usage);

        let mut answer = match quant {
            Some(quant) => FusedAnswer::from_envelope(quant.envelope, message),
            None => FusedAnswer::from_message(message),
        };
        answer.reforms_rows = qual.map(|o| o.rows).unwrap_or_default();
        Ok(answer)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("score_rows", &self.scores.len())
            .field("reform_rows", &self.reforms.len())
            .finish_non_exhaustive()
    }
}
