//! LLM-backed question answering over the STRI tables.
//!
//! Every model interaction is a small single-purpose [`Agent`] behind the
//! pluggable [`LlmProvider`] abstraction. The [`Orchestrator`] chains them
//! into branches chosen by the question's intent.
//!
//! # Architecture
//!
//! ```text
//! Question → Orchestrator
//!   ├── GateAgent (allow / deny)
//!   ├── ClassifierAgent → IntentClass
//!   ├── general | score | graphical | comparative
//!   │   └── ExtractorAgent → SynthesizerAgent → Executor → ComposerAgent
//!   ├── definition
//!   │   └── ExtractorAgent → KnowledgeBase → DefinitionAgent
//!   ├── reforms
//!   │   └── ReformsAgent (own extraction, table filter, narrative)
//!   ├── summary
//!   │   ├── quantitative chain ┐ concurrently
//!   │   ├── ReformsAgent       ┘
//!   │   └── FusionAgent → final answer
//!   └── unrelated → fixed message
//! ```
//!
//! Generated programs are JSON documents interpreted by the [`Executor`];
//! nothing the model writes is ever run as code.

pub mod classifier;
pub mod client;
pub mod composer;
pub mod config;
pub mod definition;
pub mod executor;
pub mod extractor;
pub mod gate;
pub mod message;
pub mod orchestrator;
pub mod program;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reforms;
pub mod synthesizer;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

// Re-export key types
pub use classifier::ClassifierAgent;
pub use client::create_provider;
pub use composer::{ComposerAgent, FusionAgent};
pub use config::AgentConfig;
pub use definition::DefinitionAgent;
pub use executor::{Charting, DeclarativeCharts, Executor};
pub use extractor::ExtractorAgent;
pub use gate::{DENIED_MESSAGE, GateAgent};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{Orchestrator, UNRELATED_MESSAGE};
pub use program::Program;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use reforms::{NO_REFORMS_MESSAGE, ReformsAgent, ReformsOutcome};
pub use synthesizer::SynthesizerAgent;
pub use traits::Agent;
