//! # astrid-rs
//!
//! ASTRID: a conversational analytics assistant over the OECD Services
//! Trade Restrictiveness Index (STRI).
//!
//! A question passes a compliance gate, is classified into one intent, and
//! is answered by the branch for that intent: generated query programs over
//! the score table, the fixed knowledge base, the reforms table, or a fused
//! summary of the quantitative and qualitative halves.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use astrid_rs::agent::{AgentConfig, Orchestrator, create_provider};
//! use astrid_rs::core::{ReformsTable, ScoreTable};
//!
//! # async fn run() -> astrid_rs::Result<()> {
//! let config = AgentConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let scores = ScoreTable::load("data/stri.csv".as_ref(), 1.0)?;
//! let orchestrator = Orchestrator::new(
//!     Arc::from(provider),
//!     config,
//!     Arc::new(scores),
//!     Arc::new(ReformsTable::default()),
//! );
//! let answer = orchestrator.invoke("What is STRI?").await;
//! assert!(!answer.message.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;

#[cfg(feature = "mcp")]
pub mod mcp;

pub use error::{Error, Result};
