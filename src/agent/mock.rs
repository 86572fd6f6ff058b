//! Scripted provider for pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, Role, TokenUsage};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Tokens reported for every scripted call.
pub const TOKENS_PER_CALL: u32 = 10;

/// Provider answering from a script keyed by system-prompt content.
///
/// The first route whose needle occurs in the system message wins. Calls
/// with no matching route fail with [`AgentError::ApiRequest`].
pub struct ScriptedProvider {
    routes: Vec<(String, String)>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, needle: &str, response: &str) -> Self {
        self.routes.push((needle.to_string(), response.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls whose system prompt contained `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.log
            .lock()
            .map(|log| log.iter().filter(|s| s.contains(needle)).count())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if let Ok(mut log) = self.log.lock() {
            log.push(system.clone());
        }

        self.routes
            .iter()
            .find(|(needle, _)| system.contains(needle.as_str()))
            .map(|(_, response)| ChatResponse {
                content: response.clone(),
                usage: TokenUsage {
                    prompt_tokens: TOKENS_PER_CALL / 2,
                    completion_tokens: TOKENS_PER_CALL / 2,
                    total_tokens: TOKENS_PER_CALL,
                },
                finish_reason: Some("stop".to_string()),
            })
            .ok_or_else(|| AgentError::ApiRequest {
                message: "no scripted response".to_string(),
                status: Some(500),
            })
    }
}
