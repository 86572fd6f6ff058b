//! Chat session transcript.
//!
//! The transcript is owned by the chat loop and is append-only. The
//! pipeline never sees it: every question is answered on its own.

use crate::agent::message::{ChatMessage, Role, assistant_message, user_message};

/// Append-only log of the turns in one chat session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<ChatMessage>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Records a user question.
    pub fn push_user(&mut self, content: &str) {
        self.turns.push(user_message(content));
    }

    /// Records an assistant answer.
    pub fn push_assistant(&mut self, content: &str) {
        self.turns.push(assistant_message(content));
    }

    /// All turns in order.
    #[must_use]
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    /// The most recent question and the answer that followed it.
    #[must_use]
    pub fn last_exchange(&self) -> Option<(&str, &str)> {
        let answer_idx = self.turns.iter().rposition(|t| t.role == Role::Assistant)?;
        let question = self.turns[..answer_idx]
            .iter()
            .rev()
            .find(|t| t.role == Role::User)?;
        Some((&question.content, &self.turns[answer_idx].content))
    }

    /// Plain-text rendering of the transcript.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| {
                let who = match t.role {
                    Role::User => "you",
                    Role::Assistant => "astrid",
                    Role::System => "system",
                };
                format!("{who}> {}", t.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
