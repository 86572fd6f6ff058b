//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default model for gate, classifier, extractor and synthesizer.
const DEFAULT_MODEL: &str = "gpt-4o";
/// Default model for the narrative stages.
const DEFAULT_ANSWER_MODEL: &str = "gpt-4.1";
/// Default max tokens for structured stages.
const DEFAULT_MAX_TOKENS: u32 = 2000;
/// Default max tokens for narrative stages.
const DEFAULT_ANSWER_MAX_TOKENS: u32 = 4096;
/// Default per-call timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Most recent year in the shipped dataset.
const DEFAULT_LATEST_YEAR: i32 = 2024;
/// Entries on each side of a summary ranking.
const DEFAULT_SUMMARY_TOP_N: usize = 4;

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for gate, classifier, extractor and synthesizer calls.
    pub model: String,
    /// Model for composer, definition, reforms and fusion calls.
    pub answer_model: String,
    /// Maximum tokens for structured stages.
    pub max_tokens: u32,
    /// Maximum tokens for narrative stages.
    pub answer_max_tokens: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Year used when a question names none.
    pub latest_year: i32,
    /// Entries on each side of a summary ranking.
    pub summary_top_n: usize,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for missing files.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    answer_model: Option<String>,
    max_tokens: Option<u32>,
    answer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    latest_year: Option<i32>,
    summary_top_n: Option<usize>,
    prompt_dir: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("ASTRID_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("ASTRID_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("ASTRID_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("ASTRID_MODEL").ok();
        }
        if self.answer_model.is_none() {
            self.answer_model = std::env::var("ASTRID_ANSWER_MODEL").ok();
        }
        if self.max_tokens.is_none() {
            self.max_tokens = env_parse("ASTRID_MAX_TOKENS");
        }
        if self.timeout.is_none() {
            self.timeout = env_parse("ASTRID_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.latest_year.is_none() {
            self.latest_year = env_parse("ASTRID_LATEST_YEAR");
        }
        if self.summary_top_n.is_none() {
            self.summary_top_n = env_parse("ASTRID_SUMMARY_TOP_N");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("ASTRID_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model for structured stages.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the model for narrative stages.
    #[must_use]
    pub fn answer_model(mut self, model: impl Into<String>) -> Self {
        self.answer_model = Some(model.into());
        self
    }

    /// Sets the max tokens for structured stages.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the max tokens for narrative stages.
    #[must_use]
    pub const fn answer_max_tokens(mut self, n: u32) -> Self {
        self.answer_max_tokens = Some(n);
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the default year.
    #[must_use]
    pub const fn latest_year(mut self, year: i32) -> Self {
        self.latest_year = Some(year);
        self
    }

    /// Sets the summary ranking length.
    #[must_use]
    pub const fn summary_top_n(mut self, n: usize) -> Self {
        self.summary_top_n = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::Config`] for a zero timeout or ranking length.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        if timeout.is_zero() {
            return Err(AgentError::Config {
                message: "timeout must be greater than zero".to_string(),
            });
        }
        let summary_top_n = self.summary_top_n.unwrap_or(DEFAULT_SUMMARY_TOP_N);
        if summary_top_n == 0 {
            return Err(AgentError::Config {
                message: "summary ranking length must be at least 1".to_string(),
            });
        }

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            answer_model: self
                .answer_model
                .unwrap_or_else(|| DEFAULT_ANSWER_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            answer_max_tokens: self.answer_max_tokens.unwrap_or(DEFAULT_ANSWER_MAX_TOKENS),
            timeout,
            latest_year: self.latest_year.unwrap_or(DEFAULT_LATEST_YEAR),
            summary_top_n,
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.answer_model, DEFAULT_ANSWER_MODEL);
        assert_eq!(config.latest_year, 2024);
        assert_eq!(config.summary_top_n, 4);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .model("gpt-4o-mini")
            .latest_year(2023)
            .summary_top_n(3)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.latest_year, 2023);
        assert_eq!(config.summary_top_n, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_rejects_zero_values() {
        let result = AgentConfig::builder()
            .api_key("key")
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(AgentError::Config { .. })));
        let result = AgentConfig::builder().api_key("key").summary_top_n(0).build();
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }
}
