//! Provider selection for the STRI pipeline.
//!
//! Every stage talks to one chat-completion backend. ASTRID speaks the
//! `OpenAI` wire format only; self-hosted servers that mimic it (vLLM,
//! Ollama, LM Studio) are reached through `ASTRID_PROVIDER=compatible` and
//! a base URL.

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Builds the provider named by `config.provider`.
///
/// `"openai"` targets the hosted API, or `OPENAI_BASE_URL` when set.
/// `"compatible"` requires a base URL, since there is no sensible default
/// endpoint for a self-hosted server.
///
/// # Errors
///
/// Returns [`AgentError::Config`] when `"compatible"` has no base URL, and
/// [`AgentError::UnsupportedProvider`] for any other name.
pub fn create_provider(config: &AgentConfig) -> Result<Box<dyn LlmProvider>, AgentError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config))),
        "compatible" if config.base_url.is_some() => Ok(Box::new(OpenAiProvider::new(config))),
        "compatible" => Err(AgentError::Config {
            message: "provider 'compatible' needs a base URL (OPENAI_BASE_URL or ASTRID_BASE_URL)"
                .to_string(),
        }),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, base_url: Option<&str>) -> AgentConfig {
        let mut builder = AgentConfig::builder().api_key("test").provider(provider);
        if let Some(url) = base_url {
            builder = builder.base_url(url);
        }
        builder.build().unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_openai_provider() {
        let provider = create_provider(&config("openai", None)).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_compatible_provider_needs_base_url() {
        assert!(matches!(
            create_provider(&config("compatible", None)),
            Err(AgentError::Config { .. })
        ));
        assert!(create_provider(&config("compatible", Some("http://localhost:11434/v1"))).is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        assert!(matches!(
            create_provider(&config("anthropic", None)),
            Err(AgentError::UnsupportedProvider { .. })
        ));
    }
}
