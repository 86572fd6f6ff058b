//! MCP tool parameter types.
//!
//! Defines the input schemas for MCP tools using `schemars` for automatic
//! JSON Schema generation required by the MCP protocol.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ask` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// A natural-language question about the OECD Services Trade
    /// Restrictiveness Index.
    pub question: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_params_schema_names_question() {
        let schema = serde_json::to_value(schemars::schema_for!(AskParams))
            .unwrap_or_else(|_| unreachable!());
        assert!(schema["properties"]["question"].is_object());
        assert_eq!(schema["required"][0], "question");
    }
}
