//! MCP server implementation for astrid-rs.
//!
//! Exposes the question-answering pipeline as an MCP tool and the loaded
//! dataset as read-only MCP resources.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult,
    PaginatedRequestParams, ProtocolVersion, RawResource, ReadResourceRequestParams,
    ReadResourceResult, ResourceContents, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, tool, tool_handler, tool_router};
use tracing::debug;

use crate::agent::orchestrator::Orchestrator;
use crate::core::vocab::{POLICY_AREAS, SECTORS};

use super::params::AskParams;

/// URI of the dataset overview resource.
pub const OVERVIEW_URI: &str = "astrid://dataset/overview";
/// URI of the vocabulary resource.
pub const VOCABULARY_URI: &str = "astrid://dataset/vocabulary";

/// ASTRID MCP server.
///
/// Holds one shared orchestrator; every tool call is an independent
/// invocation.
#[derive(Clone)]
pub struct AstridMcpServer {
    tool_router: ToolRouter<Self>,
    orchestrator: Arc<Orchestrator>,
}

#[tool_router]
impl AstridMcpServer {
    /// Answer a question about the STRI.
    #[tool(
        name = "ask",
        description = "Answer a natural-language question about the OECD Services Trade Restrictiveness Index (STRI): scores, comparisons, trends, definitions, country or sector summaries, and recorded reforms. Returns JSON with the narrative `message`, any `data`, a declarative `figure`, the `reforms_rows` used, the detected `intent`, and token and timing metadata."
    )]
    async fn ask(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        debug!(question_len = params.question.len(), "mcp ask");
        let answer = self.orchestrator.invoke(&params.question).await;
        let json = serde_json::to_string_pretty(&answer)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for AstridMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "astrid-rs".to_string(),
                title: Some("ASTRID STRI Assistant".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "ASTRID answers questions about the OECD Services Trade Restrictiveness \
                 Index. Use the `ask` tool with one question per call. Read the dataset \
                 overview resource to see which countries, sectors and years are loaded."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let mut overview = RawResource::new(OVERVIEW_URI, "Dataset overview".to_string());
        overview.description = Some(format!(
            "{} score rows: countries, sectors, years, policy areas and score range",
            self.orchestrator.scores().len()
        ));
        overview.mime_type = Some("application/json".to_string());

        let mut vocabulary =
            RawResource::new(VOCABULARY_URI, "Sector and policy area codes".to_string());
        vocabulary.description =
            Some("Codes and full names of the 22 sectors and 5 policy areas".to_string());
        vocabulary.mime_type = Some("application/json".to_string());

        Ok(ListResourcesResult {
            resources: vec![overview.no_annotation(), vocabulary.no_annotation()],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParams { uri, .. }: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let content = match uri.as_str() {
            OVERVIEW_URI => serde_json::to_string_pretty(&self.orchestrator.scores().overview()),
            VOCABULARY_URI => serde_json::to_string_pretty(&vocabulary_json()),
            _ => {
                return Err(McpError::resource_not_found(
                    format!("Unknown resource: {uri}. Expected {OVERVIEW_URI} or {VOCABULARY_URI}"),
                    None,
                ));
            }
        }
        .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(content, uri)],
        })
    }
}

fn pairs(table: &[(&str, &str)]) -> Vec<serde_json::Value> {
    table
        .iter()
        .map(|(code, name)| serde_json::json!({ "code": code, "name": name }))
        .collect()
}

fn vocabulary_json() -> serde_json::Value {
    serde_json::json!({
        "sectors": pairs(&SECTORS),
        "policy_areas": pairs(&POLICY_AREAS),
    })
}

impl AstridMcpServer {
    /// Creates a new MCP server around a shared orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            orchestrator,
        }
    }

    /// The shared orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_lists_every_code() {
        let value = vocabulary_json();
        assert_eq!(value["sectors"].as_array().map(Vec::len), Some(22));
        assert_eq!(value["policy_areas"].as_array().map(Vec::len), Some(5));
        assert!(
            value["sectors"]
                .as_array()
                .into_iter()
                .flatten()
                .all(|s| s["name"].as_str().is_some_and(|n| !n.is_empty()))
        );
    }
}
