//! MCP (Model Context Protocol) server implementation.
//!
//! This module provides:
//! - `eg mcp serve` - rmcp server on stdio
//! - `eg mcp manifest` - Tool definitions as JSON
//!
//! Every `EditService` operation is exposed as a tool. Tool results wrap
//! the operation's `EditResult` JSON in a text content block, with
//! `isError` set when the operation failed.

use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{
    ApproveRequest, CancelRequest, DeleteLinesRequest, EditResult, InsertAfterLineRequest,
    PathRequest, ReadLinesRequest, ReplaceInFileRequest, ReplaceLinesRequest,
};
use crate::service::EditService;
use crate::Error;

pub const SERVER_NAME: &str = "editgate";

const INSTRUCTIONS: &str = "Approval-gated file editing. Read a file with read_file_lines or \
get_version_token, plan a change with a prepare_* tool, review the returned diff, then apply \
it with approve_edit and the confirmation \"APPROVE\". Nothing is written before approval.";

/// MCP server exposing an `EditService`.
#[derive(Clone)]
pub struct EditGateMcp {
    service: Arc<EditService>,
    tool_router: ToolRouter<Self>,
}

impl EditGateMcp {
    pub fn new(service: Arc<EditService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    /// Run `f` on the blocking pool and wrap its envelope as a tool result.
    async fn call<T, F>(&self, f: F) -> std::result::Result<CallToolResult, McpError>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&EditService) -> EditResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let result = tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| McpError::internal_error(format!("tool task failed: {}", e), None))?;
        tool_result(&result)
    }
}

#[tool_router]
impl EditGateMcp {
    #[tool(description = "Plan replacing an inclusive line range. Returns a diff preview and an approval token; nothing is written until approve_edit.")]
    async fn prepare_replace_lines(
        &self,
        Parameters(req): Parameters<ReplaceLinesRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.prepare_replace_lines(req)).await
    }

    #[tool(description = "Plan inserting content after a line (0 inserts at the top). Returns a diff preview and an approval token.")]
    async fn prepare_insert_after_line(
        &self,
        Parameters(req): Parameters<InsertAfterLineRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.prepare_insert_after_line(req)).await
    }

    #[tool(description = "Plan deleting an inclusive line range. Returns a diff preview and an approval token.")]
    async fn prepare_delete_lines(
        &self,
        Parameters(req): Parameters<DeleteLinesRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.prepare_delete_lines(req)).await
    }

    #[tool(description = "Plan replacing every occurrence of a literal or regex pattern. Returns a diff preview, the match count and an approval token.")]
    async fn prepare_replace_in_file(
        &self,
        Parameters(req): Parameters<ReplaceInFileRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.prepare_replace_in_file(req)).await
    }

    #[tool(description = "Apply a prepared edit. confirmation must be exactly \"APPROVE\"; the file must still match the version the edit was planned against.")]
    async fn approve_edit(
        &self,
        Parameters(req): Parameters<ApproveRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.approve_edit(req)).await
    }

    #[tool(description = "Discard a prepared edit. Reports whether anything was removed.")]
    async fn cancel_edit(
        &self,
        Parameters(req): Parameters<CancelRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.cancel_edit(req)).await
    }

    #[tool(description = "List prepared edits that are still awaiting approval.")]
    async fn list_pending_edits(&self) -> std::result::Result<CallToolResult, McpError> {
        self.call(|svc| svc.list_pending_edits()).await
    }

    #[tool(description = "Get the current version token of a file, needed by every prepare_* tool.")]
    async fn get_version_token(
        &self,
        Parameters(req): Parameters<PathRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.get_version_token(req)).await
    }

    #[tool(description = "Read numbered lines of a file together with its version token.")]
    async fn read_file_lines(
        &self,
        Parameters(req): Parameters<ReadLinesRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.call(move |svc| svc.read_file_lines(req)).await
    }
}

#[tool_handler]
impl ServerHandler for EditGateMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_instructions(INSTRUCTIONS)
            .with_server_info(server_identity())
    }
}

fn server_identity() -> Implementation {
    let mut identity = Implementation::from_build_env();
    identity.name = SERVER_NAME.to_string();
    identity.version = env!("CARGO_PKG_VERSION").to_string();
    identity
}

fn tool_result<T: Serialize>(
    result: &EditResult<T>,
) -> std::result::Result<CallToolResult, McpError> {
    let text = serde_json::to_string(result)
        .map_err(|e| McpError::internal_error(format!("failed to encode result: {}", e), None))?;
    let content = vec![Content::text(text)];
    Ok(if result.success {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    })
}

/// The tool manifest printed by `eg mcp manifest`.
pub fn manifest() -> Value {
    json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "protocolVersion": ProtocolVersion::LATEST,
        "tools": EditGateMcp::tool_router().list_all(),
    })
}

/// Serve MCP on stdio until the client disconnects.
pub async fn serve(service: Arc<EditService>) -> crate::Result<()> {
    let running = EditGateMcp::new(service)
        .serve(stdio())
        .await
        .inspect_err(|e| error!(error = %e, "MCP server failed to start"))
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    info!("MCP server listening on stdio");

    let reason = running
        .waiting()
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    info!(?reason, "MCP server exiting");
    Ok(())
}
