use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::tools::{tools_call, tools_list, CallToolRequest};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

// JSON-RPC error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// MCP Protocol Types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub fn initialize() -> InitializeResult {
    InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        },
        server_info: ServerInfo {
            name: "benos".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    }
}

async fn handle_rpc_request(
    context: &ToolContext,
    method: &str,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    match method {
        "initialize" => to_result(initialize()),
        "ping" => Ok(json!({})),
        "tools/list" => to_result(tools_list()),
        "tools/call" => {
            let params =
                params.ok_or_else(|| RpcError::new(INVALID_PARAMS, "tools/call requires params"))?;
            let request: CallToolRequest = serde_json::from_value(params)
                .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;
            to_result(tools_call(context, request).await)
        }
        _ => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("Unknown method: {}", method),
        )),
    }
}

fn to_result<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
}

fn error_message(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// Handle one line of newline-delimited JSON-RPC. Notifications produce no reply.
pub async fn handle_line(context: &ToolContext, line: &str) -> Option<Value> {
    let message: Value = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            return Some(error_message(
                Value::Null,
                RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
            ))
        }
    };

    let id = message.get("id").cloned();
    let Some(method) = message.get("method").and_then(Value::as_str) else {
        return Some(error_message(
            id.unwrap_or(Value::Null),
            RpcError::new(INVALID_REQUEST, "Request has no method"),
        ));
    };

    let id = match id {
        Some(id) if !method.starts_with("notifications/") => id,
        _ => {
            debug!(method = %method, "Ignoring notification");
            return None;
        }
    };

    let params = message.get("params").cloned();
    let response = match handle_rpc_request(context, method, params).await {
        Ok(result) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        }),
        Err(error) => error_message(id, error),
    };
    Some(response)
}
