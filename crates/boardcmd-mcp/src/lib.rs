use anyhow::Result;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{BufRead, Write};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const SERVER_ERROR: i64 = -32000;

/// Tool definition for tools/list
#[derive(Clone, Debug)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

impl ToolInfo {
    fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// Tool execution result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<CallToolResultContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallToolResultContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl CallToolResult {
    pub fn json(value: &Value) -> Self {
        Self {
            content: vec![CallToolResultContent::Text {
                text: value.to_string(),
            }],
            structured_content: Some(value.clone()),
            is_error: false,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            content: vec![CallToolResultContent::Text {
                text: message.to_string(),
            }],
            structured_content: None,
            is_error: true,
        }
    }

    /// Structured result whose error flag follows its `success` field.
    pub fn operation(value: &Value) -> Self {
        let mut result = Self::json(value);
        result.is_error = value.get("success") == Some(&Value::Bool(false));
        result
    }
}

/// Server identity reported by `initialize`.
#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

/// Answer one JSON-RPC request. Notifications (no id) get no response.
pub fn handle_request<F>(
    req: &Value,
    server: &ServerInfo,
    tools: &[ToolInfo],
    handler: &mut F,
) -> Option<Value>
where
    F: FnMut(&str, Option<Value>) -> Result<CallToolResult>,
{
    let id = req.get("id").cloned()?;
    let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
    debug!("MCP request {id}: {method}");

    let response = match method {
        "initialize" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {"name": server.name, "version": server.version},
                "capabilities": {"tools": {}, "logging": {}}
            }
        }),
        "ping" => json!({"jsonrpc": "2.0", "id": id, "result": {}}),
        "logging/setLevel" => json!({"jsonrpc": "2.0", "id": id, "result": {}}),
        "tools/list" => {
            let tool_list: Vec<_> = tools.iter().map(ToolInfo::to_json).collect();
            json!({"jsonrpc": "2.0", "id": id, "result": {"tools": tool_list}})
        }
        "tools/call" => {
            let params = req.get("params");
            let name = params.and_then(|p| p.get("name")).and_then(|v| v.as_str());
            let args = params.and_then(|p| p.get("arguments").cloned());

            match name {
                Some(name) => match handler(name, args) {
                    Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                    Err(e) => error_response(id, SERVER_ERROR, &format!("{e:#}")),
                },
                None => error_response(id, INVALID_PARAMS, "Missing tool name"),
            }
        }
        _ => error_response(id, METHOD_NOT_FOUND, "Method not found"),
    };

    Some(response)
}

/// Serve requests line by line from `input`, writing responses to `output`.
pub fn serve<R, W, F>(
    input: R,
    mut output: W,
    server: &ServerInfo,
    tools: &[ToolInfo],
    mut handler: F,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(&str, Option<Value>) -> Result<CallToolResult>,
{
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                trace!("Skipping unparsable line: {e}");
                continue;
            }
        };

        if let Some(response) = handle_request(&req, server, tools, &mut handler) {
            writeln!(output, "{response}")?;
            output.flush()?;
        }
    }

    Ok(())
}

/// Run MCP server on stdin/stdout
pub fn run_server<F>(server: &ServerInfo, tools: &[ToolInfo], handler: F) -> Result<()>
where
    F: FnMut(&str, Option<Value>) -> Result<CallToolResult>,
{
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(stdin.lock(), stdout.lock(), server, tools, handler)
}
