//! JSON-RPC 2.0 envelope types shared by the Tendermint, EVM-HTTP, and
//! WebSocket adaptors, and by the fan-out engine's authority check.
//!
//! Request IDs are carried as opaque `serde_json::Value` end to end — the
//! spec's mandated "defensive variant" (see DESIGN.md Open Question #2):
//! the original source's WebSocket stub used an integer-only ID field,
//! which silently corrupts string or null IDs. This type never does that.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

fn default_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Standard error codes used across adaptors (spec §6).
pub const INVALID_REQUEST: i64 = -32600;
pub const INVALID_PARAMS: i64 = -32602;
pub const PARSE_ERROR: i64 = -32700;

/// Loosely-typed view of an upstream's JSON-RPC response, used only to
/// decide fan-out authority (spec §4.4): "non-null `result` and no `error`".
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcEnvelope {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl JsonRpcEnvelope {
    pub fn is_authoritative(&self) -> bool {
        self.error.is_none() && matches!(self.result, Some(ref r) if !r.is_null())
    }
}
