//! EVM JSON-RPC/HTTP adaptor (spec §4.5.3). POST-only; classifies `method`
//! into one of four height-source families, parses the selector at the
//! indicated parameter position, then either routes directly or falls back
//! to fan-out for hash-addressed methods.
//!
//! Grounded on the original source's JSON-RPC proxy handler, adjusted to the
//! spec's "most defensive variant" (see DESIGN.md Open Question #2):
//! raw-JSON IDs end to end, and explicit `blockHash` objects always force
//! fan-out rather than being silently coerced to a number.

use crate::height::{parse_evm_selector, HeightSelector};
use crate::jsonrpc::{JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, PARSE_ERROR};
use crate::proxy::context::{full_body, BoxBody};
use crate::proxy::{fanout, forward};
use crate::registry::NodeKind;
use crate::server::GatewayState;
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde_json::Value;

pub(crate) enum Family {
    Param(usize),
    Fanout,
    Unsupported,
    Latest,
}

pub(crate) fn classify(method: &str) -> Family {
    match method {
        "eth_getBlockByNumber"
        | "eth_getBlockTransactionCountByNumber"
        | "eth_getTransactionByBlockNumberAndIndex"
        | "eth_getUncleByBlockNumberAndIndex" => Family::Param(0),

        "eth_getBalance" | "eth_getTransactionCount" | "eth_getCode" | "eth_call" => {
            Family::Param(1)
        }

        "eth_getStorageAt" => Family::Param(2),

        "eth_getTransactionByHash"
        | "eth_getTransactionReceipt"
        | "eth_getBlockByHash"
        | "eth_getBlockTransactionCountByHash"
        | "eth_getTransactionByBlockHashAndIndex"
        | "eth_getUncleByBlockHashAndIndex" => Family::Fanout,

        "eth_newFilter" | "eth_getLogs" => Family::Unsupported,

        _ => Family::Latest,
    }
}

pub async fn handle(req: Request<Incoming>, state: &GatewayState) -> Response<BoxBody> {
    let _guard = state.accounting.begin();

    if req.method() != Method::POST {
        return Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(full_body(Bytes::new()))
            .unwrap();
    }

    let (parts, body) = req.into_parts();
    let Ok(raw) = body.collect().await.map(|c| c.to_bytes()) else {
        return jsonrpc_error(Value::Null, PARSE_ERROR, "failed to read request body");
    };

    let parsed: Value = match serde_json::from_slice(&raw) {
        Ok(v) => v,
        Err(_) => return jsonrpc_error(Value::Null, PARSE_ERROR, "invalid JSON"),
    };
    let id = parsed.get("id").cloned().unwrap_or(Value::Null);
    let Some(method) = parsed.get("method").and_then(|m| m.as_str()) else {
        return jsonrpc_error(id, INVALID_REQUEST, "invalid request");
    };
    let params = parsed.get("params");

    match classify(method) {
        Family::Unsupported => jsonrpc_error(id, INVALID_REQUEST, "Method not supported yet"),

        Family::Fanout => {
            let candidates = state.registry.endpoints(NodeKind::JsonRpc);
            fanout::fanout_evm_jsonrpc(
                &state.pool,
                &parts.method,
                parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"),
                &parts.headers,
                raw,
                &candidates,
                id,
            )
            .await
        }

        Family::Latest => route(parts, state, raw, HeightSelector::Latest, id).await,

        Family::Param(index) => {
            let value = params.and_then(|p| p.as_array()).and_then(|a| a.get(index));
            match parse_evm_selector(value) {
                Ok(selector) if selector.is_hash() => {
                    let candidates = state.registry.endpoints(NodeKind::JsonRpc);
                    fanout::fanout_evm_jsonrpc(
                        &state.pool,
                        &parts.method,
                        parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"),
                        &parts.headers,
                        raw,
                        &candidates,
                        id,
                    )
                    .await
                }
                Ok(selector) => route(parts, state, raw, selector, id).await,
                Err(msg) => jsonrpc_error(id, INVALID_REQUEST, msg),
            }
        }
    }
}

async fn route(
    parts: http::request::Parts,
    state: &GatewayState,
    raw: Bytes,
    selector: HeightSelector,
    id: Value,
) -> Response<BoxBody> {
    let height = selector.as_height().unwrap_or(0);
    let Some(node) = state.registry.node_for(height) else {
        return jsonrpc_error(id, INVALID_PARAMS, "no nodes found");
    };
    let upstream = node.jsonrpc.clone();
    let req = Request::from_parts(parts, full_body(raw));
    match forward::forward(&state.pool, req, &upstream).await {
        Ok(resp) => resp,
        Err(e) => forward::bad_gateway(&e.to_string()),
    }
}

fn jsonrpc_error(id: Value, code: i64, message: impl Into<String>) -> Response<BoxBody> {
    let resp = JsonRpcResponse::error(id, code, message);
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(full_body(serde_json::to_vec(&resp).unwrap()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_family_methods_use_their_declared_index() {
        assert!(matches!(classify("eth_getBlockByNumber"), Family::Param(0)));
        assert!(matches!(classify("eth_getBalance"), Family::Param(1)));
        assert!(matches!(classify("eth_getStorageAt"), Family::Param(2)));
    }

    #[test]
    fn hash_only_methods_always_fan_out() {
        assert!(matches!(classify("eth_getTransactionByHash"), Family::Fanout));
        assert!(matches!(classify("eth_getBlockByHash"), Family::Fanout));
    }

    #[test]
    fn log_methods_are_unsupported() {
        assert!(matches!(classify("eth_getLogs"), Family::Unsupported));
        assert!(matches!(classify("eth_newFilter"), Family::Unsupported));
    }

    #[test]
    fn unknown_methods_default_to_latest() {
        assert!(matches!(classify("eth_chainId"), Family::Latest));
    }
}
