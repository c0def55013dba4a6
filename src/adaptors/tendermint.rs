//! Tendermint-style JSON-REST+RPC adaptor (spec §4.5.2). One port, dispatched
//! by path (GET) or by JSON-RPC method name (POST), against three
//! classifications: always-latest, height-from-query, and hash-routed
//! (fan-out).
//!
//! Grounded on the original `gateway/rpc_server.go`'s listener shape; the
//! classification table itself has no direct original-Go counterpart (the
//! original only ever dispatched to a single configured node) and is taken
//! from spec §4.5.2 directly.

use crate::jsonrpc::{JsonRpcResponse, INVALID_PARAMS, PARSE_ERROR};
use crate::proxy::context::{full_body, BoxBody};
use crate::proxy::{fanout, forward};
use crate::registry::NodeKind;
use crate::server::GatewayState;
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde_json::Value;

const LATEST_ONLY: &[&str] = &[
    "",
    "abci_info",
    "broadcast_evidence",
    "broadcast_tx_async",
    "broadcast_tx_commit",
    "broadcast_tx_sync",
    "consensus_state",
    "dump_consensus_state",
    "genesis",
    "genesis_chunked",
    "health",
    "net_info",
    "num_unconfirmed_txs",
    "status",
    "subscribe",
    "unsubscribe",
    "unsubscribe_all",
    "websocket",
];

const HEIGHT_QUERY: &[&str] = &[
    "abci_query",
    "block",
    "block_results",
    "commit",
    "consensus_params",
    "header",
    "validators",
];

const HASH_FANOUT: &[&str] = &[
    "block_by_hash",
    "block_search",
    "check_tx",
    "header_by_hash",
    "tx",
    "tx_search",
];

const BLOCKCHAIN: &str = "blockchain";

enum Dispatch {
    Height(u64),
    HashFanout,
    Unknown,
}

fn classify(name: &str, height_param: impl Fn() -> Option<u64>) -> Dispatch {
    if LATEST_ONLY.contains(&name) {
        Dispatch::Height(0)
    } else if HEIGHT_QUERY.contains(&name) {
        Dispatch::Height(height_param().unwrap_or(0))
    } else if name == BLOCKCHAIN {
        Dispatch::Height(height_param().unwrap_or(0))
    } else if HASH_FANOUT.contains(&name) {
        Dispatch::HashFanout
    } else {
        Dispatch::Unknown
    }
}

fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?.split('&').find_map(|kv| {
        let mut it = kv.splitn(2, '=');
        let k = it.next()?;
        (k == key).then(|| it.next()).flatten()
    })
}

pub async fn handle(req: Request<Incoming>, state: &GatewayState) -> Response<BoxBody> {
    let _guard = state.accounting.begin();
    let (parts, body) = req.into_parts();

    if parts.method == Method::GET {
        return handle_get(parts, state).await;
    }
    if parts.method == Method::POST {
        return handle_post(parts, body, state).await;
    }

    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .body(full_body(Bytes::new()))
        .unwrap()
}

async fn handle_get(parts: http::request::Parts, state: &GatewayState) -> Response<BoxBody> {
    let name = parts.uri.path().trim_start_matches('/');
    let query = parts.uri.query();

    let dispatch = classify(name, || {
        if name == BLOCKCHAIN {
            query_param(query, "maxheight")
                .or_else(|| query_param(query, "maxHeight"))
                .and_then(|v| v.parse().ok())
        } else {
            query_param(query, "height").and_then(|v| v.parse().ok())
        }
    });

    match dispatch {
        Dispatch::Height(height) => route_to_height(parts, state, height, Bytes::new()).await,
        Dispatch::HashFanout => {
            let candidates = state.registry.endpoints(NodeKind::Rpc);
            fanout::fanout_tendermint(
                &state.pool,
                &parts.method,
                parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"),
                &parts.headers,
                Bytes::new(),
                &candidates,
            )
            .await
        }
        Dispatch::Unknown => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(full_body(Bytes::new()))
            .unwrap(),
    }
}

async fn handle_post(
    parts: http::request::Parts,
    body: Incoming,
    state: &GatewayState,
) -> Response<BoxBody> {
    let Ok(raw) = body.collect().await.map(|c| c.to_bytes()) else {
        return jsonrpc_error(Value::Null, PARSE_ERROR, "failed to read request body");
    };

    let parsed: Value = match serde_json::from_slice(&raw) {
        Ok(v) => v,
        Err(_) => return jsonrpc_error(Value::Null, PARSE_ERROR, "invalid JSON"),
    };
    let id = parsed.get("id").cloned().unwrap_or(Value::Null);
    let Some(method) = parsed.get("method").and_then(|m| m.as_str()) else {
        return jsonrpc_error(id, INVALID_PARAMS, "missing method");
    };

    // If params.height is present as a string, it takes precedence over
    // method classification entirely (spec §4.5.2).
    if let Some(height_str) = parsed
        .get("params")
        .and_then(|p| p.get("height"))
        .and_then(|h| h.as_str())
    {
        return match height_str.parse::<u64>() {
            Ok(height) => route_to_height(parts, state, height, raw).await,
            Err(_) => jsonrpc_error(id, INVALID_PARAMS, "invalid height parameter"),
        };
    }

    let dispatch = classify(method, || {
        if method == BLOCKCHAIN {
            parsed
                .get("params")
                .and_then(|p| p.get("maxHeight"))
                .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64()))
        } else {
            None
        }
    });

    match dispatch {
        Dispatch::Height(height) => route_to_height(parts, state, height, raw).await,
        Dispatch::HashFanout => {
            let candidates = state.registry.endpoints(NodeKind::Rpc);
            fanout::fanout_tendermint(
                &state.pool,
                &parts.method,
                parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"),
                &parts.headers,
                raw,
                &candidates,
            )
            .await
        }
        Dispatch::Unknown => jsonrpc_error(id, INVALID_PARAMS, "unknown method"),
    }
}

async fn route_to_height(
    parts: http::request::Parts,
    state: &GatewayState,
    height: u64,
    body: Bytes,
) -> Response<BoxBody> {
    let Some(node) = state.registry.node_for(height) else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(full_body(Bytes::new()))
            .unwrap();
    };
    let upstream = node.rpc.clone();
    let req = Request::from_parts(parts, full_body(body));
    match forward::forward(&state.pool, req, &upstream).await {
        Ok(resp) => resp,
        Err(e) => forward::bad_gateway(&e.to_string()),
    }
}

fn jsonrpc_error(id: Value, code: i64, message: &str) -> Response<BoxBody> {
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
    fn latest_only_paths_route_to_zero() {
        assert!(matches!(
            classify("status", || None),
            Dispatch::Height(0)
        ));
        assert!(matches!(classify("", || None), Dispatch::Height(0)));
    }

    #[test]
    fn height_query_paths_use_the_supplied_height() {
        assert!(matches!(classify("block", || Some(50)), Dispatch::Height(50)));
        assert!(matches!(classify("block", || None), Dispatch::Height(0)));
    }

    #[test]
    fn hash_paths_trigger_fanout() {
        assert!(matches!(classify("tx", || None), Dispatch::HashFanout));
        assert!(matches!(classify("block_by_hash", || None), Dispatch::HashFanout));
    }

    #[test]
    fn unknown_paths_are_unknown() {
        assert!(matches!(classify("not_a_real_method", || None), Dispatch::Unknown));
    }

    #[test]
    fn query_param_reads_named_key() {
        assert_eq!(query_param(Some("height=50&x=1"), "height"), Some("50"));
        assert_eq!(query_param(Some("x=1"), "height"), None);
        assert_eq!(query_param(None, "height"), None);
    }
}
