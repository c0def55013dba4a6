//! Fan-out Engine (spec §4.4): used when a request's height cannot be known
//! ahead of time (hash-addressed queries). Iterates or dials candidate
//! upstreams and returns the first authoritative answer.
//!
//! The HTTP variant is grounded on the teacher's sequential-retry style in
//! `proxy/handler.rs`, generalized to the two authority rules spec.md names
//! (Tendermint status-code authority, EVM JSON-RPC result/error authority).
//! The WebSocket variant's concurrent-dial idiom is grounded on
//! `tokio_tungstenite::connect_async` usage found in the retrieval pack's
//! `other_examples/` (ws-vs-http latency harness).

use crate::jsonrpc::{JsonRpcEnvelope, JsonRpcResponse, INVALID_PARAMS};
use crate::pool::ConnectionPool;
use crate::proxy::context::{full_body, BoxBody};
use bytes::Bytes;
use futures_util::stream::FuturesUnordered;
use futures_util::{SinkExt, StreamExt};
use http::{HeaderMap, Method, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::time::Duration;

const WS_FANOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tendermint RPC fan-out: `200` is authoritative; a `500` is remembered and
/// surfaced only if nothing else answers; any other status is skipped.
pub async fn fanout_tendermint(
    pool: &ConnectionPool,
    method: &Method,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
    candidates: &[String],
) -> Response<BoxBody> {
    let mut last_500: Option<Bytes> = None;

    for candidate in candidates {
        let resp = match super::forward::check(
            pool,
            method,
            path_and_query,
            headers,
            body.clone(),
            candidate,
        )
        .await
        {
            Ok(r) => r,
            Err(_) => continue,
        };

        if resp.status() == StatusCode::OK {
            let (parts, resp_body) = resp.into_parts();
            return Response::from_parts(parts, resp_body.boxed());
        }
        if resp.status() == StatusCode::INTERNAL_SERVER_ERROR {
            if let Ok(collected) = resp.into_body().collect().await {
                last_500 = Some(collected.to_bytes());
            }
        }
    }

    if let Some(body) = last_500 {
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(full_body(body))
            .unwrap();
    }

    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .header("content-type", "application/json")
        .body(full_body(
            r#"{"error":"no authoritative response from any candidate"}"#,
        ))
        .unwrap()
}

/// EVM JSON-RPC fan-out: the first candidate whose envelope has a non-null
/// `result` and no `error` wins (spec §4.4, §4.5.3).
pub async fn fanout_evm_jsonrpc(
    pool: &ConnectionPool,
    method: &Method,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
    candidates: &[String],
    request_id: Value,
) -> Response<BoxBody> {
    for candidate in candidates {
        let resp = match super::forward::check(
            pool,
            method,
            path_and_query,
            headers,
            body.clone(),
            candidate,
        )
        .await
        {
            Ok(r) => r,
            Err(_) => continue,
        };

        let Ok(collected) = resp.into_body().collect().await else {
            continue;
        };
        let raw = collected.to_bytes();
        let Ok(envelope) = serde_json::from_slice::<JsonRpcEnvelope>(&raw) else {
            continue;
        };

        if envelope.is_authoritative() {
            return Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(full_body(raw))
                .unwrap();
        }
    }

    let err = JsonRpcResponse::error(request_id, INVALID_PARAMS, "no valid response from any candidate");
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(full_body(serde_json::to_vec(&err).unwrap()))
        .unwrap()
}

/// WebSocket fan-out (spec §4.4): dial every candidate concurrently under a
/// global 10s timeout; the first response with a non-null `result` wins.
/// Remaining dials are abandoned (not explicitly cancelled — dropping the
/// `FuturesUnordered` drops their tasks) once a winner is found or the
/// timeout expires.
pub async fn fanout_websocket(candidates: &[String], frame: &str) -> Option<String> {
    let mut dials = FuturesUnordered::new();
    for candidate in candidates {
        let url = candidate.clone();
        let frame = frame.to_string();
        dials.push(async move { dial_and_probe(&url, &frame).await });
    }

    let deadline = tokio::time::sleep(WS_FANOUT_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            next = dials.next() => {
                match next {
                    Some(Some(text)) => return Some(text),
                    Some(None) => continue,
                    None => return None,
                }
            }
            _ = &mut deadline => return None,
        }
    }
}

/// `connect_async` only accepts `ws://`/`wss://` schemes, but the configured
/// `jsonrpc_ws` endpoint is an `http://`/`https://` URL (spec §4.5.4 step 5).
pub fn normalize_ws_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        url.to_string()
    }
}

async fn dial_and_probe(url: &str, frame: &str) -> Option<String> {
    let url = normalize_ws_url(url);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.ok()?;
    let (mut write, mut read) = ws_stream.split();
    write
        .send(tokio_tungstenite::tungstenite::Message::Text(frame.to_string()))
        .await
        .ok()?;

    let msg = read.next().await?.ok()?;
    let text = msg.into_text().ok()?;
    let envelope: JsonRpcEnvelope = serde_json::from_str(&text).ok()?;
    if envelope.is_authoritative() {
        Some(text)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_ws_url_rewrites_http_schemes_only() {
        assert_eq!(normalize_ws_url("http://node:8546/websocket"), "ws://node:8546/websocket");
        assert_eq!(normalize_ws_url("https://node:8546/websocket"), "wss://node:8546/websocket");
        assert_eq!(normalize_ws_url("ws://node:8546/websocket"), "ws://node:8546/websocket");
        assert_eq!(normalize_ws_url("wss://node:8546/websocket"), "wss://node:8546/websocket");
    }
}
