//! EVM JSON-RPC/WebSocket adaptor (spec §4.5.4). Accepts the upgrade, then
//! processes frames sequentially on that connection: each frame is an
//! independent JSON-RPC call, routed or fanned-out by the same rules as the
//! HTTP adaptor, with its single reply relayed back to the client.
//!
//! The upgrade handshake follows the teacher's `TokioIo` accept-loop idiom
//! (`server/mod.rs`); the per-frame relay dials outbound via
//! `tokio_tungstenite::connect_async`, the same client idiom used by
//! `proxy::fanout::dial_and_probe`.

use crate::adaptors::jsonrpc::{classify, Family};
use crate::height::{parse_evm_selector, HeightSelector};
use crate::jsonrpc::{INVALID_PARAMS, INVALID_REQUEST};
use crate::proxy::context::{empty_body, BoxBody};
use crate::proxy::fanout;
use crate::registry::NodeKind;
use crate::server::GatewayState;
use futures_util::{SinkExt, StreamExt};
use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

fn is_upgrade_request(req: &Request<Incoming>) -> bool {
    let has_conn_upgrade = req
        .headers()
        .get(http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);
    let has_upgrade_hdr = req.headers().contains_key(http::header::UPGRADE);
    has_conn_upgrade && has_upgrade_hdr
}

pub async fn handle(mut req: Request<Incoming>, state: GatewayState) -> Response<BoxBody> {
    if !is_upgrade_request(&req) {
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(empty_body())
            .unwrap();
    }

    let Some(key) = req.headers().get("sec-websocket-key").cloned() else {
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(empty_body())
            .unwrap();
    };
    let accept = derive_accept_key(key.as_bytes());

    tokio::spawn(async move {
        match hyper::upgrade::on(&mut req).await {
            Ok(upgraded) => {
                let io = TokioIo::new(upgraded);
                let ws = WebSocketStream::from_raw_socket(io, Role::Server, None).await;
                serve_connection(ws, state).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "websocket upgrade failed");
            }
        }
    });

    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(http::header::CONNECTION, "Upgrade")
        .header(http::header::UPGRADE, "websocket")
        .header("sec-websocket-accept", accept)
        .body(empty_body())
        .unwrap()
}

async fn serve_connection<S>(mut ws: WebSocketStream<S>, state: GatewayState)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let _guard = state.accounting.begin();
        let msg = match ws.next().await {
            Some(Ok(m)) => m,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "websocket read error");
                break;
            }
            None => break,
        };

        let frame_text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => {
                continue;
            }
        };

        let reply = process_frame(&frame_text, &state).await;
        if ws.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }
}

async fn process_frame(frame: &str, state: &GatewayState) -> String {
    let parsed: Value = match serde_json::from_str(frame) {
        Ok(v) => v,
        Err(_) => return error_frame(Value::Null, INVALID_REQUEST, "invalid JSON"),
    };
    let id = parsed.get("id").cloned().unwrap_or(Value::Null);
    let Some(method) = parsed.get("method").and_then(|m| m.as_str()) else {
        return error_frame(id, INVALID_REQUEST, "invalid request");
    };
    let params = parsed.get("params");

    let selector = match classify(method) {
        Family::Unsupported => return error_frame(id, INVALID_REQUEST, "Method not supported yet"),
        Family::Fanout => HeightSelector::Hash(String::new()),
        Family::Latest => HeightSelector::Latest,
        Family::Param(index) => {
            let value = params.and_then(|p| p.as_array()).and_then(|a| a.get(index));
            match parse_evm_selector(value) {
                Ok(s) => s,
                Err(msg) => return error_frame(id, INVALID_REQUEST, msg),
            }
        }
    };

    if selector.is_hash() {
        let candidates = state.registry.endpoints(NodeKind::JsonRpcWs);
        return match fanout::fanout_websocket(&candidates, frame).await {
            Some(text) => text,
            None => error_frame(id, INVALID_PARAMS, "no valid response from any candidate"),
        };
    }

    let height = selector.as_height().unwrap_or(0);
    let Some(node) = state.registry.node_for(height) else {
        return error_frame(id, INVALID_PARAMS, "no nodes found");
    };

    match relay_once(&node.jsonrpc_ws, frame).await {
        Some(text) => text,
        None => error_frame(id, INVALID_PARAMS, "upstream dial or read failed"),
    }
}

async fn relay_once(url: &str, frame: &str) -> Option<String> {
    let ws_url = fanout::normalize_ws_url(url);
    let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url).await.ok()?;
    let (mut write, mut read) = ws_stream.split();
    write.send(Message::Text(frame.to_string())).await.ok()?;
    let msg = read.next().await?.ok()?;
    msg.into_text().ok()
}

/// WS error frame shape (spec §6): unlike the HTTP JSON-RPC adaptors'
/// object-valued `error`, the WS frame carries `error` as a plain string.
#[derive(Serialize)]
struct WsErrorFrame {
    jsonrpc: &'static str,
    error: String,
    id: Value,
}

fn error_frame(id: Value, code: i64, message: impl Into<String>) -> String {
    let message = message.into();
    let frame = WsErrorFrame {
        jsonrpc: "2.0",
        error: format!("{code}: {message}"),
        id,
    };
    serde_json::to_string(&frame).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_frame_preserves_id_and_uses_string_error() {
        let frame = error_frame(Value::from(7), INVALID_REQUEST, "bad");
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["id"], Value::from(7));
        assert!(v["error"].is_string());
        assert!(v["error"].as_str().unwrap().contains("bad"));
    }
}
