//! REST/API adaptor (spec §4.5.1). Accepts `GET`/`POST`, extracts a height
//! selector from the header, the URL path, or defaults to latest, then
//! reverse-proxies to the resolved node's REST endpoint.
//!
//! Grounded on the original `gateway/api_server.go`'s listener shape, with
//! the actual forwarding behavior taken from `utils/httpUtils.go::FowardRequest`.

use crate::proxy::context::{full_body, BoxBody};
use crate::proxy::forward;
use crate::server::GatewayState;
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;

const HEIGHT_SEGMENTS: &[&str] = &["block", "blocks", "validatorsets", "historical_info"];

fn height_type_mismatch() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("content-type", "application/json")
        .body(full_body(
            r#"{"code":3,"message":"type mismatch, parameter: height, error: invalid height value","details":[]}"#,
        ))
        .unwrap()
}

/// Height extraction precedence: header > path segment > latest (spec §4.5.1).
fn extract_height(method: &Method, path: &str, headers: &http::HeaderMap) -> Result<u64, ()> {
    if let Some(h) = headers.get("x-cosmos-block-height") {
        let s = h.to_str().map_err(|_| ())?;
        return s.parse::<u64>().map_err(|_| ());
    }

    if *method == Method::GET {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        if segments.len() >= 2 {
            let second_to_last = segments[segments.len() - 2];
            if HEIGHT_SEGMENTS.contains(&second_to_last) {
                let last = segments[segments.len() - 1];
                return last.parse::<u64>().map_err(|_| ());
            }
        }
    }

    Ok(0)
}

pub async fn handle(req: Request<Incoming>, state: &GatewayState) -> Response<BoxBody> {
    let _guard = state.accounting.begin();
    let (parts, body) = req.into_parts();

    let height = match extract_height(&parts.method, parts.uri.path(), &parts.headers) {
        Ok(h) => h,
        Err(()) => return height_type_mismatch(),
    };

    let Some(node) = state.registry.node_for(height) else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("content-type", "application/json")
            .body(full_body(r#"{"error":"no node found for height"}"#))
            .unwrap();
    };
    let upstream = node.api.clone();

    let Ok(body_bytes) = body.collect().await.map(|c| c.to_bytes()) else {
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(full_body(Bytes::new()))
            .unwrap();
    };

    let req = Request::from_parts(parts, full_body(body_bytes));
    match forward::forward(&state.pool, req, &upstream).await {
        Ok(resp) => resp,
        Err(e) => forward::bad_gateway(&e.to_string()),
    }
}
