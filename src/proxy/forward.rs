//! Forwarder (spec §4.3): reverse-proxies one inbound request to a chosen
//! upstream, and a one-shot `check` used by fan-out.
//!
//! Grounded on the original `utils/httpUtils.go`: `FowardRequest` (stream the
//! request straight through via a reverse proxy) and `CheckRequest` (clone
//! method/path/query/headers/body, issue the request, hand back the raw
//! response without writing it to the client). The body-rewrite mechanics
//! (hop-header stripping, header cloning) follow the teacher's
//! `proxy/handler.rs` style rather than Go's `httputil.ReverseProxy`.

use crate::pool::ConnectionPool;
use crate::proxy::context::{full_body, BoxBody};
use bytes::Bytes;
use http::header::{HeaderName, CONNECTION, TRANSFER_ENCODING};
use http::{Request, Response, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;

fn remove_hop_headers(headers: &mut http::HeaderMap) {
    let hop_headers: &[HeaderName] = &[
        CONNECTION,
        HeaderName::from_static("keep-alive"),
        HeaderName::from_static("proxy-authenticate"),
        HeaderName::from_static("proxy-authorization"),
        HeaderName::from_static("te"),
        HeaderName::from_static("trailers"),
        TRANSFER_ENCODING,
        HeaderName::from_static("upgrade"),
    ];
    for h in hop_headers {
        headers.remove(h);
    }
}

/// Rebuild `path?query` against a new upstream base URL, preserving method,
/// headers, and body. Mirrors `CheckRequest`'s URL reconstruction.
fn retarget_uri(upstream_base: &str, path_and_query: &str) -> Result<Uri, http::Error> {
    let base = upstream_base.trim_end_matches('/');
    format!("{base}{path_and_query}")
        .parse::<Uri>()
        .map_err(|e| http::Error::from(e))
}

/// `forward(in_req, upstream_url)` — proxy `in_req` to `upstream_url`,
/// streaming the response back unmodified. On upstream failure, the caller
/// (the adaptor) is expected to turn this into a `502`.
pub async fn forward(
    pool: &ConnectionPool,
    req: Request<BoxBody>,
    upstream_base: &str,
) -> Result<Response<BoxBody>, hyper_util::client::legacy::Error> {
    let (mut parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let uri = retarget_uri(upstream_base, path_and_query)
        .unwrap_or_else(|_| parts.uri.clone());
    parts.uri = uri;
    remove_hop_headers(&mut parts.headers);

    let out_req = Request::from_parts(parts, body);
    let resp = pool.http().request(out_req).await?;
    let (resp_parts, resp_body) = resp.into_parts();
    Ok(Response::from_parts(resp_parts, resp_body.boxed()))
}

pub fn bad_gateway(msg: &str) -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .header("content-type", "application/json")
        .body(full_body(format!(r#"{{"error":"{}"}}"#, msg)))
        .unwrap()
}

/// `check(in_req, upstream_url)` — a one-shot probe request used by fan-out
/// (spec §4.4). Unlike `forward`, the caller owns the buffered body and
/// replays it across multiple candidates without re-reading the client.
pub async fn check(
    pool: &ConnectionPool,
    method: &http::Method,
    path_and_query: &str,
    headers: &http::HeaderMap,
    body: Bytes,
    upstream_base: &str,
) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
    let uri = retarget_uri(upstream_base, path_and_query)
        .unwrap_or_else(|_| Uri::from_static("/"));

    let mut builder = Request::builder().method(method.clone()).uri(uri);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    let mut req = builder.body(full_body(body)).unwrap();
    remove_hop_headers(req.headers_mut());

    pool.http().request(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retarget_uri_joins_base_and_path() {
        let uri = retarget_uri("http://a:1317", "/cosmos/bank/v1/balances/xyz?x=1").unwrap();
        assert_eq!(
            uri.to_string(),
            "http://a:1317/cosmos/bank/v1/balances/xyz?x=1"
        );
    }

    #[test]
    fn retarget_uri_strips_trailing_slash_on_base() {
        let uri = retarget_uri("http://a:1317/", "/status").unwrap();
        assert_eq!(uri.to_string(), "http://a:1317/status");
    }
}
