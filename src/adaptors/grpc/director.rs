//! Generic gRPC director (spec §4.5.5a): the catch-all for any service this
//! gateway has no typed registration for. Reads the height from metadata
//! first, falls back to a best-effort body peek, resolves a node, and
//! forwards the single message through with a raw codec.
//!
//! Grounded on the original `gateway/grpc_proxy.go`'s director function;
//! the raw-codec forwarding mechanics follow `em3ndez-materialize`'s
//! `BidiProtoClient`, generalized from protobuf-typed messages to opaque
//! bytes since this director has no `.proto` schema for most services.

use super::codec::RawCodec;
use crate::accounting::Accounting;
use crate::registry::{NodeKind, Registry};
use bytes::Bytes;
use http::uri::PathAndQuery;
use prost::Message;
use tonic::body::BoxBody;
use tonic::server::{Grpc, UnaryService};
use tonic::{Request, Response, Status};

const HEIGHT_METADATA_KEY: &str = "x-cosmos-block-height";

/// Best-effort extraction of a `height` field from an opaque request body,
/// treating it as a `google.protobuf.Struct`-shaped map (spec §4.5.5a: "a
/// typed envelope whose payload map may carry height as number or string").
/// Any decode failure or absence of the field yields `None`, not an error —
/// this is a heuristic fallback, not a schema-aware decode.
fn height_from_body(body: &Bytes) -> Option<u64> {
    let strukt = prost_types::Struct::decode(body.clone()).ok()?;
    let value = strukt.fields.get("height")?;
    match value.kind.as_ref()? {
        prost_types::value::Kind::NumberValue(n) if *n >= 0.0 => Some(*n as u64),
        prost_types::value::Kind::StringValue(s) => s.parse().ok(),
        _ => None,
    }
}

fn extract_height(metadata: &tonic::metadata::MetadataMap, body: &Bytes) -> u64 {
    if let Some(value) = metadata.get(HEIGHT_METADATA_KEY) {
        if let Ok(s) = value.to_str() {
            if let Ok(h) = s.parse::<u64>() {
                return h;
            }
        }
    }
    height_from_body(body).unwrap_or(0)
}

struct DirectorCall {
    registry: Registry,
    accounting: Accounting,
    path: PathAndQuery,
    pool: crate::pool::ConnectionPool,
}

impl UnaryService<Bytes> for DirectorCall {
    type Response = Bytes;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Response<Bytes>, Status>> + Send>,
    >;

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let registry = self.registry.clone();
        let pool = self.pool.clone();
        let path = self.path.clone();
        let accounting = self.accounting.clone();

        Box::pin(async move {
            let _guard = accounting.begin();
            let metadata = request.metadata().clone();
            let body = request.into_inner();
            let height = extract_height(&metadata, &body);

            let Some(node) = registry.node_for(height) else {
                return Err(Status::invalid_argument("No matching backend found"));
            };

            let channel = pool
                .grpc_channel(&node.grpc)
                .await
                .map_err(|e| Status::unavailable(e.to_string()))?;

            let mut client = tonic::client::Grpc::new(channel);
            client
                .ready()
                .await
                .map_err(|e| Status::unavailable(e.to_string()))?;

            let mut out_req = Request::new(body);
            *out_req.metadata_mut() = metadata;

            client.unary(out_req, path, RawCodec).await
        })
    }
}

/// Entry point for any inbound call whose path didn't match an explicitly
/// registered service (spec §4.5.5: "the explicit registrations take
/// precedence over the director because the server routes by service
/// name").
pub async fn route<B>(
    req: http::Request<B>,
    registry: Registry,
    accounting: Accounting,
    pool: crate::pool::ConnectionPool,
) -> http::Response<BoxBody>
where
    B: http_body::Body<Data = bytes::Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    let path = req
        .uri()
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let mut grpc = Grpc::new(RawCodec);
    grpc.unary(
        DirectorCall {
            registry,
            accounting,
            path,
            pool,
        },
        req,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::MetadataMap;

    #[test]
    fn metadata_height_takes_precedence() {
        let mut metadata = MetadataMap::new();
        metadata.insert(HEIGHT_METADATA_KEY, "150".parse().unwrap());
        assert_eq!(extract_height(&metadata, &Bytes::new()), 150);
    }

    #[test]
    fn absent_metadata_and_unparseable_body_defaults_to_zero() {
        let metadata = MetadataMap::new();
        assert_eq!(extract_height(&metadata, &Bytes::from_static(b"garbage")), 0);
    }
}
