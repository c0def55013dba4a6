use super::GatewayState;
use crate::proxy::context::{full_body, BoxBody};
use hyper::body::Incoming;
use hyper::{Request, Response};

/// Admin surface (spec §6): health/readiness and metrics only — there is no
/// dynamic routing table or cluster config in this gateway to introspect.
pub fn handle_admin(req: Request<Incoming>, state: GatewayState) -> Response<BoxBody> {
    match req.uri().path() {
        "/health" | "/healthz" => Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(full_body(format!(
                r#"{{"status":"ok","in_flight":{}}}"#,
                state.accounting.in_flight()
            )))
            .unwrap(),

        "/metrics" => Response::builder()
            .status(200)
            .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
            .body(full_body(state.metrics.render()))
            .unwrap(),

        _ => Response::builder()
            .status(404)
            .header("content-type", "application/json")
            .body(full_body(r#"{"error":"not found"}"#))
            .unwrap(),
    }
}
