use crate::height::HeightSelector;
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use std::time::Instant;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-request context that flows through an adaptor's handling of one
/// inbound frame. Carries the data listed in spec §3's "Request Context":
/// protocol tag, extracted height, and the bits needed to finalize metrics
/// once the exchange completes.
pub struct RequestContext {
    pub protocol: &'static str,
    pub method: String,
    pub route: String,
    pub height: HeightSelector,
    pub upstream_addr: String,
    pub start: Instant,
    pub upstream_start: Option<Instant>,
}

impl RequestContext {
    pub fn new(protocol: &'static str, method: impl Into<String>) -> Self {
        Self {
            protocol,
            method: method.into(),
            route: String::new(),
            height: HeightSelector::Unspecified,
            upstream_addr: String::new(),
            start: Instant::now(),
            upstream_start: None,
        }
    }

    pub fn error_response(&self, status: StatusCode, msg: &str) -> hyper::Response<BoxBody> {
        self.finalize_metrics(status.as_u16());
        hyper::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(full_body(format!(r#"{{"error":"{}"}}"#, msg)))
            .unwrap()
    }

    pub fn finalize_metrics(&self, resp_status: u16) {
        let mut buf = itoa::Buffer::new();
        let status_str = buf.format(resp_status);

        metrics::counter!(
            "gateway_requests_total",
            "protocol" => self.protocol,
            "method" => self.method.clone(),
            "status_code" => status_str.to_owned(),
        )
        .increment(1);

        metrics::histogram!(
            "gateway_request_duration_seconds",
            "protocol" => self.protocol,
        )
        .record(self.start.elapsed().as_secs_f64());

        if let Some(upstream_start) = self.upstream_start {
            metrics::histogram!(
                "gateway_upstream_request_duration_seconds",
                "protocol" => self.protocol,
                "upstream_addr" => self.upstream_addr.clone(),
            )
            .record(upstream_start.elapsed().as_secs_f64());
        }
    }
}
