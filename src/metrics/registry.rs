use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for latency metrics (seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`, `gauge!`,
/// `histogram!`) can be used anywhere in the codebase. The `PrometheusHandle`
/// is retained solely for rendering the `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    ///
    /// Must be called **once** at startup before any `counter!` / `gauge!` /
    /// `histogram!` calls.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        describe_counter!(
            "gateway_requests_total",
            Unit::Count,
            "Total requests processed, by protocol/method/status_code"
        );
        describe_histogram!(
            "gateway_request_duration_seconds",
            Unit::Seconds,
            "Total request duration from client perspective, by protocol"
        );
        describe_histogram!(
            "gateway_upstream_request_duration_seconds",
            Unit::Seconds,
            "Time spent waiting on the chosen upstream, by protocol/upstream_addr"
        );
        describe_gauge!(
            "gateway_requests_in_flight",
            Unit::Count,
            "Process-wide in-flight request count (spec §4.6 wait-group)"
        );

        describe_gauge!(
            "gateway_connections_active",
            Unit::Count,
            "Number of active downstream connections, by protocol"
        );
        describe_counter!(
            "gateway_connections_total",
            Unit::Count,
            "Total connections accepted, by protocol/status"
        );

        describe_counter!(
            "gateway_fanout_attempts_total",
            Unit::Count,
            "Total fan-out candidate attempts, by protocol/outcome"
        );
        describe_counter!(
            "gateway_fanout_winners_total",
            Unit::Count,
            "Total fan-out requests that found an authoritative winner, by protocol"
        );

        describe_gauge!(
            "gateway_grpc_channels_cached",
            Unit::Count,
            "Number of gRPC channels currently cached in the connection pool"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
