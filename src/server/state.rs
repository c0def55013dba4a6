use crate::accounting::Accounting;
use crate::config::Ports;
use crate::metrics::Metrics;
use crate::pool::ConnectionPool;
use crate::registry::Registry;

/// Everything a protocol adaptor needs to handle one request. Registry and
/// Ports are immutable snapshots loaded once at startup (spec §3/§5 — "no
/// locking needed"); the pool and accounting are the only mutable, shared
/// pieces, and both are internally synchronized.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Registry,
    pub pool: ConnectionPool,
    pub accounting: Accounting,
    pub ports: Ports,
    pub metrics: Metrics,
}

impl GatewayState {
    pub fn new(registry: Registry, ports: Ports, metrics: Metrics) -> Self {
        Self {
            registry,
            pool: ConnectionPool::new(),
            accounting: Accounting::new(),
            ports,
            metrics,
        }
    }
}
