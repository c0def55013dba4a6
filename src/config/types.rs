use serde::{Deserialize, Serialize};

/// An upstream descriptor: five protocol endpoints plus the block range it
/// claims to serve. `blocks` is validated at load time to hold at most two
/// entries (see `GatewayConfig::validate`):
/// - one entry `[x]` — a pruned node, serves only the chain head.
/// - two entries `[x, y]` with `y > 0` — a bounded archive window.
/// - two entries `[x, 0]` — an open-ended archive from `x` onward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub rpc: String,
    pub api: String,
    pub grpc: String,
    pub jsonrpc: String,
    pub jsonrpc_ws: String,
    pub blocks: Vec<u64>,
}

impl Node {
    pub fn is_latest_only(&self) -> bool {
        self.blocks.len() == 1
    }

    /// `(min, max)` for a two-entry range, where `max == 0` means open-ended.
    pub fn range(&self) -> Option<(u64, u64)> {
        if self.blocks.len() == 2 {
            Some((self.blocks[0], self.blocks[1]))
        } else {
            None
        }
    }

    pub fn is_open_archive(&self) -> bool {
        matches!(self.range(), Some((_, 0)))
    }

    pub fn covers(&self, height: u64) -> bool {
        match self.range() {
            Some((min, 0)) => height >= min,
            Some((min, max)) => height >= min && height <= max,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ports {
    #[serde(default)]
    pub rpc: u16,
    #[serde(default)]
    pub grpc: u16,
    #[serde(default)]
    pub api: u16,
    #[serde(default)]
    pub jsonrpc: u16,
    #[serde(default)]
    pub jsonrpc_ws: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            rpc: 26657,
            grpc: 9090,
            api: 1317,
            jsonrpc: 8545,
            jsonrpc_ws: 8546,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub upstream: Vec<Node>,
    #[serde(default)]
    pub ports: Ports,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upstream: vec![Node {
                rpc: "http://localhost:26657".into(),
                api: "http://localhost:1317".into(),
                grpc: "localhost:9090".into(),
                jsonrpc: "http://localhost:8545".into(),
                jsonrpc_ws: "http://localhost:8546/websocket".into(),
                blocks: vec![1, 1000],
            }],
            ports: Ports::default(),
        }
    }
}
