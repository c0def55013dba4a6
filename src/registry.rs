//! Node Registry and Height Router (spec §4.1).
//!
//! The registry is an immutable, ordered snapshot of upstream nodes loaded
//! once at startup. The router is a pure function over that snapshot: no
//! health-probing, no latency tracking — capability is declared by the
//! operator via each node's `blocks` range, and the first matching node in
//! registry order wins.

use crate::config::Node;
use std::sync::Arc;

#[derive(Clone)]
pub struct Registry {
    nodes: Arc<Vec<Node>>,
}

/// Which endpoint family a caller wants out of a selected node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Rpc,
    Api,
    Grpc,
    JsonRpc,
    JsonRpcWs,
}

impl Registry {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Arc::new(nodes),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// `node_for(height) -> Node?` — see spec §4.1 for the exact priority
    /// table. Grounded on the original `config.GetNodebyHeight`.
    pub fn node_for(&self, height: u64) -> Option<&Node> {
        if height == 0 {
            // (1) first pruned (latest-only) node.
            if let Some(n) = self.nodes.iter().find(|n| n.is_latest_only()) {
                return Some(n);
            }
            // (2) first open-ended archive node.
            return self.nodes.iter().find(|n| n.is_open_archive());
        }

        // (1) first exact bounded or open-archive range containing height.
        for n in self.nodes.iter() {
            if let Some((min, max)) = n.range() {
                if max != 0 {
                    if height >= min && height <= max {
                        return Some(n);
                    }
                } else if height >= min {
                    return Some(n);
                }
            }
        }

        // (2) fallback: first pruned node.
        self.nodes.iter().find(|n| n.is_latest_only())
    }

    /// Every node's endpoint of the given kind — used by fan-out to build
    /// a candidate list (spec §4.4).
    pub fn endpoints(&self, kind: NodeKind) -> Vec<String> {
        self.nodes
            .iter()
            .map(|n| match kind {
                NodeKind::Rpc => n.rpc.clone(),
                NodeKind::Api => n.api.clone(),
                NodeKind::Grpc => n.grpc.clone(),
                NodeKind::JsonRpc => n.jsonrpc.clone(),
                NodeKind::JsonRpcWs => n.jsonrpc_ws.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(blocks: Vec<u64>) -> Node {
        Node {
            rpc: "r".into(),
            api: "a".into(),
            grpc: "g".into(),
            jsonrpc: "j".into(),
            jsonrpc_ws: "w".into(),
            blocks,
        }
    }

    #[test]
    fn router_determinism() {
        let reg = Registry::new(vec![n(vec![1, 100]), n(vec![101, 0])]);
        let first = reg.node_for(50).map(|n| n.rpc.clone());
        let second = reg.node_for(50).map(|n| n.rpc.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn latest_prefers_pruned_over_open_archive() {
        let pruned = n(vec![999]);
        let open = n(vec![1, 0]);
        let reg = Registry::new(vec![open.clone(), pruned.clone()]);
        assert_eq!(reg.node_for(0).unwrap().blocks, pruned.blocks);

        let reg2 = Registry::new(vec![open.clone()]);
        assert_eq!(reg2.node_for(0).unwrap().blocks, open.blocks);
    }

    #[test]
    fn height_prefers_bounded_range_then_open_then_pruned_fallback() {
        let bounded = n(vec![1, 100]);
        let open = n(vec![101, 0]);
        let pruned = n(vec![999]);
        let reg = Registry::new(vec![bounded.clone(), open.clone(), pruned.clone()]);

        assert_eq!(reg.node_for(50).unwrap().blocks, bounded.blocks);
        assert_eq!(reg.node_for(150).unwrap().blocks, open.blocks);

        let reg_no_range = Registry::new(vec![pruned.clone()]);
        assert_eq!(reg_no_range.node_for(5).unwrap().blocks, pruned.blocks);
    }

    #[test]
    fn no_match_returns_none() {
        let reg = Registry::new(vec![n(vec![1, 100])]);
        assert!(reg.node_for(500).is_none());
        assert!(reg.node_for(0).is_none());
    }

    #[test]
    fn registry_order_is_the_preference_order() {
        let a = n(vec![1, 100]);
        let b = n(vec![1, 100]);
        let reg = Registry::new(vec![
            Node { rpc: "first".into(), ..a.clone() },
            Node { rpc: "second".into(), ..b.clone() },
        ]);
        assert_eq!(reg.node_for(50).unwrap().rpc, "first");
    }
}
