//! `HeightSelector` — the tagged, parsed representation of a request's height
//! argument (spec §3, §4.5.3). Replaces ad hoc duck-typed JSON inspection
//! with one sum type and one set of decode rules that every adaptor shares.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeightSelector {
    /// Height 0 — routes to the chain head.
    Latest,
    /// Height 1 placeholder (see DESIGN.md Open Question #1).
    Earliest,
    Number(u64),
    /// Routing by hash: forces fan-out, since no single node's range can be
    /// consulted ahead of time.
    Hash(String),
    /// Defaults to `Latest` for methods that accept an absent selector.
    Unspecified,
}

impl HeightSelector {
    /// Resolve to a concrete router height, or `None` if this selector must
    /// be handled by fan-out instead of direct routing.
    pub fn as_height(&self) -> Option<u64> {
        match self {
            HeightSelector::Latest | HeightSelector::Unspecified => Some(0),
            HeightSelector::Earliest => Some(1),
            HeightSelector::Number(n) => Some(*n),
            HeightSelector::Hash(_) => None,
        }
    }

    pub fn is_hash(&self) -> bool {
        matches!(self, HeightSelector::Hash(_))
    }
}

/// Parse an EVM-style block selector value (spec §4.5.3). Used for the
/// number-family JSON-RPC methods and, identically, by the WebSocket
/// adaptor (spec §4.5.4).
pub fn parse_evm_selector(value: Option<&Value>) -> Result<HeightSelector, String> {
    let Some(value) = value else {
        return Ok(HeightSelector::Unspecified);
    };
    if value.is_null() {
        return Ok(HeightSelector::Unspecified);
    }

    match value {
        Value::String(s) => parse_evm_selector_string(s),
        Value::Object(map) => {
            if let Some(bn) = map.get("blockNumber") {
                return parse_evm_selector(Some(bn));
            }
            if let Some(Value::String(hash)) = map.get("blockHash") {
                return Ok(HeightSelector::Hash(hash.clone()));
            }
            if let Some(tag) = map.get("blockTag") {
                return parse_evm_selector(Some(tag));
            }
            Err("height not found".to_string())
        }
        _ => Err("invalid height parameter".to_string()),
    }
}

fn parse_evm_selector_string(s: &str) -> Result<HeightSelector, String> {
    match s {
        "latest" | "pending" => Ok(HeightSelector::Latest),
        "earliest" => Ok(HeightSelector::Earliest),
        _ => {
            if let Some(hex) = s.strip_prefix("0x") {
                u64::from_str_radix(hex, 16)
                    .map(HeightSelector::Number)
                    .map_err(|_| "invalid height parameter".to_string())
            } else if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() {
                s.parse::<u64>()
                    .map(HeightSelector::Number)
                    .map_err(|_| "invalid height parameter".to_string())
            } else {
                Err("invalid height parameter".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_or_null_is_unspecified() {
        assert_eq!(parse_evm_selector(None).unwrap(), HeightSelector::Unspecified);
        assert_eq!(
            parse_evm_selector(Some(&Value::Null)).unwrap(),
            HeightSelector::Unspecified
        );
    }

    #[test]
    fn latest_and_pending_and_earliest() {
        assert_eq!(
            parse_evm_selector(Some(&json!("latest"))).unwrap(),
            HeightSelector::Latest
        );
        assert_eq!(
            parse_evm_selector(Some(&json!("pending"))).unwrap(),
            HeightSelector::Latest
        );
        assert_eq!(
            parse_evm_selector(Some(&json!("earliest"))).unwrap(),
            HeightSelector::Earliest
        );
    }

    #[test]
    fn hex_and_decimal() {
        assert_eq!(
            parse_evm_selector(Some(&json!("0x64"))).unwrap(),
            HeightSelector::Number(100)
        );
        assert_eq!(
            parse_evm_selector(Some(&json!("100"))).unwrap(),
            HeightSelector::Number(100)
        );
    }

    #[test]
    fn block_number_object_recurses() {
        assert_eq!(
            parse_evm_selector(Some(&json!({"blockNumber": "0x10"}))).unwrap(),
            HeightSelector::Number(16)
        );
    }

    #[test]
    fn block_hash_object_signals_hash_selector() {
        let sel = parse_evm_selector(Some(&json!({"blockHash": "0xdead"}))).unwrap();
        assert!(sel.is_hash());
        assert_eq!(sel, HeightSelector::Hash("0xdead".to_string()));
    }

    #[test]
    fn block_tag_object_recurses() {
        assert_eq!(
            parse_evm_selector(Some(&json!({"blockTag": "latest"}))).unwrap(),
            HeightSelector::Latest
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_evm_selector(Some(&json!(true))).is_err());
        assert!(parse_evm_selector(Some(&json!({"nonsense": 1}))).is_err());
        assert!(parse_evm_selector(Some(&json!("not-a-number"))).is_err());
    }

    #[test]
    fn as_height_resolves_direct_selectors() {
        assert_eq!(HeightSelector::Latest.as_height(), Some(0));
        assert_eq!(HeightSelector::Earliest.as_height(), Some(1));
        assert_eq!(HeightSelector::Number(42).as_height(), Some(42));
        assert_eq!(HeightSelector::Hash("x".into()).as_height(), None);
    }
}
