//! Canned node responses in both wire versions.
//!
//! Blocks and tips are synthetic but self-consistent: the block at height `h`
//! has hash `block_hash(h)`, its ancestor is `block_hash(h - 1)`, and a tip at
//! slot `s` reports height `s` and hash `block_hash(s)`.

use serde_json::{json, Value};

pub const ISSUER_VK: &str = "8b0960d234bda67d52432c5d1a26aca2bfb5b9a09f966d9592a7bf0c728a1ecd";
pub const BLOCK_SIZE: u64 = 1024;

/// Deterministic 32 byte hex hash for a height or slot
pub fn block_hash(n: u64) -> String {
    format!("{n:064x}")
}

fn ancestor(height: u64) -> String {
    match height {
        0 => "genesis".to_string(),
        h => block_hash(h - 1),
    }
}

pub mod v6 {
    use super::*;

    fn tip(slot: u64) -> Value {
        json!({ "slot": slot, "id": block_hash(slot), "height": slot })
    }

    fn response(method: &str, result: Value) -> String {
        json!({ "jsonrpc": "2.0", "method": method, "result": result, "id": null }).to_string()
    }

    pub fn block(era: &str, slot: u64, height: u64) -> Value {
        let kind = if era == "byron" { "bft" } else { "praos" };
        json!({
            "type": kind,
            "era": era,
            "id": block_hash(height),
            "ancestor": ancestor(height),
            "height": height,
            "slot": slot,
            "issuer": { "verificationKey": ISSUER_VK },
            "size": { "bytes": BLOCK_SIZE },
            "transactions": []
        })
    }

    pub fn roll_forward(era: &str, slot: u64, height: u64) -> String {
        response(
            "nextBlock",
            json!({ "direction": "forward", "block": block(era, slot, height), "tip": tip(slot) }),
        )
    }

    pub fn roll_backward(slot: u64, height: u64) -> String {
        response(
            "nextBlock",
            json!({
                "direction": "backward",
                "point": { "slot": slot, "id": block_hash(height) },
                "tip": tip(slot)
            }),
        )
    }

    pub fn intersection_found(slot: u64, height: u64) -> String {
        response(
            "findIntersection",
            json!({ "intersection": { "slot": slot, "id": block_hash(height) }, "tip": tip(slot) }),
        )
    }

    pub fn intersection_found_origin(tip_slot: u64) -> String {
        response(
            "findIntersection",
            json!({ "intersection": "origin", "tip": tip(tip_slot) }),
        )
    }

    pub fn intersection_not_found(tip_slot: u64) -> String {
        json!({
            "jsonrpc": "2.0",
            "method": "findIntersection",
            "error": {
                "code": 1000,
                "message": "No intersection found.",
                "data": { "tip": tip(tip_slot) }
            },
            "id": null
        })
        .to_string()
    }

    /// Valid JSON that neither wire version recognises
    pub fn malformed() -> String {
        json!({ "jsonrpc": "2.0", "method": "nextBlock", "result": { "direction": "forward" }, "id": null })
            .to_string()
    }
}

pub mod v5 {
    use super::*;

    fn tip(slot: u64) -> Value {
        json!({ "slot": slot, "hash": block_hash(slot), "blockNo": slot })
    }

    fn response(methodname: &str, result: Value) -> String {
        json!({
            "type": "jsonwsp/response",
            "version": "1.0",
            "servicename": "ogmios",
            "methodname": methodname,
            "result": result,
            "reflection": null
        })
        .to_string()
    }

    pub fn block(era: &str, slot: u64, height: u64) -> Value {
        let inner = if era == "byron" {
            json!({
                "hash": block_hash(height),
                "header": { "blockHeight": height, "slot": slot, "prevHash": ancestor(height) },
                "body": { "txPayload": [] }
            })
        } else {
            json!({
                "headerHash": block_hash(height),
                "header": {
                    "blockHeight": height,
                    "slot": slot,
                    "prevHash": ancestor(height),
                    "issuerVk": ISSUER_VK,
                    "blockSize": BLOCK_SIZE
                },
                "body": []
            })
        };
        json!({ era: inner })
    }

    pub fn roll_forward(era: &str, slot: u64, height: u64) -> String {
        response(
            "RequestNext",
            json!({ "RollForward": { "block": block(era, slot, height), "tip": tip(slot) } }),
        )
    }

    pub fn roll_backward(slot: u64, height: u64) -> String {
        response(
            "RequestNext",
            json!({ "RollBackward": {
                "point": { "slot": slot, "hash": block_hash(height) },
                "tip": tip(slot)
            }}),
        )
    }

    pub fn intersection_found(slot: u64, height: u64) -> String {
        response(
            "FindIntersect",
            json!({ "IntersectionFound": {
                "point": { "slot": slot, "hash": block_hash(height) },
                "tip": tip(slot)
            }}),
        )
    }

    pub fn intersection_not_found(tip_slot: u64) -> String {
        response(
            "FindIntersect",
            json!({ "IntersectionNotFound": { "tip": tip(tip_slot) } }),
        )
    }
}
