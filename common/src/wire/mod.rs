//! Wire normalization.
//!
//! The node may speak either of two incompatible envelope formats: the older
//! jsonwsp format ("v5") and JSON-RPC 2.0 ("v6"). Every inbound message is
//! offered to an ordered list of decoders; the first one that recognises a
//! chain-sync outcome wins. Nothing outside this module needs to know which
//! version a message came in.

mod v5;
mod v6;

pub use v5::V5Decoder;
pub use v6::V6Decoder;

use crate::{ChainSyncResult, Era, Point};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::debug;

/// Envelope format spoken on the socket
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVersion {
    V5,
    #[default]
    V6,
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireVersion::V5 => write!(f, "v5"),
            WireVersion::V6 => write!(f, "v6"),
        }
    }
}

impl FromStr for WireVersion {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v5" | "5" => Ok(WireVersion::V5),
            "v6" | "6" => Ok(WireVersion::V6),
            other => Err(NormalizeError::Malformed(format!(
                "unknown wire version '{other}'"
            ))),
        }
    }
}

/// Reasons a message could not be turned into a [`ChainSyncResult`]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// Matches neither wire version
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Recognised, but this client has no mapping for it
    #[error("{era} blocks are not supported in {version} responses")]
    Unsupported { era: Era, version: WireVersion },

    /// The node answered with an error instead of a result
    #[error("node reported a fault: {0}")]
    Fault(String),
}

/// One wire version's decoder.
///
/// `Ok(None)` means "not mine" and the next decoder is tried. `Err` means the
/// message was recognised but cannot be mapped, which stops the cascade.
pub trait WireDecoder: Send + Sync {
    fn version(&self) -> WireVersion;
    fn decode(&self, data: &[u8]) -> Result<Option<ChainSyncResult>, NormalizeError>;
}

/// Decoders in the order they are tried
pub static DECODERS: [&dyn WireDecoder; 2] = [&V6Decoder, &V5Decoder];

/// Decode one raw message into its canonical chain-sync outcome
pub fn normalize(data: &[u8]) -> Result<ChainSyncResult, NormalizeError> {
    for decoder in DECODERS.iter() {
        if let Some(result) = decoder.decode(data)? {
            debug!(version = %decoder.version(), kind = result.kind(), "normalized");
            return Ok(result);
        }
    }
    Err(NormalizeError::Malformed(describe(data)))
}

/// Build the find-intersection request for the given points
pub fn find_intersection(version: WireVersion, points: &[Point]) -> Result<String, serde_json::Error> {
    match version {
        WireVersion::V5 => v5::find_intersection(points),
        WireVersion::V6 => v6::find_intersection(points),
    }
}

/// The fixed request-next message
pub fn request_next(version: WireVersion) -> &'static str {
    match version {
        WireVersion::V5 => v5::REQUEST_NEXT,
        WireVersion::V6 => v6::REQUEST_NEXT,
    }
}

/// Both versions render the origin point and tip as the bare string "origin"
#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum OriginTag {
    Origin,
}

const PREVIEW_LEN: usize = 120;

fn describe(data: &[u8]) -> String {
    match serde_json::from_slice::<serde::de::IgnoredAny>(data) {
        Err(e) => format!("invalid JSON: {e}"),
        Ok(_) => {
            let text = String::from_utf8_lossy(data);
            let preview: String = text.chars().take(PREVIEW_LEN).collect();
            format!("no chain-sync outcome in {preview}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PointStruct, RollForwardBlock, Tip};
    use anyhow::Result;
    use ogmios_test_utils::{block_hash, v5, v6};

    #[test]
    fn test_v6_and_v5_roll_forward_are_equal() -> Result<()> {
        for era in ["shelley", "allegra", "mary", "alonzo", "babbage"] {
            let from_v6 = normalize(v6::roll_forward(era, 4_492_800, 4_490_511).as_bytes())?;
            let from_v5 = normalize(v5::roll_forward(era, 4_492_800, 4_490_511).as_bytes())?;
            assert_eq!(from_v6, from_v5, "era {era}");
            assert_eq!(
                from_v6.roll_forward_point(),
                Some(PointStruct::new(4_492_800, block_hash(4_490_511), 4_490_511))
            );
        }
        Ok(())
    }

    #[test]
    fn test_v5_byron_block_is_unsupported() {
        let result = normalize(v5::roll_forward("byron", 20, 19).as_bytes());
        assert_eq!(
            result,
            Err(NormalizeError::Unsupported {
                era: Era::Byron,
                version: WireVersion::V5
            })
        );
    }

    #[test]
    fn test_v6_byron_block_is_mapped() -> Result<()> {
        let result = normalize(v6::roll_forward("byron", 20, 19).as_bytes())?;
        let ChainSyncResult::RollForward { block: Some(block), tip } = result else {
            panic!("expected a roll forward with a block");
        };
        assert!(matches!(block, RollForwardBlock::Byron(_)));
        assert_eq!(block.point_struct(), PointStruct::new(20, block_hash(19), 19));
        assert_eq!(tip.slot, 20);
        Ok(())
    }

    #[test]
    fn test_unknown_era_gives_absent_block() -> Result<()> {
        for message in [v6::roll_forward("conway", 9, 8), v5::roll_forward("conway", 9, 8)] {
            let result = normalize(message.as_bytes())?;
            assert!(matches!(result, ChainSyncResult::RollForward { block: None, .. }));
        }
        Ok(())
    }

    #[test]
    fn test_v5_block_with_two_eras_takes_the_first() -> Result<()> {
        let message = serde_json::json!({
            "type": "jsonwsp/response",
            "result": { "RollForward": {
                "block": {
                    "alonzo": { "headerHash": "bb", "header": { "blockHeight": 2, "slot": 2 } },
                    "mary": { "headerHash": "aa", "header": { "blockHeight": 1, "slot": 1 } }
                },
                "tip": { "slot": 2, "hash": "bb", "blockNo": 2 }
            }}
        });
        let result = normalize(message.to_string().as_bytes())?;
        let ChainSyncResult::RollForward { block: Some(block), .. } = result else {
            panic!("expected a roll forward with a block");
        };
        assert_eq!(block.era(), Era::Mary);
        assert_eq!(block.point_struct(), PointStruct::new(1, "aa", 1));
        Ok(())
    }

    #[test]
    fn test_intersections_are_equal_across_versions() -> Result<()> {
        let found_v6 = normalize(v6::intersection_found(1000, 900).as_bytes())?;
        let found_v5 = normalize(v5::intersection_found(1000, 900).as_bytes())?;
        assert_eq!(found_v6, found_v5);
        assert_eq!(
            found_v6,
            ChainSyncResult::IntersectionFound {
                point: Point::new(1000, block_hash(900), 0),
                tip: Tip::new(1000, block_hash(1000), 1000),
            }
        );

        let origin = normalize(v6::intersection_found_origin(50).as_bytes())?;
        assert!(matches!(
            origin,
            ChainSyncResult::IntersectionFound {
                point: Point::Origin,
                ..
            }
        ));

        let missing_v6 = normalize(v6::intersection_not_found(77).as_bytes())?;
        let missing_v5 = normalize(v5::intersection_not_found(77).as_bytes())?;
        assert_eq!(missing_v6, missing_v5);
        assert!(matches!(missing_v6, ChainSyncResult::IntersectionNotFound { .. }));
        Ok(())
    }

    #[test]
    fn test_roll_backward_is_equal_across_versions() -> Result<()> {
        let from_v6 = normalize(v6::roll_backward(300, 280).as_bytes())?;
        let from_v5 = normalize(v5::roll_backward(300, 280).as_bytes())?;
        assert_eq!(from_v6, from_v5);
        let ChainSyncResult::RollBackward { point, .. } = from_v6 else {
            panic!("expected a roll backward");
        };
        assert_eq!(point, Point::new(300, block_hash(280), 0));
        Ok(())
    }

    #[test]
    fn test_valid_json_matching_neither_version_is_malformed() {
        let result = normalize(v6::malformed().as_bytes());
        assert!(matches!(result, Err(NormalizeError::Malformed(_))));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let Err(NormalizeError::Malformed(reason)) = normalize(b"{not json") else {
            panic!("expected a malformed error");
        };
        assert!(reason.starts_with("invalid JSON"));
    }

    #[test]
    fn test_faults_are_reported() {
        let rpc_error = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "nextBlock",
            "error": { "code": -32600, "message": "Invalid request" },
            "id": null
        });
        assert!(matches!(
            normalize(rpc_error.to_string().as_bytes()),
            Err(NormalizeError::Fault(_))
        ));

        let fault = serde_json::json!({
            "type": "jsonwsp/fault",
            "fault": { "code": "client", "string": "Invalid request" }
        });
        assert!(matches!(
            normalize(fault.to_string().as_bytes()),
            Err(NormalizeError::Fault(_))
        ));
    }

    #[test]
    fn test_find_intersection_requests() -> Result<()> {
        let points = [Point::new(10, "aa", 1), Point::Origin];

        let request: serde_json::Value =
            serde_json::from_str(&find_intersection(WireVersion::V6, &points)?)?;
        assert_eq!(request["method"], "findIntersection");
        assert_eq!(request["params"]["points"][0]["id"], "aa");
        assert_eq!(request["params"]["points"][1], "origin");

        let request: serde_json::Value =
            serde_json::from_str(&find_intersection(WireVersion::V5, &points)?)?;
        assert_eq!(request["methodname"], "FindIntersect");
        assert_eq!(request["args"]["points"][0]["hash"], "aa");
        assert_eq!(request["args"]["points"][1], "origin");
        Ok(())
    }

    #[test]
    fn test_request_next_is_valid_json() -> Result<()> {
        let v6: serde_json::Value = serde_json::from_str(request_next(WireVersion::V6))?;
        assert_eq!(v6["method"], "nextBlock");
        let v5: serde_json::Value = serde_json::from_str(request_next(WireVersion::V5))?;
        assert_eq!(v5["methodname"], "RequestNext");
        Ok(())
    }

    #[test]
    fn test_wire_version_parse() -> Result<()> {
        assert_eq!("v5".parse::<WireVersion>()?, WireVersion::V5);
        assert_eq!("V6".parse::<WireVersion>()?, WireVersion::V6);
        assert!("v7".parse::<WireVersion>().is_err());
        Ok(())
    }
}
