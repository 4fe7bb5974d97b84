//! JSON-RPC 2.0 envelopes

use super::{NormalizeError, OriginTag, WireDecoder, WireVersion};
use crate::{
    Block, BlockHeader, ByronBlock, ByronBody, ByronHeader, ChainSyncResult, Era, Point,
    RollForwardBlock, Tip,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const REQUEST_NEXT: &str = r#"{"jsonrpc":"2.0","method":"nextBlock","id":"next"}"#;

pub fn find_intersection(points: &[Point]) -> Result<String, serde_json::Error> {
    let points: Vec<Value> = points.iter().map(point_to_wire).collect();
    serde_json::to_string(&json!({
        "jsonrpc": "2.0",
        "method": "findIntersection",
        "params": { "points": points },
        "id": "init",
    }))
}

fn point_to_wire(point: &Point) -> Value {
    match point {
        Point::Origin => json!("origin"),
        Point::Specific(p) => json!({ "slot": p.slot, "id": p.hash }),
    }
}

pub struct V6Decoder;

impl WireDecoder for V6Decoder {
    fn version(&self) -> WireVersion {
        WireVersion::V6
    }

    fn decode(&self, data: &[u8]) -> Result<Option<ChainSyncResult>, NormalizeError> {
        let Ok(response) = serde_json::from_slice::<Response>(data) else {
            return Ok(None);
        };

        if let (Some(_), Some(error)) = (&response.jsonrpc, response.error) {
            return match error.tip() {
                Some(tip) => Ok(Some(ChainSyncResult::IntersectionNotFound { tip })),
                None => Err(NormalizeError::Fault(format!(
                    "{} (code {})",
                    error.message, error.code
                ))),
            };
        }

        // A populated tip is what marks this as one of ours
        let Some(result) = response.result else {
            return Ok(None);
        };
        let Some(tip) = result.tip else {
            return Ok(None);
        };
        let tip = Tip::from(tip);

        let outcome = match (result.direction, result.intersection) {
            (Some(Direction::Forward), _) => ChainSyncResult::RollForward {
                block: result.block.and_then(WireBlock::into_block),
                tip,
            },
            (Some(Direction::Backward), _) => {
                let point = result.point.ok_or_else(|| {
                    NormalizeError::Malformed("backward direction without a point".to_string())
                })?;
                ChainSyncResult::RollBackward {
                    point: point.into(),
                    tip,
                }
            }
            (None, Some(intersection)) => ChainSyncResult::IntersectionFound {
                point: intersection.into(),
                tip,
            },
            (None, None) => return Ok(None),
        };
        Ok(Some(outcome))
    }
}

#[derive(Deserialize)]
struct Response {
    jsonrpc: Option<String>,
    result: Option<WireResult>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Direction {
    Forward,
    Backward,
}

#[derive(Deserialize)]
struct WireResult {
    direction: Option<Direction>,
    intersection: Option<WirePoint>,
    point: Option<WirePoint>,
    block: Option<WireBlock>,
    tip: Option<WireTip>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    // Only intersection-not-found errors carry a tip
    fn tip(&self) -> Option<Tip> {
        let tip = self.data.as_ref()?.get("tip")?;
        serde_json::from_value::<WireTip>(tip.clone()).ok().map(Tip::from)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WirePoint {
    Origin(OriginTag),
    At { slot: u64, id: String },
}

impl From<WirePoint> for Point {
    fn from(point: WirePoint) -> Self {
        match point {
            WirePoint::Origin(_) => Point::Origin,
            WirePoint::At { slot, id } => Point::new(slot, id, 0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTip {
    Origin(OriginTag),
    At { slot: u64, id: String, height: u64 },
}

impl From<WireTip> for Tip {
    fn from(tip: WireTip) -> Self {
        match tip {
            WireTip::Origin(_) => Tip::default(),
            WireTip::At { slot, id, height } => Tip { slot, id, height },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Issuer {
    verification_key: Option<String>,
}

#[derive(Deserialize)]
struct Size {
    bytes: u64,
}

/// A block in the flat v6 layout, keyed by its `era` field
#[derive(Deserialize)]
struct WireBlock {
    era: String,
    id: String,
    #[serde(default)]
    ancestor: String,
    height: u64,
    // Epoch boundary blocks have no slot of their own
    #[serde(default)]
    slot: u64,
    issuer: Option<Issuer>,
    size: Option<Size>,
    #[serde(default)]
    transactions: Vec<Value>,
}

impl WireBlock {
    fn into_block(self) -> Option<RollForwardBlock> {
        let Some(era) = Era::from_name(&self.era) else {
            debug!(era = self.era.as_str(), height = self.height, "block in unknown era");
            return None;
        };

        match era {
            Era::Byron => Some(RollForwardBlock::Byron(ByronBlock {
                hash: self.id,
                header: ByronHeader {
                    block_height: self.height,
                    slot: self.slot,
                    prev_hash: self.ancestor,
                },
                body: ByronBody {
                    tx_payload: self.transactions,
                },
            })),
            era => RollForwardBlock::from_era(
                era,
                Block {
                    header_hash: self.id,
                    header: BlockHeader {
                        block_height: self.height,
                        slot: self.slot,
                        prev_hash: self.ancestor,
                        issuer_vk: self.issuer.and_then(|i| i.verification_key),
                        block_size: self.size.map(|s| s.bytes),
                    },
                    body: self.transactions,
                },
            ),
        }
    }
}
