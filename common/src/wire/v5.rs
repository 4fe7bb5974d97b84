//! jsonwsp envelopes, as spoken by older nodes

use super::{NormalizeError, OriginTag, WireDecoder, WireVersion};
use crate::{Block, ChainSyncResult, Era, Point, RollForwardBlock, Tip};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

pub const REQUEST_NEXT: &str = r#"{"type":"jsonwsp/request","version":"1.0","servicename":"ogmios","methodname":"RequestNext","args":{}}"#;

pub fn find_intersection(points: &[Point]) -> Result<String, serde_json::Error> {
    let points: Vec<Value> = points.iter().map(point_to_wire).collect();
    serde_json::to_string(&json!({
        "type": "jsonwsp/request",
        "version": "1.0",
        "servicename": "ogmios",
        "methodname": "FindIntersect",
        "args": { "points": points },
        "mirror": { "step": "INIT" },
    }))
}

fn point_to_wire(point: &Point) -> Value {
    match point {
        Point::Origin => json!("origin"),
        Point::Specific(p) => json!({ "slot": p.slot, "hash": p.hash }),
    }
}

pub struct V5Decoder;

impl WireDecoder for V5Decoder {
    fn version(&self) -> WireVersion {
        WireVersion::V5
    }

    fn decode(&self, data: &[u8]) -> Result<Option<ChainSyncResult>, NormalizeError> {
        let Ok(response) = serde_json::from_slice::<Response>(data) else {
            return Ok(None);
        };

        if let Some(fault) = response.fault {
            return Err(NormalizeError::Fault(match fault.code {
                Some(code) => format!("{} ({code})", fault.string),
                None => fault.string,
            }));
        }

        let Some(result) = response.result else {
            return Ok(None);
        };

        let WireResult {
            intersection_found,
            intersection_not_found,
            roll_forward,
            roll_backward,
        } = result;

        if let Some(RollForward { block, tip }) = roll_forward {
            return Ok(Some(ChainSyncResult::RollForward {
                block: block.into_block()?,
                tip: tip.into(),
            }));
        }
        if let Some(RollBackward { point, tip }) = roll_backward {
            return Ok(Some(ChainSyncResult::RollBackward {
                point: point.into(),
                tip: tip.into(),
            }));
        }
        if let Some(IntersectionFound { point, tip }) = intersection_found {
            return Ok(Some(ChainSyncResult::IntersectionFound {
                point: point.into(),
                tip: tip.into(),
            }));
        }
        if let Some(IntersectionNotFound { tip }) = intersection_not_found {
            return Ok(Some(ChainSyncResult::IntersectionNotFound { tip: tip.into() }));
        }
        Ok(None)
    }
}

#[derive(Deserialize)]
struct Response {
    result: Option<WireResult>,
    fault: Option<Fault>,
}

#[derive(Deserialize)]
struct Fault {
    code: Option<String>,
    string: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResult {
    intersection_found: Option<IntersectionFound>,
    intersection_not_found: Option<IntersectionNotFound>,
    roll_forward: Option<RollForward>,
    roll_backward: Option<RollBackward>,
}

#[derive(Deserialize)]
struct IntersectionFound {
    point: WirePoint,
    tip: WireTip,
}

#[derive(Deserialize)]
struct IntersectionNotFound {
    tip: WireTip,
}

#[derive(Deserialize)]
struct RollForward {
    block: EraBlocks,
    tip: WireTip,
}

#[derive(Deserialize)]
struct RollBackward {
    point: WirePoint,
    tip: WireTip,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WirePoint {
    Origin(OriginTag),
    At { slot: u64, hash: String },
}

impl From<WirePoint> for Point {
    fn from(point: WirePoint) -> Self {
        match point {
            WirePoint::Origin(_) => Point::Origin,
            WirePoint::At { slot, hash } => Point::new(slot, hash, 0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTip {
    Origin(OriginTag),
    At {
        slot: u64,
        hash: String,
        #[serde(rename = "blockNo")]
        block_no: u64,
    },
}

impl From<WireTip> for Tip {
    fn from(tip: WireTip) -> Self {
        match tip {
            WireTip::Origin(_) => Tip::default(),
            WireTip::At {
                slot,
                hash,
                block_no,
            } => Tip {
                slot,
                id: hash,
                height: block_no,
            },
        }
    }
}

/// Era-keyed block: one optional field per era
#[derive(Deserialize)]
struct EraBlocks {
    byron: Option<Value>,
    shelley: Option<Block>,
    allegra: Option<Block>,
    mary: Option<Block>,
    alonzo: Option<Block>,
    babbage: Option<Block>,
}

impl EraBlocks {
    /// Walk the eras in priority order and take the first populated one;
    /// none populated means the block is in an era we don't know.
    fn into_block(self) -> Result<Option<RollForwardBlock>, NormalizeError> {
        let EraBlocks {
            byron,
            shelley,
            allegra,
            mary,
            alonzo,
            babbage,
        } = self;

        // Byron blocks have no mapping from this version yet
        if byron.is_some() {
            return Err(NormalizeError::Unsupported {
                era: Era::Byron,
                version: WireVersion::V5,
            });
        }

        let mut populated = [
            (Era::Shelley, shelley),
            (Era::Allegra, allegra),
            (Era::Mary, mary),
            (Era::Alonzo, alonzo),
            (Era::Babbage, babbage),
        ]
        .into_iter()
        .filter_map(|(era, block)| block.map(|b| (era, b)));

        let Some((era, block)) = populated.next() else {
            return Ok(None);
        };
        for (ignored, _) in populated {
            warn!(
                era = era.name(),
                ignored = ignored.name(),
                "block populated for more than one era"
            );
        }
        Ok(RollForwardBlock::from_era(era, block))
    }
}
