//! Canonical chain-sync types, independent of the wire version they came from

use crate::point::{Point, PointStruct};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The upstream node's chain head, as reported with every response
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    /// Slot number
    pub slot: u64,

    /// Block header hash, hex encoded
    pub id: String,

    /// Block height
    pub height: u64,
}

impl Tip {
    pub fn new(slot: u64, id: impl Into<String>, height: u64) -> Self {
        Self {
            slot,
            id: id.into(),
            height,
        }
    }
}

/// Ledger eras a block can be encoded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    Byron,
    Shelley,
    Allegra,
    Mary,
    Alonzo,
    Babbage,
}

impl Era {
    /// All eras, in the priority order used when dispatching era-keyed blocks
    pub const ALL: [Era; 6] = [
        Era::Byron,
        Era::Shelley,
        Era::Allegra,
        Era::Mary,
        Era::Alonzo,
        Era::Babbage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Era::Byron => "byron",
            Era::Shelley => "shelley",
            Era::Allegra => "allegra",
            Era::Mary => "mary",
            Era::Alonzo => "alonzo",
            Era::Babbage => "babbage",
        }
    }

    /// Parse a lowercase era name; unknown names give `None`
    pub fn from_name(name: &str) -> Option<Era> {
        Era::ALL.into_iter().find(|era| era.name() == name)
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header of a post-Byron block
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Block number
    pub block_height: u64,

    /// Slot number
    pub slot: u64,

    /// Hash of the previous block, or "genesis"
    #[serde(default)]
    pub prev_hash: String,

    /// Issuer verification key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_vk: Option<String>,

    /// Serialized block size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u64>,
}

/// A post-Byron block, shared by the Shelley to Babbage eras
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub header_hash: String,
    pub header: BlockHeader,

    /// Transactions, kept as the node rendered them
    #[serde(default)]
    pub body: Vec<serde_json::Value>,
}

/// Header of a Byron block
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByronHeader {
    pub block_height: u64,
    pub slot: u64,
    #[serde(default)]
    pub prev_hash: String,
}

/// Body of a Byron block
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByronBody {
    #[serde(default)]
    pub tx_payload: Vec<serde_json::Value>,
}

/// A Byron block, structurally distinct from the later eras
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByronBlock {
    pub hash: String,
    pub header: ByronHeader,
    #[serde(default)]
    pub body: ByronBody,
}

/// A rolled-forward block in exactly one era
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollForwardBlock {
    Byron(ByronBlock),
    Shelley(Block),
    Allegra(Block),
    Mary(Block),
    Alonzo(Block),
    Babbage(Block),
}

impl RollForwardBlock {
    /// Wrap a post-Byron block for the given era
    pub fn from_era(era: Era, block: Block) -> Option<Self> {
        match era {
            Era::Byron => None,
            Era::Shelley => Some(Self::Shelley(block)),
            Era::Allegra => Some(Self::Allegra(block)),
            Era::Mary => Some(Self::Mary(block)),
            Era::Alonzo => Some(Self::Alonzo(block)),
            Era::Babbage => Some(Self::Babbage(block)),
        }
    }

    pub fn era(&self) -> Era {
        match self {
            Self::Byron(_) => Era::Byron,
            Self::Shelley(_) => Era::Shelley,
            Self::Allegra(_) => Era::Allegra,
            Self::Mary(_) => Era::Mary,
            Self::Alonzo(_) => Era::Alonzo,
            Self::Babbage(_) => Era::Babbage,
        }
    }

    /// Block number, hash and slot regardless of era
    pub fn point_struct(&self) -> PointStruct {
        match self {
            Self::Byron(b) => PointStruct::new(b.header.slot, b.hash.clone(), b.header.block_height),
            Self::Shelley(b)
            | Self::Allegra(b)
            | Self::Mary(b)
            | Self::Alonzo(b)
            | Self::Babbage(b) => {
                PointStruct::new(b.header.slot, b.header_hash.clone(), b.header.block_height)
            }
        }
    }
}

/// One chain-sync outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSyncResult {
    IntersectionFound {
        point: Point,
        tip: Tip,
    },
    IntersectionNotFound {
        tip: Tip,
    },
    /// `block` is `None` when the block was in an era this client doesn't know
    RollForward {
        block: Option<RollForwardBlock>,
        tip: Tip,
    },
    RollBackward {
        point: Point,
        tip: Tip,
    },
}

impl ChainSyncResult {
    pub fn tip(&self) -> &Tip {
        match self {
            Self::IntersectionFound { tip, .. }
            | Self::IntersectionNotFound { tip }
            | Self::RollForward { tip, .. }
            | Self::RollBackward { tip, .. } => tip,
        }
    }

    /// True for responses to a "request next" message
    pub fn is_next_block_response(&self) -> bool {
        matches!(self, Self::RollForward { .. } | Self::RollBackward { .. })
    }

    /// The point of a rolled-forward block, if this is one
    pub fn roll_forward_point(&self) -> Option<PointStruct> {
        match self {
            Self::RollForward {
                block: Some(block), ..
            } => Some(block.point_struct()),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::IntersectionFound { .. } => "IntersectionFound",
            Self::IntersectionNotFound { .. } => "IntersectionNotFound",
            Self::RollForward { .. } => "RollForward",
            Self::RollBackward { .. } => "RollBackward",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(slot: u64, height: u64, hash: &str) -> Block {
        Block {
            header_hash: hash.to_string(),
            header: BlockHeader {
                block_height: height,
                slot,
                prev_hash: "genesis".to_string(),
                issuer_vk: None,
                block_size: None,
            },
            body: vec![],
        }
    }

    #[test]
    fn test_point_struct_for_every_era() {
        for era in Era::ALL.into_iter().filter(|e| *e != Era::Byron) {
            let b = RollForwardBlock::from_era(era, block(100, 7, "ab")).unwrap();
            assert_eq!(b.era(), era);
            assert_eq!(b.point_struct(), PointStruct::new(100, "ab", 7));
        }

        let byron = RollForwardBlock::Byron(ByronBlock {
            hash: "cd".to_string(),
            header: ByronHeader {
                block_height: 3,
                slot: 21,
                prev_hash: String::new(),
            },
            body: ByronBody::default(),
        });
        assert_eq!(byron.point_struct(), PointStruct::new(21, "cd", 3));
    }

    #[test]
    fn test_from_era_refuses_byron() {
        assert!(RollForwardBlock::from_era(Era::Byron, Block::default()).is_none());
    }

    #[test]
    fn test_era_names_round_trip() {
        for era in Era::ALL {
            assert_eq!(Era::from_name(era.name()), Some(era));
        }
        assert_eq!(Era::from_name("conway"), None);
    }

    #[test]
    fn test_roll_forward_point() {
        let tip = Tip::new(200, "ff", 10);
        let forward = ChainSyncResult::RollForward {
            block: RollForwardBlock::from_era(Era::Babbage, block(150, 9, "ee")),
            tip: tip.clone(),
        };
        assert_eq!(forward.roll_forward_point(), Some(PointStruct::new(150, "ee", 9)));
        assert!(forward.is_next_block_response());

        let absent = ChainSyncResult::RollForward {
            block: None,
            tip: tip.clone(),
        };
        assert_eq!(absent.roll_forward_point(), None);

        let found = ChainSyncResult::IntersectionFound {
            point: Point::Origin,
            tip,
        };
        assert!(!found.is_next_block_response());
        assert_eq!(found.tip().slot, 200);
    }
}
