//! Chain points: where a chain-sync session starts, resumes or rolls back to

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Maximum number of points offered in a single find-intersection request
pub const MAX_INTERSECTION_POINTS: usize = 5;

/// Length in bytes of a block header hash
pub const BLOCK_HASH_LEN: usize = 32;

/// A structured (non-origin) point on the chain.
///
/// Field order matters: the derived ordering compares slot first, which is
/// what "most recent" means for a point.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointStruct {
    /// Slot number
    pub slot: u64,

    /// Block header hash, hex encoded
    pub hash: String,

    /// Block number; 0 when the upstream message did not carry one
    #[serde(default)]
    pub block_no: u64,
}

impl PointStruct {
    pub fn new(slot: u64, hash: impl Into<String>, block_no: u64) -> Self {
        Self {
            slot,
            hash: hash.into(),
            block_no,
        }
    }
}

/// A chain point, either the symbolic origin or a specific block.
///
/// `Origin` sorts below every specific point.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Point {
    #[default]
    Origin,
    Specific(PointStruct),
}

impl Point {
    pub fn new(slot: u64, hash: impl Into<String>, block_no: u64) -> Self {
        Point::Specific(PointStruct::new(slot, hash, block_no))
    }

    pub fn is_origin(&self) -> bool {
        matches!(self, Point::Origin)
    }

    pub fn slot(&self) -> Option<u64> {
        match self {
            Point::Origin => None,
            Point::Specific(p) => Some(p.slot),
        }
    }

    pub fn slot_or_default(&self) -> u64 {
        self.slot().unwrap_or_default()
    }

    pub fn as_specific(&self) -> Option<&PointStruct> {
        match self {
            Point::Origin => None,
            Point::Specific(p) => Some(p),
        }
    }
}

impl From<PointStruct> for Point {
    fn from(point: PointStruct) -> Self {
        Point::Specific(point)
    }
}

/// Sort points most recent first, drop duplicates and keep at most `limit`
pub fn most_recent(points: impl IntoIterator<Item = Point>, limit: usize) -> Vec<Point> {
    let mut points: Vec<Point> = points.into_iter().collect();
    points.sort_by(|a, b| b.cmp(a));
    points.dedup();
    points.truncate(limit);
    points
}

const ORIGIN: &str = "origin";

impl Serialize for Point {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Point::Origin => serializer.serialize_str(ORIGIN),
            Point::Specific(p) => p.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum PointRepr {
            Tag(String),
            Specific(PointStruct),
        }

        match PointRepr::deserialize(deserializer)? {
            PointRepr::Tag(tag) if tag == ORIGIN => Ok(Point::Origin),
            PointRepr::Tag(tag) => Err(serde::de::Error::custom(format!(
                "unknown point tag '{tag}'"
            ))),
            PointRepr::Specific(p) => Ok(Point::Specific(p)),
        }
    }
}

// CBOR layout: [] for origin, [slot, hash, block_no] for a specific point.
// The two element form [slot, hash] is accepted on decode.
impl<C> minicbor::Encode<C> for Point {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Point::Origin => {
                e.array(0)?;
            }
            Point::Specific(p) => {
                e.array(3)?.u64(p.slot)?.str(&p.hash)?.u64(p.block_no)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Point {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        match d.array()? {
            Some(0) => Ok(Point::Origin),
            Some(len @ (2 | 3)) => {
                let slot = d.u64()?;
                let hash = d.str()?.to_string();
                let block_no = if len == 3 { d.u64()? } else { 0 };
                Ok(Point::new(slot, hash, block_no))
            }
            Some(len) => Err(minicbor::decode::Error::message(format!(
                "invalid point array length {len}"
            ))),
            None => Err(minicbor::decode::Error::message(
                "indefinite length point array",
            )),
        }
    }
}

/// Errors from parsing the `<slot>.<hash>[.<block_no>]` text form
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PointParseError {
    #[error("expected 'origin' or '<slot>.<hash>', got '{0}'")]
    Format(String),

    #[error("invalid slot '{0}'")]
    Slot(String),

    #[error("invalid block number '{0}'")]
    BlockNo(String),

    #[error("invalid block hash '{hash}': {reason}")]
    Hash { hash: String, reason: String },
}

impl FromStr for Point {
    type Err = PointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(ORIGIN) {
            return Ok(Point::Origin);
        }

        let mut parts = s.split('.');
        let (Some(slot), Some(hash)) = (parts.next(), parts.next()) else {
            return Err(PointParseError::Format(s.to_string()));
        };
        let block_no = parts.next();
        if parts.next().is_some() {
            return Err(PointParseError::Format(s.to_string()));
        }

        let slot = slot.parse::<u64>().map_err(|_| PointParseError::Slot(slot.to_string()))?;
        let bytes = hex::decode(hash).map_err(|e| PointParseError::Hash {
            hash: hash.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.len() != BLOCK_HASH_LEN {
            return Err(PointParseError::Hash {
                hash: hash.to_string(),
                reason: format!("expected {BLOCK_HASH_LEN} bytes, got {}", bytes.len()),
            });
        }
        let block_no = match block_no {
            Some(n) => n.parse::<u64>().map_err(|_| PointParseError::BlockNo(n.to_string()))?,
            None => 0,
        };

        Ok(Point::new(slot, hash.to_lowercase(), block_no))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Origin => write!(f, "{ORIGIN}"),
            Point::Specific(p) if p.block_no == 0 => write!(f, "{}.{}", p.slot, p.hash),
            Point::Specific(p) => write!(f, "{}.{}.{}", p.slot, p.hash, p.block_no),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const HASH: &str = "6558deef007ba372a414466e49214368c17c1f8428093193fc187d1c4587053c";

    #[test]
    fn test_origin_sorts_lowest() {
        let specific = Point::new(0, HASH, 0);
        assert!(Point::Origin < specific);
        assert!(Point::new(10, HASH, 1) > Point::new(9, HASH, 100));
    }

    #[test]
    fn test_most_recent_sorts_descending_and_truncates() {
        let points = (1..=7).map(|slot| Point::new(slot, HASH, slot)).chain([Point::Origin]);
        let recent = most_recent(points, MAX_INTERSECTION_POINTS);
        let slots: Vec<_> = recent.iter().map(|p| p.slot_or_default()).collect();
        assert_eq!(slots, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn test_most_recent_drops_duplicates() {
        let p = Point::new(42, HASH, 3);
        let recent = most_recent([p.clone(), p.clone(), Point::Origin], 5);
        assert_eq!(recent, vec![p, Point::Origin]);
    }

    #[test]
    fn test_json_round_trip() -> Result<()> {
        for point in [Point::Origin, Point::new(134956789, HASH, 9_000_001)] {
            let json = serde_json::to_string(&point)?;
            let decoded: Point = serde_json::from_str(&json)?;
            assert_eq!(decoded, point);
        }
        assert_eq!(serde_json::to_string(&Point::Origin)?, "\"origin\"");
        Ok(())
    }

    #[test]
    fn test_json_rejects_unknown_tag() {
        assert!(serde_json::from_str::<Point>("\"genesis\"").is_err());
    }

    #[test]
    fn test_cbor_round_trip() -> Result<()> {
        for point in [Point::Origin, Point::new(134956789, HASH, 9_000_001)] {
            let bytes = minicbor::to_vec(&point)?;
            let decoded: Point = minicbor::decode(&bytes)?;
            assert_eq!(decoded, point);
        }
        Ok(())
    }

    #[test]
    fn test_cbor_accepts_point_without_block_number() -> Result<()> {
        let mut encoder = minicbor::Encoder::new(Vec::new());
        encoder.array(2)?.u64(17)?.str(HASH)?;
        let bytes = encoder.into_writer();
        let decoded: Point = minicbor::decode(&bytes)?;
        assert_eq!(decoded, Point::new(17, HASH, 0));
        Ok(())
    }

    #[test]
    fn test_parse_text_form() -> Result<()> {
        assert_eq!("origin".parse::<Point>()?, Point::Origin);
        assert_eq!(
            format!("134956789.{HASH}").parse::<Point>()?,
            Point::new(134956789, HASH, 0)
        );
        assert_eq!(
            format!("134956789.{HASH}.77").parse::<Point>()?,
            Point::new(134956789, HASH, 77)
        );
        Ok(())
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!("12345".parse::<Point>(), Err(PointParseError::Format(_))));
        assert!(matches!(
            format!("slot.{HASH}").parse::<Point>(),
            Err(PointParseError::Slot(_))
        ));
        assert!(matches!("12.abcd".parse::<Point>(), Err(PointParseError::Hash { .. })));
        assert!(matches!("12.zz".parse::<Point>(), Err(PointParseError::Hash { .. })));
    }

    #[test]
    fn test_display_matches_parse() -> Result<()> {
        for point in [Point::Origin, Point::new(99, HASH, 0), Point::new(99, HASH, 4_490_511)] {
            assert_eq!(point.to_string().parse::<Point>()?, point);
        }
        assert_eq!(Point::new(99, HASH, 0).to_string(), format!("99.{HASH}"));
        assert_eq!(Point::new(99, HASH, 7).to_string(), format!("99.{HASH}.7"));
        Ok(())
    }
}
