//! On-disk checkpoint store.
//!
//! Points live in a single fjall partition keyed by big-endian slot followed
//! by the raw block hash, so key order is chain order and the most recent
//! checkpoints are at the end. Values are the CBOR encoded point.

use std::path::Path;

use anyhow::Result;
use fjall::{Keyspace, Partition, PartitionCreateOptions, PersistMode};
use minicbor::{decode, to_vec};
use ogmios_common::{
    CheckpointStore, Point, PointStruct, checkpoint::DEFAULT_RETAINED_CHECKPOINTS,
};
use tokio::task;
use tracing::{debug, info};

const PARTITION: &str = "checkpoints";

pub struct FjallCheckpointStore {
    keyspace: Keyspace,
    points: Partition,
    retain: usize,
}

impl FjallCheckpointStore {
    pub fn open(path: impl AsRef<Path>, retain: usize) -> Result<Self> {
        let path = path.as_ref();
        let keyspace = Keyspace::open(fjall::Config::new(path))?;
        let points = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        info!(path = %path.display(), retain, "opened checkpoint store");
        Ok(Self {
            keyspace,
            points,
            retain: retain.max(1),
        })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, DEFAULT_RETAINED_CHECKPOINTS)
    }
}

fn point_key(point: &PointStruct) -> Vec<u8> {
    // Hashes are hex; anything else is stored as its text
    let hash = hex::decode(&point.hash).unwrap_or_else(|_| point.hash.as_bytes().to_vec());
    let mut key = Vec::with_capacity(8 + hash.len());
    key.extend_from_slice(&point.slot.to_be_bytes());
    key.extend_from_slice(&hash);
    key
}

impl CheckpointStore for FjallCheckpointStore {
    async fn load(&self) -> Result<Vec<Point>> {
        let points = self.points.clone();
        let retain = self.retain;
        task::spawn_blocking(move || {
            points
                .iter()
                .rev()
                .take(retain)
                .map(|entry| -> Result<Point> {
                    let (_, value) = entry?;
                    Ok(decode::<Point>(&value)?)
                })
                .collect::<Result<Vec<_>>>()
        })
        .await?
    }

    async fn save(&mut self, point: &Point) -> Result<()> {
        let Some(specific) = point.as_specific() else {
            return Ok(());
        };
        let key = point_key(specific);
        let value = to_vec(point)?;
        let keyspace = self.keyspace.clone();
        let points = self.points.clone();
        let retain = self.retain;

        task::spawn_blocking(move || {
            points.insert(&key, value)?;

            let stale = points
                .iter()
                .rev()
                .skip(retain)
                .map(|entry| entry.map(|(key, _)| key))
                .collect::<fjall::Result<Vec<_>>>()?;
            if !stale.is_empty() {
                let mut batch = keyspace.batch();
                let pruned = stale.len();
                for key in stale {
                    batch.remove(&points, key);
                }
                batch.commit()?;
                debug!(pruned, "pruned old checkpoints");
            }

            keyspace.persist(PersistMode::SyncAll)?;
            Ok::<_, anyhow::Error>(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn point(slot: u64) -> Point {
        Point::new(slot, format!("{slot:064x}"), slot + 1)
    }

    #[tokio::test]
    async fn test_load_returns_most_recent_first() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = FjallCheckpointStore::open(dir.path(), 3)?;
        for slot in [40, 10, 50, 20, 30] {
            store.save(&point(slot)).await?;
        }
        assert_eq!(store.load().await?, vec![point(50), point(40), point(30)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_saves_are_idempotent() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = FjallCheckpointStore::open_default(dir.path())?;
        store.save(&point(7)).await?;
        store.save(&point(7)).await?;
        assert_eq!(store.load().await?, vec![point(7)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_origin_is_not_stored() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = FjallCheckpointStore::open_default(dir.path())?;
        store.save(&Point::Origin).await?;
        assert!(store.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_checkpoints_survive_reopen() -> Result<()> {
        let dir = TempDir::new()?;
        {
            let mut store = FjallCheckpointStore::open_default(dir.path())?;
            store.save(&point(100)).await?;
            store.save(&point(200)).await?;
        }
        let store = FjallCheckpointStore::open_default(dir.path())?;
        assert_eq!(store.load().await?, vec![point(200), point(100)]);
        Ok(())
    }

    #[test]
    fn test_keys_follow_slot_order() {
        let low = point_key(&PointStruct::new(255, "ff", 0));
        let high = point_key(&PointStruct::new(256, "00", 0));
        assert!(low < high);
        assert_eq!(low.len(), 9);
    }
}
