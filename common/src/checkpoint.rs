//! Checkpoint store contract: where a session resumes from

use std::future::Future;

use crate::point::{most_recent, Point};
use anyhow::Result;

/// Number of checkpoints kept by default
pub const DEFAULT_RETAINED_CHECKPOINTS: usize = 5;

/// Durable record of recently synced points.
///
/// `load` returns the stored points most recent first. Saving the origin is a
/// no-op; there is nothing to resume from there.
pub trait CheckpointStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Result<Vec<Point>>> + Send;
    fn save(&mut self, point: &Point) -> impl Future<Output = Result<()>> + Send;
}

pub struct InMemoryCheckpointStore {
    points: Vec<Point>,
    retain: usize,
}

impl InMemoryCheckpointStore {
    pub fn new(points: impl IntoIterator<Item = Point>) -> Self {
        Self::with_retention(points, DEFAULT_RETAINED_CHECKPOINTS)
    }

    pub fn with_retention(points: impl IntoIterator<Item = Point>, retain: usize) -> Self {
        let retain = retain.max(1);
        Self {
            points: most_recent(points.into_iter().filter(|p| !p.is_origin()), retain),
            retain,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new([])
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self) -> Result<Vec<Point>> {
        Ok(self.points.clone())
    }

    async fn save(&mut self, point: &Point) -> Result<()> {
        if point.is_origin() {
            return Ok(());
        }
        let points = std::mem::take(&mut self.points);
        self.points = most_recent(points.into_iter().chain([point.clone()]), self.retain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(slot: u64) -> Point {
        Point::new(slot, format!("{slot:064x}"), slot)
    }

    #[tokio::test]
    async fn test_empty_store_loads_nothing() -> Result<()> {
        let store = InMemoryCheckpointStore::default();
        assert!(store.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_keeps_most_recent() -> Result<()> {
        let mut store = InMemoryCheckpointStore::with_retention([], 3);
        for slot in [5, 1, 9, 3, 7] {
            store.save(&point(slot)).await?;
        }
        assert_eq!(store.load().await?, vec![point(9), point(7), point(5)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_saving_origin_is_ignored() -> Result<()> {
        let mut store = InMemoryCheckpointStore::new([point(4)]);
        store.save(&Point::Origin).await?;
        assert_eq!(store.load().await?, vec![point(4)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_save_is_kept_once() -> Result<()> {
        let mut store = InMemoryCheckpointStore::default();
        store.save(&point(2)).await?;
        store.save(&point(2)).await?;
        assert_eq!(store.points().len(), 1);
        Ok(())
    }
}
