use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use ogmios_common::{CheckpointStore, Point};

#[derive(Default)]
struct Inner {
    initial: Vec<Point>,
    saved: Vec<Point>,
}

/// Checkpoint store that records every save. Clones share the record, so a
/// test can keep one handle while the session owns another.
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: Arc<Mutex<Inner>>,
    fail_load: bool,
    fail_save: bool,
}

impl RecordingStore {
    pub fn new(initial: impl IntoIterator<Item = Point>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                initial: initial.into_iter().collect(),
                saved: Vec::new(),
            })),
            ..Self::default()
        }
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn failing_save() -> Self {
        Self {
            fail_save: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every point saved so far, in order
    pub fn saved(&self) -> Vec<Point> {
        self.lock().saved.clone()
    }

    pub fn last_saved(&self) -> Option<Point> {
        self.lock().saved.last().cloned()
    }
}

impl CheckpointStore for RecordingStore {
    async fn load(&self) -> Result<Vec<Point>> {
        if self.fail_load {
            bail!("checkpoint store unavailable");
        }
        Ok(self.lock().initial.clone())
    }

    async fn save(&mut self, point: &Point) -> Result<()> {
        if self.fail_save {
            bail!("checkpoint store is read-only");
        }
        self.lock().saved.push(point.clone());
        Ok(())
    }
}
