//! Pipelining request driver.
//!
//! Sends the find-intersection request, then one "request next" per credit.
//! Credits come back from the classifier as next-block responses arrive, so
//! the number of unanswered requests never exceeds the pipeline depth.

use std::sync::Arc;

use ogmios_common::{Point, wire, wire::WireVersion};
use tokio::{
    select,
    sync::mpsc::{self, error::TrySendError},
};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{connection::FrameSink, error::SyncError};

/// Upper bound on the credits available before the first response
pub const MAX_INITIAL_CREDITS: usize = 64;

/// Classifier-side handle for returning credit to the driver
#[derive(Clone)]
pub struct Credits {
    tx: mpsc::Sender<()>,
}

impl Credits {
    /// Return one credit without blocking. A full channel drops it.
    pub fn replenish(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("credit channel full, dropping credit");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

/// Credit channel sized to `depth`, pre-filled with `min(depth, 64)` credits
pub fn credit_channel(depth: usize) -> (Credits, mpsc::Receiver<()>) {
    let depth = depth.max(1);
    let (tx, rx) = mpsc::channel(depth);
    for _ in 0..depth.min(MAX_INITIAL_CREDITS) {
        if tx.try_send(()).is_err() {
            break;
        }
    }
    (Credits { tx }, rx)
}

pub struct RequestDriver<K> {
    sink: Arc<K>,
    credits: mpsc::Receiver<()>,
    version: WireVersion,
    cancel: CancellationToken,
}

impl<K: FrameSink> RequestDriver<K> {
    pub fn new(
        sink: Arc<K>,
        credits: mpsc::Receiver<()>,
        version: WireVersion,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sink,
            credits,
            version,
            cancel,
        }
    }

    /// Run until cancelled or a write fails
    pub async fn run(mut self, points: Vec<Point>) -> Result<(), SyncError> {
        let request = wire::find_intersection(self.version, &points)?;
        if !self.write(request).await? {
            return Ok(());
        }
        info!(
            points = points.len(),
            newest = %points.first().cloned().unwrap_or_default(),
            "requested intersection"
        );

        let next = wire::request_next(self.version);
        let mut sent: u64 = 0;
        loop {
            let credit = select! {
                biased;
                _ = self.cancel.cancelled() => None,
                credit = self.credits.recv() => credit,
            };
            // Cancelled, or the classifier has gone away
            if credit.is_none() {
                break;
            }
            if !self.write(next.to_string()).await? {
                break;
            }
            sent += 1;
        }

        debug!(sent, "driver stopped");
        Ok(())
    }

    // Ok(false) when cancelled mid-write
    async fn write(&self, text: String) -> Result<bool, SyncError> {
        select! {
            biased;
            _ = self.cancel.cancelled() => Ok(false),
            res = self.sink.send(Message::Text(text)) => res.map(|_| true),
        }
    }
}
