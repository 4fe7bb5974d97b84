//! Response classifier: reads frames in arrival order, hands data frames to
//! the callback, returns credit to the driver and keeps checkpoints current.

use std::sync::Arc;

use anyhow::Result;
use futures::{Stream, StreamExt};
use ogmios_common::{CheckpointStore, ChainSyncResult, Point, wire};
use tokio::select;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    connection::FrameSink, driver::Credits, error::SyncError, recovery_window::RecoveryWindow,
};

/// Receives every data frame, in order, one at a time
pub trait Callback: Send + 'static {
    fn invoke(&mut self, message: &[u8]) -> Result<()>;
}

impl<F> Callback for F
where
    F: FnMut(&[u8]) -> Result<()> + Send + 'static,
{
    fn invoke(&mut self, message: &[u8]) -> Result<()> {
        self(message)
    }
}

/// How the read loop ended
enum Ending {
    /// Our side asked to stop; carries a text frame read just before noticing
    Cancelled(Option<Vec<u8>>),
    /// Close frame or end of stream from the node
    Remote,
}

pub struct ResponseClassifier<R, K, S, C> {
    stream: R,
    sink: Arc<K>,
    store: S,
    callback: C,
    credits: Credits,
    window: RecoveryWindow,
    save_interval: u64,
    cancel: CancellationToken,
    received: u64,
}

impl<R, K, S, C> ResponseClassifier<R, K, S, C>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send,
    K: FrameSink,
    S: CheckpointStore,
    C: Callback,
{
    pub fn new(
        stream: R,
        sink: Arc<K>,
        store: S,
        callback: C,
        credits: Credits,
        save_interval: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            sink,
            store,
            callback,
            credits,
            window: RecoveryWindow::new(),
            save_interval: save_interval.max(1),
            cancel,
            received: 0,
        }
    }

    /// Run until the node closes, the session is cancelled or something
    /// fails. A last checkpoint is attempted on the way out unless the store
    /// itself is what failed.
    pub async fn run(mut self) -> Result<(), SyncError> {
        match self.read_loop().await {
            Ok(Ending::Cancelled(pending)) => {
                info!(received = self.received, "classifier stopping");
                self.checkpoint(pending.as_deref()).await
            }
            Ok(Ending::Remote) => {
                info!(received = self.received, "node ended the session");
                if let Err(e) = self.sink.close().await {
                    debug!("closing after remote close: {e}");
                }
                self.checkpoint(None).await
            }
            Err(e) if e.allows_final_checkpoint() => {
                if let Err(save) = self.checkpoint(None).await {
                    warn!("final checkpoint failed: {save}");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn read_loop(&mut self) -> Result<Ending, SyncError> {
        loop {
            let frame = select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Ending::Cancelled(None)),
                frame = self.stream.next() => frame,
            };

            let message = match frame {
                None => return Ok(Ending::Remote),
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                    return Ok(Ending::Remote);
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(message)) => message,
            };

            // Shutdown takes priority over a frame that raced it
            if self.cancel.is_cancelled() {
                let pending = match message {
                    Message::Text(text) => Some(text.into_bytes()),
                    _ => None,
                };
                return Ok(Ending::Cancelled(pending));
            }

            match message {
                Message::Text(text) => self.handle_data(text.into_bytes()).await?,
                Message::Binary(data) => {
                    warn!(bytes = data.len(), "skipping binary frame");
                }
                Message::Ping(payload) => self.sink.send(Message::Pong(payload)).await?,
                Message::Pong(_) => {}
                Message::Close(frame) => {
                    debug!(?frame, "close frame received");
                    return Ok(Ending::Remote);
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn handle_data(&mut self, message: Vec<u8>) -> Result<(), SyncError> {
        let result = wire::normalize(&message)?;
        if result.is_next_block_response() {
            self.credits.replenish();
        }
        match &result {
            ChainSyncResult::IntersectionFound { point, tip } => {
                info!(%point, tip = tip.slot, "intersection found");
            }
            ChainSyncResult::IntersectionNotFound { tip } => {
                warn!(tip = tip.slot, "no intersection found, following from origin");
            }
            ChainSyncResult::RollBackward { point, .. } => {
                info!(%point, "rolled back");
            }
            ChainSyncResult::RollForward { block, tip } => {
                debug!(
                    slot = block.as_ref().map(|b| b.point_struct().slot),
                    tip = tip.slot,
                    "rolled forward"
                );
            }
        }

        self.callback.invoke(&message).map_err(SyncError::Callback)?;
        self.received += 1;

        if self.received % self.save_interval == 0 {
            self.checkpoint(Some(message.as_slice())).await?;
        }
        self.window.push(message);
        Ok(())
    }

    async fn checkpoint(&mut self, current: Option<&[u8]>) -> Result<(), SyncError> {
        let Some(point) = self.window.recover_point(current) else {
            debug!("nothing to checkpoint yet");
            return Ok(());
        };
        let (slot, height) = (point.slot, point.block_no);
        self.store
            .save(&Point::Specific(point))
            .await
            .map_err(SyncError::Persistence)?;
        info!(slot, height, "saved checkpoint");
        Ok(())
    }
}
