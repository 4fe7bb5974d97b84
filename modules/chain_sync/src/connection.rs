//! The socket: dialing, and a write half shared between tasks

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::{Sink, SinkExt, stream::SplitSink};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SyncError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a connection, as seen by the driver and classifier
pub trait FrameSink: Send + Sync + 'static {
    fn send(&self, message: Message) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Close the socket. Only the first call does anything; it returns `true`.
    fn close(&self) -> impl Future<Output = Result<bool, SyncError>> + Send;
}

/// Open a WebSocket to `endpoint`, giving up after `timeout`
pub async fn dial(endpoint: &str, timeout: Duration) -> Result<WsStream, SyncError> {
    match tokio::time::timeout(timeout, connect_async(endpoint)).await {
        Err(_) => Err(SyncError::HandshakeTimeout {
            endpoint: endpoint.to_string(),
            timeout,
        }),
        Ok(Err(source)) => Err(SyncError::Connection {
            endpoint: endpoint.to_string(),
            source,
        }),
        Ok(Ok((ws, response))) => {
            debug!(endpoint, status = %response.status(), "websocket handshake complete");
            Ok(ws)
        }
    }
}

/// Close `sink` once `cancel` fires. A failed close is only logged, so the
/// session ends with whatever the classifier's final save reports.
pub async fn close_on_cancel<K: FrameSink>(sink: Arc<K>, cancel: CancellationToken) {
    cancel.cancelled().await;
    match sink.close().await {
        Ok(true) => debug!("socket closed"),
        Ok(false) => {}
        Err(e) => warn!("closing socket failed: {e}"),
    }
}

/// Write half behind an async mutex, with a single-close guard
pub struct Connection<S = SplitSink<WsStream, Message>> {
    sink: Mutex<S>,
    closed: AtomicBool,
}

impl<S> Connection<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<S> FrameSink for Connection<S>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin + Send + 'static,
{
    async fn send(&self, message: Message) -> Result<(), SyncError> {
        if self.is_closed() {
            return Err(SyncError::Transport(tungstenite::Error::AlreadyClosed));
        }
        self.sink.lock().await.send(message).await?;
        Ok(())
    }

    async fn close(&self) -> Result<bool, SyncError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) => Ok(true),
            // The peer got there first
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }
}
