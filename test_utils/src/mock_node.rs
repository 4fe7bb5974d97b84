//! A scripted WebSocket peer standing in for an Ogmios node

use std::future::Future;

use anyhow::{bail, Result};
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::debug;

/// Accepted server side of one client connection
pub struct NodeSocket {
    ws: WebSocketStream<tokio::net::TcpStream>,
}

impl NodeSocket {
    /// Next text frame from the client, skipping control frames. `None` once
    /// the client has closed or gone away.
    pub async fn recv_text(&mut self) -> Option<String> {
        while let Some(message) = self.ws.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    }

    /// Like `recv_text`, but a closed connection is an error
    pub async fn expect_text(&mut self) -> Result<String> {
        match self.recv_text().await {
            Some(text) => Ok(text),
            None => bail!("client closed before sending a request"),
        }
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.ws.send(Message::Binary(data)).await?;
        Ok(())
    }

    /// Send a close frame and drain until the client acknowledges
    pub async fn close(&mut self) -> Result<()> {
        self.ws.close(None).await?;
        while let Some(Ok(_)) = self.ws.next().await {}
        Ok(())
    }

    /// Drain frames until the client closes, returning how many text frames
    /// arrived in the meantime
    pub async fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.recv_text().await.is_some() {
            count += 1;
        }
        count
    }
}

/// A node listening on an ephemeral local port
pub struct MockNode {
    pub endpoint: String,
    handle: JoinHandle<Result<()>>,
}

impl MockNode {
    /// Accept exactly one connection and hand it to `script`
    pub async fn spawn<F, Fut>(script: F) -> Result<Self>
    where
        F: FnOnce(NodeSocket) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let endpoint = format!("ws://{}", listener.local_addr()?);
        debug!(endpoint = endpoint.as_str(), "mock node listening");

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let ws = accept_async(stream).await?;
            script(NodeSocket { ws }).await
        });

        Ok(Self { endpoint, handle })
    }

    /// Wait for the script to finish and surface its result
    pub async fn finish(self) -> Result<()> {
        self.handle.await?
    }
}
