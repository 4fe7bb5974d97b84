//! Ogmios chain-sync session.
//!
//! One WebSocket, four tasks: a lifecycle logger, a socket closer, the
//! pipelining request driver and the response classifier. All of them watch
//! a child of the caller's cancellation token, and any of them ending badly
//! cancels it for the rest.

pub mod classifier;
pub mod configuration;
pub mod connection;
pub mod driver;
pub mod error;
pub mod recovery_window;

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use ogmios_common::{CheckpointStore, MAX_INTERSECTION_POINTS, Point, most_recent, wire::WireVersion};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, debug, error, info, instrument::WithSubscriber};

pub use crate::{
    classifier::Callback,
    configuration::ChainSyncConfig,
    connection::{Connection, FrameSink},
    error::SyncError,
};
use crate::{
    classifier::ResponseClassifier,
    connection::{close_on_cancel, dial},
    driver::{RequestDriver, credit_channel},
};

pub const DEFAULT_PIPELINE_DEPTH: usize = 50;
pub const DEFAULT_SAVE_INTERVAL: u64 = 1000;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Maximum "next block" requests in flight
    pub pipeline_depth: usize,

    /// Checkpoint every this many data messages
    pub save_interval: u64,

    pub handshake_timeout: Duration,

    /// Dialect for outbound requests; inbound accepts both
    pub protocol: WireVersion,

    /// Where session logging goes. The library never installs a global
    /// subscriber; the default discards everything.
    pub logger: Dispatch,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
            save_interval: DEFAULT_SAVE_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            protocol: WireVersion::default(),
            logger: Dispatch::none(),
        }
    }
}

/// Handle to a running session
pub struct ChainSync {
    tasks: JoinSet<Result<(), SyncError>>,
    cancel: CancellationToken,
    logger: Dispatch,
}

impl ChainSync {
    /// Resolve the start points, dial `endpoint` and start the session.
    ///
    /// Explicit `points` take precedence over stored checkpoints; either way
    /// at most five of the most recent are offered, and origin when there
    /// are none. Load and dial failures are returned here, before anything
    /// is spawned.
    pub async fn connect<S, C>(
        cancel: &CancellationToken,
        endpoint: &str,
        options: SyncOptions,
        store: S,
        callback: C,
        points: Vec<Point>,
    ) -> Result<Self, SyncError>
    where
        S: CheckpointStore,
        C: Callback,
    {
        let logger = options.logger.clone();
        Self::start(cancel, endpoint, options, store, callback, points)
            .with_subscriber(logger)
            .await
    }

    async fn start<S, C>(
        cancel: &CancellationToken,
        endpoint: &str,
        options: SyncOptions,
        store: S,
        callback: C,
        points: Vec<Point>,
    ) -> Result<Self, SyncError>
    where
        S: CheckpointStore,
        C: Callback,
    {
        let points = if points.is_empty() {
            store.load().await.map_err(SyncError::Persistence)?
        } else {
            points
        };
        let mut points = most_recent(points, MAX_INTERSECTION_POINTS);
        if points.is_empty() {
            points.push(Point::Origin);
        }

        let ws = dial(endpoint, options.handshake_timeout).await?;
        let (sink, stream) = ws.split();
        let connection = Arc::new(Connection::new(sink));
        let cancel = cancel.child_token();
        let (credits, credit_rx) = credit_channel(options.pipeline_depth);
        let logger = options.logger;
        let mut tasks: JoinSet<Result<(), SyncError>> = JoinSet::new();

        let endpoint = endpoint.to_string();
        let depth = options.pipeline_depth;
        let lifecycle = cancel.clone();
        tasks.spawn(
            async move {
                info!(endpoint = endpoint.as_str(), depth, "chain sync started");
                lifecycle.cancelled().await;
                info!(endpoint = endpoint.as_str(), "chain sync stopping");
                Ok::<_, SyncError>(())
            }
            .with_subscriber(logger.clone()),
        );

        let closer = close_on_cancel(connection.clone(), cancel.clone());
        tasks.spawn(
            async move {
                closer.await;
                Ok::<_, SyncError>(())
            }
            .with_subscriber(logger.clone()),
        );

        let driver = RequestDriver::new(
            connection.clone(),
            credit_rx,
            options.protocol,
            cancel.clone(),
        );
        let guard = cancel.clone().drop_guard();
        tasks.spawn(
            async move {
                let _guard = guard;
                driver.run(points).await
            }
            .with_subscriber(logger.clone()),
        );

        let classifier = ResponseClassifier::new(
            stream,
            connection,
            store,
            callback,
            credits,
            options.save_interval,
            cancel.clone(),
        );
        let guard = cancel.clone().drop_guard();
        tasks.spawn(
            async move {
                let _guard = guard;
                classifier.run().await
            }
            .with_subscriber(logger.clone()),
        );

        Ok(Self {
            tasks,
            cancel,
            logger,
        })
    }

    /// Ask the session to stop. `wait` still reports how it ended.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for every task and return the first error, in completion order
    pub async fn wait(self) -> Result<(), SyncError> {
        let logger = self.logger.clone();
        self.join_all().with_subscriber(logger).await
    }

    async fn join_all(mut self) -> Result<(), SyncError> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.map_err(SyncError::from).and_then(|r| r);
            let Err(e) = result else {
                continue;
            };
            self.cancel.cancel();
            if first_error.is_none() {
                error!("chain sync failed: {e}");
                first_error = Some(e);
            } else {
                debug!("further error after shutdown: {e}");
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                info!("chain sync finished");
                Ok(())
            }
        }
    }
}
