//! 'main' for the Ogmios chain-sync follower

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use ogmios_common::{
    wire::{self, WireVersion},
    ChainSyncResult, CheckpointStore, InMemoryCheckpointStore, Point,
};
use ogmios_module_chain_sync::{ChainSync, ChainSyncConfig};
use ogmios_module_checkpoint_store::FjallCheckpointStore;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Dispatch};
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Parser)]
#[command(name = "ogmios-chain-sync", about = "Follow the chain from an Ogmios node")]
struct Args {
    /// Configuration files, later ones win
    #[arg(long, value_name = "PATH", default_values_t = vec!["ogmios-chain-sync.toml".to_string()])]
    config: Vec<String>,

    /// Ogmios WebSocket endpoint
    #[arg(long, env = "OGMIOS_ENDPOINT")]
    endpoint: Option<String>,

    /// Start from these points instead of stored checkpoints ("origin" or <slot>.<hash>)
    #[arg(long = "point", value_name = "POINT")]
    points: Vec<Point>,

    #[arg(long)]
    pipeline_depth: Option<u64>,

    #[arg(long)]
    save_interval: Option<u64>,

    #[arg(long, value_name = "DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Outbound dialect, "v6" or "v5"
    #[arg(long)]
    protocol: Option<WireVersion>,
}

impl Args {
    /// Layer config files, then OGMIOS_* environment, then flags
    fn load_config(&self) -> Result<ChainSyncConfig> {
        let mut builder = Config::builder();
        for file in &self.config {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        let config = builder
            .add_source(Environment::with_prefix("OGMIOS").convert_case(config::Case::Kebab))
            .set_override_option("endpoint", self.endpoint.clone())?
            .set_override_option("pipeline-depth", self.pipeline_depth)?
            .set_override_option("save-interval", self.save_interval)?
            .set_override_option(
                "checkpoint-dir",
                self.checkpoint_dir.as_ref().map(|dir| dir.to_string_lossy().into_owned()),
            )?
            .set_override_option("protocol", self.protocol.map(|p| p.to_string()))?
            .build()?;
        ChainSyncConfig::try_load(&config)
    }
}

/// Log one chain-sync event
fn log_event(message: &[u8]) -> Result<()> {
    match wire::normalize(message)? {
        ChainSyncResult::RollForward {
            block: Some(block),
            tip,
        } => {
            let point = block.point_struct();
            info!(
                era = block.era().name(),
                slot = point.slot,
                height = point.block_no,
                tip = tip.slot,
                "roll forward"
            );
        }
        ChainSyncResult::RollForward { block: None, tip } => {
            info!(tip = tip.slot, "roll forward in an unknown era");
        }
        ChainSyncResult::RollBackward { point, tip } => {
            info!(%point, tip = tip.slot, "roll backward");
        }
        ChainSyncResult::IntersectionFound { point, tip } => {
            info!(%point, tip = tip.slot, "intersection found");
        }
        ChainSyncResult::IntersectionNotFound { tip } => {
            warn!(tip = tip.slot, "intersection not found");
        }
    }
    Ok(())
}

async fn follow<S: CheckpointStore>(
    cfg: &ChainSyncConfig,
    logger: Dispatch,
    store: S,
    points: Vec<Point>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let session = ChainSync::connect(
        &cancel,
        &cfg.endpoint,
        cfg.to_options(logger),
        store,
        log_event,
        points,
    )
    .await
    .with_context(|| format!("could not start chain sync against {}", cfg.endpoint))?;

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, stopping");
        }
        interrupt.cancel();
    });

    session.wait().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise INFO, with fjall kept quiet
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fjall=warn"));
    let logger = Dispatch::new(tracing_subscriber::fmt().with_env_filter(filter).finish());
    tracing::dispatcher::set_global_default(logger.clone())?;

    let cfg = args.load_config()?;
    info!(endpoint = cfg.endpoint.as_str(), protocol = %cfg.protocol, "Ogmios chain-sync follower");

    match &cfg.checkpoint_dir {
        Some(dir) => {
            let store = FjallCheckpointStore::open(dir, cfg.retain_checkpoints)
                .with_context(|| format!("could not open checkpoint store in {}", dir.display()))?;
            follow(&cfg, logger, store, args.points).await?;
        }
        None => {
            let store = InMemoryCheckpointStore::with_retention([], cfg.retain_checkpoints);
            follow(&cfg, logger, store, args.points).await?;
        }
    }

    info!("Exiting");
    Ok(())
}
