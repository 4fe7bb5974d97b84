use std::{path::PathBuf, time::Duration};

use anyhow::{Result, ensure};
use config::Config;
use ogmios_common::wire::WireVersion;
use tracing::Dispatch;

use crate::SyncOptions;

#[derive(Clone, Debug, serde::Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ChainSyncConfig {
    pub endpoint: String,
    pub pipeline_depth: usize,
    pub save_interval: u64,
    pub handshake_timeout_secs: u64,
    pub protocol: WireVersion,
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
    pub retain_checkpoints: usize,
}

impl ChainSyncConfig {
    pub fn try_load(config: &Config) -> Result<Self> {
        let full_config = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        let cfg: Self = full_config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.pipeline_depth >= 1, "pipeline-depth must be at least 1");
        ensure!(self.save_interval >= 1, "save-interval must be at least 1");
        ensure!(self.retain_checkpoints >= 1, "retain-checkpoints must be at least 1");
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn to_options(&self, logger: Dispatch) -> SyncOptions {
        SyncOptions {
            pipeline_depth: self.pipeline_depth,
            save_interval: self.save_interval,
            handshake_timeout: self.handshake_timeout(),
            protocol: self.protocol,
            logger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(overrides: &[(&str, &str)]) -> Result<ChainSyncConfig> {
        let mut builder = Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        ChainSyncConfig::try_load(&builder.build()?)
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let cfg = load(&[])?;
        assert_eq!(cfg.endpoint, "ws://127.0.0.1:1337");
        assert_eq!(cfg.pipeline_depth, 50);
        assert_eq!(cfg.save_interval, 1000);
        assert_eq!(cfg.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.protocol, WireVersion::V6);
        assert_eq!(cfg.checkpoint_dir, None);
        assert_eq!(cfg.retain_checkpoints, 5);
        Ok(())
    }

    #[test]
    fn test_overrides_win() -> Result<()> {
        let cfg = load(&[
            ("endpoint", "ws://node:1337"),
            ("pipeline-depth", "8"),
            ("protocol", "v5"),
            ("checkpoint-dir", "/var/lib/ogmios"),
        ])?;
        assert_eq!(cfg.endpoint, "ws://node:1337");
        assert_eq!(cfg.pipeline_depth, 8);
        assert_eq!(cfg.protocol, WireVersion::V5);
        assert_eq!(cfg.checkpoint_dir, Some(PathBuf::from("/var/lib/ogmios")));

        let options = cfg.to_options(Dispatch::none());
        assert_eq!(options.pipeline_depth, 8);
        assert_eq!(options.protocol, WireVersion::V5);
        Ok(())
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        assert!(load(&[("pipeline-depth", "0")]).is_err());
        assert!(load(&[("save-interval", "0")]).is_err());
    }
}
