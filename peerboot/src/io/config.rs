//! Launcher configuration (TOML).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::topology::{DEFAULT_HOST, check_host, check_port_range};

/// Launcher configuration.
///
/// Every field has a default so a partial file (or none at all) is valid
/// input. CLI flags are layered on top by the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LaunchConfig {
    /// Number of worker slots to launch.
    pub cluster_size: usize,

    /// Port of slot 0; slot `i` listens on `base_port + i`.
    pub base_port: u16,

    /// Host written into every peer endpoint.
    pub host: String,

    /// Worker executable spawned once per slot.
    pub worker_binary: PathBuf,

    /// Opaque worker configuration reference, passed through unchanged.
    pub worker_config: String,

    /// Kill every still-running worker after this many seconds. Unset waits forever.
    pub deadline_secs: Option<u64>,

    /// Redirect each worker's stdout/stderr to `<log_dir>/slot-<i>.log`.
    pub log_dir: Option<PathBuf>,

    /// Write a JSON run report here once every worker has exited.
    pub report_path: Option<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            cluster_size: 4,
            base_port: 8000,
            host: DEFAULT_HOST.to_string(),
            worker_binary: PathBuf::from("peerboot-worker"),
            worker_config: String::new(),
            deadline_secs: None,
            log_dir: None,
            report_path: None,
        }
    }
}

impl LaunchConfig {
    pub fn validate(&self) -> Result<()> {
        check_port_range(self.cluster_size, self.base_port)?;
        check_host(&self.host)?;
        if self.worker_binary.as_os_str().is_empty() {
            return Err(anyhow!("worker_binary must be set"));
        }
        if self.deadline_secs == Some(0) {
            return Err(anyhow!("deadline_secs must be > 0"));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LaunchConfig::default()`.
pub fn load_config(path: &Path) -> Result<LaunchConfig> {
    if !path.exists() {
        let cfg = LaunchConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LaunchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
