//! Test-only helpers: scripted identity providers and scratch worker configs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rand::rngs::StdRng;
use tempfile::TempDir;

use crate::core::identity::{Ed25519Provider, Identity, IdentityProvider};
use crate::core::topology::{ClusterTopology, Peer};
use crate::worker::WorkerSettings;

/// Seeded provider that counts `generate` calls.
pub struct CountingProvider {
    pub calls: usize,
    inner: Ed25519Provider<StdRng>,
}

impl Default for CountingProvider {
    fn default() -> Self {
        Self {
            calls: 0,
            inner: Ed25519Provider::seeded(0),
        }
    }
}

impl IdentityProvider for CountingProvider {
    fn generate(&mut self) -> Result<Identity> {
        self.calls += 1;
        self.inner.generate()
    }
}

/// Provider whose entropy source dies on call number `fail_at` (0-based).
pub struct FailingProvider {
    pub fail_at: usize,
    pub calls: usize,
}

impl IdentityProvider for FailingProvider {
    fn generate(&mut self) -> Result<Identity> {
        let call = self.calls;
        self.calls += 1;
        if call == self.fail_at {
            return Err(anyhow!("entropy source unavailable"));
        }
        Ed25519Provider::seeded(call as u64).generate()
    }
}

/// Build a topology from raw peers, bypassing the builder (for invariant tests).
pub fn topology_from_peers(peers: Vec<Peer>) -> ClusterTopology {
    ClusterTopology::from_peers(peers)
}

/// Scratch directory holding a worker config and the reports workers write.
pub struct WorkerSandbox {
    temp: TempDir,
}

impl WorkerSandbox {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn report_dir(&self) -> PathBuf {
        self.temp.path().join("reports")
    }

    /// Write `settings` (with `report_dir` pointed into the sandbox) and return its path.
    pub fn write_settings(&self, settings: WorkerSettings) -> Result<PathBuf> {
        let settings = WorkerSettings {
            report_dir: Some(self.report_dir()),
            ..settings
        };
        let path = self.temp.path().join("worker.toml");
        let contents = toml::to_string_pretty(&settings).context("serialize worker settings")?;
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}
