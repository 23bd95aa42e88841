//! Orchestration for `peerboot launch`.
//!
//! Bootstrap is one shot: build identities and topology, serialize it once,
//! spawn every slot, then wait for all of them. Configuration and identity
//! errors surface as `Err` before anything is spawned; once workers have run,
//! the verdict is always returned and later problems ride along in the outcome.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, instrument};

use crate::core::identity::IdentityProvider;
use crate::core::topology::build_with_host;
use crate::core::verdict::ClusterResult;
use crate::core::wire;
use crate::io::aggregate::await_all_with_deadline;
use crate::io::config::LaunchConfig;
use crate::io::process::{WorkerCommand, launch};
use crate::io::report::{LaunchReport, write_report};

/// Outcome of `peerboot launch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub result: ClusterResult,
    pub topology_digest: String,
    pub report_path: Option<PathBuf>,
    /// Set when the run report could not be written. The verdict still stands.
    pub report_error: Option<String>,
}

/// Run one cluster to completion.
#[instrument(skip_all, fields(cluster_size = cfg.cluster_size, base_port = cfg.base_port))]
pub fn bootstrap(cfg: &LaunchConfig, provider: &mut dyn IdentityProvider) -> Result<LaunchOutcome> {
    cfg.validate().context("invalid launch config")?;

    let topology = build_with_host(cfg.cluster_size, &cfg.host, cfg.base_port, provider)
        .context("build topology")?;
    let serialized = wire::serialize(&topology);
    let topology_digest = wire::digest(&serialized);
    info!(peers = topology.len(), digest = %topology_digest, "topology ready");

    let command = WorkerCommand {
        binary: cfg.worker_binary.clone(),
        worker_config: cfg.worker_config.clone(),
        log_dir: cfg.log_dir.clone(),
    };
    let started_at = Utc::now();
    let records = launch(&command, &serialized, topology.len());
    let result = await_all_with_deadline(records, cfg.deadline());
    let finished_at = Utc::now();

    let mut report_error = None;
    if let Some(path) = &cfg.report_path {
        let report = LaunchReport::new(&result, &topology_digest, started_at, finished_at);
        match write_report(path, &report).context("write launch report") {
            Ok(()) => debug!(path = %path.display(), "launch report written"),
            Err(err) => {
                error!(
                    path = %path.display(),
                    err = %format!("{err:#}"),
                    "launch report not written"
                );
                report_error = Some(format!("{err:#}"));
            }
        }
    }

    Ok(LaunchOutcome {
        result,
        topology_digest,
        report_path: cfg.report_path.clone(),
        report_error,
    })
}
