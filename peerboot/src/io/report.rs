//! JSON run report written after every worker has exited.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::verdict::{ClusterResult, SlotStatus};

/// Report persisted to `report_path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchReport {
    pub started_at: String,
    pub finished_at: String,
    pub duration_secs: f64,
    pub cluster_size: usize,
    /// SHA-256 of the topology blob every worker received.
    pub topology_digest: String,
    pub overall_success: bool,
    pub slots: Vec<SlotReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotReport {
    pub slot: usize,
    pub exit_code: Option<i32>,
    pub status: SlotStatus,
}

impl LaunchReport {
    pub fn new(
        result: &ClusterResult,
        topology_digest: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let duration = finished_at - started_at;
        let slots = result
            .statuses()
            .iter()
            .map(|(slot, status)| SlotReport {
                slot: *slot,
                exit_code: status.exit_code(),
                status: status.clone(),
            })
            .collect();
        Self {
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            cluster_size: result.statuses().len(),
            topology_digest: topology_digest.to_string(),
            overall_success: result.overall_success(),
            slots,
        }
    }
}

/// Atomically write the report (temp file + rename).
pub fn write_report(path: &Path, report: &LaunchReport) -> Result<()> {
    debug!(path = %path.display(), "writing launch report");
    let mut buf = serde_json::to_string_pretty(report).context("serialize report")?;
    buf.push('\n');
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}
