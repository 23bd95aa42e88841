//! Fan-in: wait for every launched worker and collect its exit status.

use std::collections::BTreeMap;
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::verdict::{ClusterResult, SlotStatus};
use crate::io::process::{LaunchRecord, SlotProcess};

/// Block until every launched worker has terminated and fold the results.
///
/// A failing worker never cuts the wait short for its siblings, so no child
/// outlives the verdict. Spawn failures resolve immediately.
pub fn await_all(records: Vec<LaunchRecord>) -> ClusterResult {
    await_all_with_deadline(records, None)
}

/// Like [`await_all`], but once `deadline` has elapsed (measured from the
/// call) every worker still running is killed, reaped and marked `TimedOut`.
///
/// An OS-level wait error fails only its own slot (`WaitFailed`); the
/// remaining slots are still awaited and the verdict is always produced.
#[instrument(skip_all, fields(slots = records.len(), deadline_secs = deadline.map(|d| d.as_secs())))]
pub fn await_all_with_deadline(
    records: Vec<LaunchRecord>,
    deadline: Option<Duration>,
) -> ClusterResult {
    let started = Instant::now();
    let mut statuses = BTreeMap::new();

    for record in records {
        let slot_index = record.slot_index;
        let status = match record.process {
            SlotProcess::SpawnFailed(reason) => SlotStatus::SpawnFailed { reason },
            SlotProcess::Running(mut child) => {
                let waited = wait_child(&mut child, deadline, started);
                resolve_running(slot_index, &mut child, waited)
            }
        };
        log_status(slot_index, &status);
        statuses.insert(slot_index, status);
    }

    let result = ClusterResult::from_statuses(statuses);
    info!(
        overall_success = result.overall_success(),
        failed_slots = ?result.failed_slots(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "all workers resolved"
    );
    result
}

/// Turn the outcome of waiting on a running worker into its slot status.
fn resolve_running(
    slot_index: usize,
    child: &mut Child,
    waited: std::io::Result<Option<ExitStatus>>,
) -> SlotStatus {
    match waited {
        Ok(Some(exit)) => status_from_exit(exit),
        Ok(None) => {
            warn!(slot_index, "deadline expired, killing worker");
            match kill_and_reap(child) {
                Ok(()) => SlotStatus::TimedOut,
                Err(err) => {
                    error!(
                        slot_index,
                        err = %format!("{err:#}"),
                        "failed to reap timed-out worker"
                    );
                    SlotStatus::WaitFailed {
                        reason: format!("deadline expired; reap failed: {err:#}"),
                    }
                }
            }
        }
        Err(err) => {
            error!(slot_index, err = %err, "failed to wait for worker");
            let mut reason = err.to_string();
            if let Err(reap_err) = kill_and_reap(child) {
                error!(slot_index, err = %format!("{reap_err:#}"), "failed to reap worker");
                reason.push_str(&format!("; reap failed: {reap_err:#}"));
            }
            SlotStatus::WaitFailed { reason }
        }
    }
}

fn wait_child(
    child: &mut Child,
    deadline: Option<Duration>,
    started: Instant,
) -> std::io::Result<Option<ExitStatus>> {
    match deadline {
        None => child.wait().map(Some),
        Some(limit) => child.wait_timeout(limit.saturating_sub(started.elapsed())),
    }
}

fn kill_and_reap(child: &mut Child) -> Result<()> {
    // The child may exit between the timeout and the kill; reaping still applies.
    if let Err(err) = child.kill() {
        warn!(err = %err, "kill failed");
    }
    child.wait()?;
    Ok(())
}

fn status_from_exit(exit: ExitStatus) -> SlotStatus {
    match exit.code() {
        Some(code) => SlotStatus::Exited { code },
        None => SlotStatus::Signaled,
    }
}

fn log_status(slot_index: usize, status: &SlotStatus) {
    if status.is_success() {
        info!(slot_index, "worker succeeded");
    } else {
        warn!(slot_index, status = ?status, "worker failed");
    }
}
