//! Spawning one worker process per cluster slot.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument};

/// How to start a worker: executable, its opaque config reference, and
/// optional per-slot log capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub binary: PathBuf,
    pub worker_config: String,
    /// When set, stdout and stderr of slot `i` go to `<log_dir>/slot-<i>.log`;
    /// otherwise workers inherit the launcher's streams.
    pub log_dir: Option<PathBuf>,
}

/// Process state of a launched slot.
#[derive(Debug)]
pub enum SlotProcess {
    Running(Child),
    /// The OS refused to start the worker; holds the rendered error chain.
    SpawnFailed(String),
}

/// One slot's launch, alive until the aggregator resolves it.
#[derive(Debug)]
pub struct LaunchRecord {
    pub slot_index: usize,
    pub process: SlotProcess,
}

impl LaunchRecord {
    pub fn pid(&self) -> Option<u32> {
        match &self.process {
            SlotProcess::Running(child) => Some(child.id()),
            SlotProcess::SpawnFailed(_) => None,
        }
    }

    pub fn spawn_failed(&self) -> bool {
        matches!(self.process, SlotProcess::SpawnFailed(_))
    }
}

/// Log file for `slot_index` inside `log_dir`.
pub fn slot_log_path(log_dir: &Path, slot_index: usize) -> PathBuf {
    log_dir.join(format!("slot-{slot_index}.log"))
}

/// Spawn `n` workers, slot 0 first, without waiting on any of them.
///
/// Each worker gets `<worker_config> <serialized_topology> <slot_index>`.
/// A slot that fails to start yields a `SpawnFailed` record; the remaining
/// slots are still spawned and already-running slots are left alone.
#[instrument(skip_all, fields(binary = %command.binary.display(), n = n))]
pub fn launch(command: &WorkerCommand, serialized_topology: &str, n: usize) -> Vec<LaunchRecord> {
    let mut records = Vec::with_capacity(n);
    for slot_index in 0..n {
        let process = match spawn_slot(command, serialized_topology, slot_index) {
            Ok(child) => {
                debug!(slot_index, pid = child.id(), "worker spawned");
                SlotProcess::Running(child)
            }
            Err(err) => {
                error!(slot_index, err = %format!("{err:#}"), "failed to spawn worker");
                SlotProcess::SpawnFailed(format!("{err:#}"))
            }
        };
        records.push(LaunchRecord {
            slot_index,
            process,
        });
    }
    let failed = records.iter().filter(|record| record.spawn_failed()).count();
    info!(spawned = n - failed, failed, "launch finished");
    records
}

fn spawn_slot(command: &WorkerCommand, serialized_topology: &str, slot_index: usize) -> Result<Child> {
    let mut cmd = Command::new(&command.binary);
    cmd.arg(&command.worker_config)
        .arg(serialized_topology)
        .arg(slot_index.to_string())
        .stdin(Stdio::null());

    if let Some(log_dir) = &command.log_dir {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("create log dir {}", log_dir.display()))?;
        let log_path = slot_log_path(log_dir, slot_index);
        let stdout = File::create(&log_path)
            .with_context(|| format!("create worker log {}", log_path.display()))?;
        let stderr = stdout
            .try_clone()
            .with_context(|| format!("clone worker log {}", log_path.display()))?;
        cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
    }

    cmd.spawn()
        .with_context(|| format!("spawn {} for slot {slot_index}", command.binary.display()))
}
