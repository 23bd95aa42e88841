//! Reference worker for the launcher's invocation contract.
//!
//! A worker is started as `<binary> <worker_config> <serialized_topology> <slot_index>`.
//! This implementation resolves its own peer from the shared topology, works
//! out whom to dial, then exits according to its [`WorkerSettings`]. It does no
//! networking; it exists to exercise the launcher end to end and to document
//! what a real worker must do with its arguments.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::identity::verify_keypair;
use crate::core::topology::{ClusterTopology, parse_endpoint};
use crate::core::wire;

pub const USAGE: &str =
    "usage: peerboot-worker <worker_config> <serialized_topology> <slot_index>";

/// Worker behaviour, read from the worker config file (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerSettings {
    /// Slots that exit with `exit_code` instead of 0.
    pub fail_slots: Vec<usize>,
    /// Exit code used by failing slots.
    pub exit_code: i32,
    /// Slot `i` of `n` sleeps `(n - 1 - i) * stagger_ms` before exiting, so
    /// higher slots finish first.
    pub stagger_ms: u64,
    /// Write `slot-<i>.json` describing what this worker received.
    pub report_dir: Option<PathBuf>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            fail_slots: Vec::new(),
            exit_code: 1,
            stagger_ms: 0,
            report_dir: None,
        }
    }
}

/// Positional worker arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    pub worker_config: PathBuf,
    pub topology: String,
    pub slot_index: usize,
}

impl WorkerArgs {
    /// Parse arguments that follow the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let [worker_config, topology, slot] = args.as_slice() else {
            bail!("expected 3 arguments, got {}", args.len());
        };
        let slot_index = slot
            .parse::<usize>()
            .with_context(|| format!("slot index '{slot}' is not a non-negative integer"))?;
        Ok(Self {
            worker_config: PathBuf::from(worker_config),
            topology: topology.clone(),
            slot_index,
        })
    }
}

/// What one worker derives from the shared topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerView {
    pub slot_index: usize,
    pub cluster_size: usize,
    pub endpoint_uri: String,
    pub listen_port: u16,
    /// Slot 0 acts as the rendezvous point every other worker dials first.
    pub rendezvous_uri: String,
    /// Public keys of every other peer, in slot order.
    pub targets: Vec<String>,
}

/// Locate `slot_index` in `topology` and check that its keypair is coherent.
pub fn resolve_peer(topology: &ClusterTopology, slot_index: usize) -> Result<PeerView> {
    let me = topology.peer(slot_index).ok_or_else(|| {
        anyhow!(
            "slot {slot_index} out of range for cluster of {}",
            topology.len()
        )
    })?;
    verify_keypair(&me.public_key, &me.private_key)
        .with_context(|| format!("check keypair for slot {slot_index}"))?;
    let (_, listen_port) = parse_endpoint(&me.endpoint_uri)?;
    let rendezvous_uri = topology.peers()[0].endpoint_uri.clone();
    let targets = topology
        .peers()
        .iter()
        .filter(|peer| peer.slot_index != slot_index)
        .map(|peer| peer.public_key.clone())
        .collect();
    Ok(PeerView {
        slot_index,
        cluster_size: topology.len(),
        endpoint_uri: me.endpoint_uri.clone(),
        listen_port,
        rendezvous_uri,
        targets,
    })
}

/// Record of one worker run, written to `<report_dir>/slot-<i>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerReport {
    pub slot_index: usize,
    pub cluster_size: usize,
    pub endpoint_uri: String,
    pub listen_port: u16,
    pub rendezvous_uri: String,
    pub target_count: usize,
    pub topology_digest: String,
    pub exit_code: i32,
    pub finished_at_ms: u64,
}

pub fn worker_report_path(report_dir: &Path, slot_index: usize) -> PathBuf {
    report_dir.join(format!("slot-{slot_index}.json"))
}

/// Load worker settings. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<WorkerSettings> {
    if !path.exists() {
        return Ok(WorkerSettings::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// How long slot `slot_index` of `cluster_size` waits before exiting.
/// Saturates instead of overflowing for very large `stagger_ms`.
pub fn stagger_delay_ms(cluster_size: usize, slot_index: usize, stagger_ms: u64) -> u64 {
    let later_slots = cluster_size.saturating_sub(slot_index + 1) as u64;
    later_slots.saturating_mul(stagger_ms)
}

/// Run the worker and return its process exit code.
#[instrument(skip_all, fields(slot_index = args.slot_index))]
pub fn run(args: &WorkerArgs) -> Result<i32> {
    let settings = load_settings(&args.worker_config)?;
    let topology_digest = wire::digest(&args.topology);
    let topology = wire::parse(&args.topology).context("parse topology argument")?;
    let view = resolve_peer(&topology, args.slot_index)?;
    info!(
        endpoint = %view.endpoint_uri,
        rendezvous = %view.rendezvous_uri,
        targets = view.targets.len(),
        digest = %topology_digest,
        "worker resolved its peer"
    );

    let delay = stagger_delay_ms(view.cluster_size, view.slot_index, settings.stagger_ms);
    if delay > 0 {
        debug!(delay_ms = delay, "staggering exit");
        thread::sleep(Duration::from_millis(delay));
    }

    let exit_code = if settings.fail_slots.contains(&view.slot_index) {
        settings.exit_code
    } else {
        0
    };

    if let Some(report_dir) = &settings.report_dir {
        let report = WorkerReport {
            slot_index: view.slot_index,
            cluster_size: view.cluster_size,
            endpoint_uri: view.endpoint_uri.clone(),
            listen_port: view.listen_port,
            rendezvous_uri: view.rendezvous_uri.clone(),
            target_count: view.targets.len(),
            topology_digest,
            exit_code,
            finished_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .context("system clock before epoch")?
                .as_millis() as u64,
        };
        fs::create_dir_all(report_dir)
            .with_context(|| format!("create {}", report_dir.display()))?;
        let path = worker_report_path(report_dir, view.slot_index);
        let payload = serde_json::to_string_pretty(&report).context("serialize worker report")?;
        fs::write(&path, payload).with_context(|| format!("write {}", path.display()))?;
    }

    info!(exit_code, "worker finished");
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::Ed25519Provider;
    use crate::core::topology::build;
    use crate::test_support::topology_from_peers;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn parses_three_positional_arguments() {
        let parsed = WorkerArgs::parse(args(&["learner.toml", "{}", "3"])).expect("parse");
        assert_eq!(parsed.worker_config, PathBuf::from("learner.toml"));
        assert_eq!(parsed.topology, "{}");
        assert_eq!(parsed.slot_index, 3);
    }

    #[test]
    fn rejects_wrong_argument_count_and_bad_slot() {
        let err = WorkerArgs::parse(args(&["learner.toml", "{}"])).expect_err("too few");
        assert!(err.to_string().contains("expected 3 arguments, got 2"));
        let err = WorkerArgs::parse(args(&["learner.toml", "{}", "-1"])).expect_err("negative");
        assert!(err.to_string().contains("not a non-negative integer"));
    }

    #[test]
    fn resolves_own_peer_and_targets() {
        let topology = build(4, 8000, &mut Ed25519Provider::seeded(31)).expect("build");
        let view = resolve_peer(&topology, 2).expect("resolve");
        assert_eq!(view.endpoint_uri, "tcp://127.0.0.1:8002");
        assert_eq!(view.listen_port, 8002);
        assert_eq!(view.rendezvous_uri, "tcp://127.0.0.1:8000");
        assert_eq!(view.targets.len(), 3);
        assert!(!view.targets.contains(&topology.peers()[2].public_key));
    }

    #[test]
    fn rejects_out_of_range_slot() {
        let topology = build(2, 8000, &mut Ed25519Provider::seeded(32)).expect("build");
        let err = resolve_peer(&topology, 2).expect_err("out of range");
        assert!(err.to_string().contains("slot 2 out of range for cluster of 2"));
    }

    #[test]
    fn rejects_swapped_private_key() {
        let topology = build(2, 8000, &mut Ed25519Provider::seeded(33)).expect("build");
        let mut peers = topology.peers().to_vec();
        let other = peers[1].private_key.clone();
        peers[0].private_key = other;
        let err = resolve_peer(&topology_from_peers(peers), 0).expect_err("mismatch");
        assert!(format!("{err:#}").contains("does not match"));
    }

    #[test]
    fn stagger_delay_counts_later_slots_and_saturates() {
        assert_eq!(stagger_delay_ms(4, 0, 50), 150);
        assert_eq!(stagger_delay_ms(4, 3, 50), 0);
        assert_eq!(stagger_delay_ms(4, 1, u64::MAX), u64::MAX);
        assert_eq!(stagger_delay_ms(4, 3, u64::MAX), 0);
    }

    #[test]
    fn missing_settings_file_uses_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&temp.path().join("none.toml")).expect("load");
        assert_eq!(settings, WorkerSettings::default());
        assert_eq!(settings.exit_code, 1);
    }

    #[test]
    fn run_writes_report_and_honours_fail_slots() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report_dir = temp.path().join("reports");
        let config = temp.path().join("worker.toml");
        fs::write(
            &config,
            format!(
                "fail_slots = [1]\nexit_code = 7\nreport_dir = {:?}\n",
                report_dir.display().to_string()
            ),
        )
        .expect("write config");

        let topology = build(2, 8100, &mut Ed25519Provider::seeded(34)).expect("build");
        let serialized = wire::serialize(&topology);
        for (slot_index, expected) in [(0, 0), (1, 7)] {
            let code = run(&WorkerArgs {
                worker_config: config.clone(),
                topology: serialized.clone(),
                slot_index,
            })
            .expect("run");
            assert_eq!(code, expected);
        }

        let raw = fs::read_to_string(worker_report_path(&report_dir, 1)).expect("read report");
        let report: WorkerReport = serde_json::from_str(&raw).expect("parse report");
        assert_eq!(report.slot_index, 1);
        assert_eq!(report.listen_port, 8101);
        assert_eq!(report.exit_code, 7);
        assert_eq!(report.topology_digest, wire::digest(&serialized));
    }
}
