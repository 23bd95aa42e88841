//! Reduction of per-slot worker outcomes to one cluster verdict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Exit code every worker must return for the cluster to succeed.
pub const SUCCESS_CODE: i32 = 0;

/// Token printed by the launcher when every slot succeeded.
pub const OK_TOKEN: &str = "ok";
/// Token printed by the launcher when any slot failed.
pub const FAILED_TOKEN: &str = "failed";

/// Terminal state of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotStatus {
    /// Process exited with a code.
    Exited { code: i32 },
    /// Process terminated without an exit code (e.g. killed by a signal).
    Signaled,
    /// Process never started.
    SpawnFailed { reason: String },
    /// Process was killed after the launch deadline expired.
    TimedOut,
    /// The OS could not report how the process ended.
    WaitFailed { reason: String },
}

impl SlotStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SlotStatus::Exited { code } if *code == SUCCESS_CODE)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SlotStatus::Exited { code } => Some(*code),
            _ => None,
        }
    }
}

/// Aggregate outcome of a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResult {
    statuses: BTreeMap<usize, SlotStatus>,
    overall_success: bool,
}

impl ClusterResult {
    /// Fold per-slot statuses into a verdict. An empty map is not a success:
    /// a cluster always has at least one slot.
    pub fn from_statuses(statuses: BTreeMap<usize, SlotStatus>) -> Self {
        let overall_success =
            !statuses.is_empty() && statuses.values().all(SlotStatus::is_success);
        Self {
            statuses,
            overall_success,
        }
    }

    pub fn overall_success(&self) -> bool {
        self.overall_success
    }

    pub fn statuses(&self) -> &BTreeMap<usize, SlotStatus> {
        &self.statuses
    }

    pub fn status(&self, slot_index: usize) -> Option<&SlotStatus> {
        self.statuses.get(&slot_index)
    }

    /// Exit code for `slot_index`, `None` when the slot has no code (or is unknown).
    pub fn exit_code(&self, slot_index: usize) -> Option<i32> {
        self.statuses.get(&slot_index).and_then(SlotStatus::exit_code)
    }

    /// Slots that did not exit successfully, in slot order.
    pub fn failed_slots(&self) -> Vec<usize> {
        self.statuses
            .iter()
            .filter(|(_, status)| !status.is_success())
            .map(|(slot, _)| *slot)
            .collect()
    }

    pub fn verdict_token(&self) -> &'static str {
        if self.overall_success {
            OK_TOKEN
        } else {
            FAILED_TOKEN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(codes: &[i32]) -> BTreeMap<usize, SlotStatus> {
        codes
            .iter()
            .enumerate()
            .map(|(slot, code)| (slot, SlotStatus::Exited { code: *code }))
            .collect()
    }

    #[test]
    fn all_zero_is_success() {
        let result = ClusterResult::from_statuses(exited(&[0, 0, 0, 0]));
        assert!(result.overall_success());
        assert_eq!(result.verdict_token(), "ok");
        assert!(result.failed_slots().is_empty());
    }

    #[test]
    fn one_nonzero_fails_the_cluster() {
        let result = ClusterResult::from_statuses(exited(&[0, 0, 1, 0]));
        assert!(!result.overall_success());
        assert_eq!(result.verdict_token(), "failed");
        assert_eq!(result.failed_slots(), vec![2]);
        assert_eq!(result.exit_code(2), Some(1));
    }

    #[test]
    fn non_exit_statuses_fail() {
        for status in [
            SlotStatus::Signaled,
            SlotStatus::TimedOut,
            SlotStatus::SpawnFailed {
                reason: "No such file or directory".to_string(),
            },
            SlotStatus::WaitFailed {
                reason: "No child processes".to_string(),
            },
        ] {
            let mut statuses = exited(&[0, 0]);
            statuses.insert(2, status);
            let result = ClusterResult::from_statuses(statuses);
            assert!(!result.overall_success());
            assert_eq!(result.exit_code(2), None);
        }
    }

    #[test]
    fn empty_is_not_success() {
        let result = ClusterResult::from_statuses(BTreeMap::new());
        assert!(!result.overall_success());
    }

    #[test]
    fn status_serializes_with_kind_tag() {
        let raw = serde_json::to_string(&SlotStatus::Exited { code: 3 }).expect("serialize");
        assert_eq!(raw, r#"{"kind":"exited","code":3}"#);
        let raw = serde_json::to_string(&SlotStatus::WaitFailed {
            reason: "ECHILD".to_string(),
        })
        .expect("serialize");
        assert_eq!(raw, r#"{"kind":"wait_failed","reason":"ECHILD"}"#);
    }
}
