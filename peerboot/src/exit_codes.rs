//! Stable exit codes for the launcher and the reference worker.

/// Every worker exited 0.
pub const OK: i32 = 0;
/// At least one slot failed to spawn, exited non-zero, or was killed.
pub const FAILED: i32 = 1;
/// Invalid configuration, arguments or identity generation; nothing was spawned.
///
/// Problems after the workers ran (such as an unwritable report) never map
/// here; the run still exits with `OK` or `FAILED`.
pub const INVALID: i32 = 2;
