//! One-shot bootstrap for a local cluster of peer workers.
//!
//! The launcher gives every slot an Ed25519 identity and a loopback endpoint,
//! hands all workers the same serialized topology, starts them together and
//! reduces their exit statuses to a single verdict. The crate is split:
//!
//! - **[`core`]**: Pure, deterministic logic (identities, topology, wire
//!   format, verdict). Randomness is injected.
//! - **[`io`]**: Side-effecting operations (config files, process spawning
//!   and reaping, reports).
//!
//! [`launch`] wires the two together for `peerboot launch`; [`worker`] is the
//! reference worker behind the `peerboot-worker` binary.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod launch;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod worker;
