//! Deterministic, pure logic shared by the launcher and workers.
//!
//! Core modules must be free of I/O side effects. Randomness enters only
//! through [`identity::IdentityProvider`], so every output is reproducible
//! under a seeded provider.

pub mod identity;
pub mod invariants;
pub mod topology;
pub mod verdict;
pub mod wire;
