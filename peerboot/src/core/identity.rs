//! Per-slot cryptographic identities.
//!
//! Identities are Ed25519 keypairs rendered as lowercase hex. Randomness is
//! injected through [`IdentityProvider`] so tests can substitute a seeded
//! source and get reproducible topologies.

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::{OsRng, StdRng};
use rand::{CryptoRng, RngCore, SeedableRng};

/// Length in bytes of both halves of an Ed25519 keypair.
pub const KEY_LEN: usize = 32;

/// Public/private keypair bound to exactly one cluster slot.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

/// Source of fresh identities.
///
/// Implementations must never hand out the same keypair twice. A failure is
/// fatal for the launch and must be reported before any worker is spawned.
pub trait IdentityProvider {
    fn generate(&mut self) -> Result<Identity>;
}

/// Ed25519 identities drawn from a cryptographic RNG.
pub struct Ed25519Provider<R> {
    rng: R,
}

impl Ed25519Provider<OsRng> {
    /// Provider backed by operating-system entropy.
    pub fn os() -> Self {
        Self { rng: OsRng }
    }
}

impl Ed25519Provider<StdRng> {
    /// Deterministic provider: the same seed yields the same identity sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: RngCore + CryptoRng> Ed25519Provider<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore + CryptoRng> IdentityProvider for Ed25519Provider<R> {
    fn generate(&mut self) -> Result<Identity> {
        let mut secret = [0u8; KEY_LEN];
        self.rng
            .try_fill_bytes(&mut secret)
            .map_err(|err| anyhow!("identity generation failed: {err}"))?;
        let signing = SigningKey::from_bytes(&secret);
        Ok(identity_from_signing_key(&signing))
    }
}

fn identity_from_signing_key(signing: &SigningKey) -> Identity {
    Identity {
        public_key: hex::encode(signing.verifying_key().to_bytes()),
        private_key: hex::encode(signing.to_bytes()),
    }
}

/// Check that `private_hex` is the secret half of `public_hex`.
pub fn verify_keypair(public_hex: &str, private_hex: &str) -> Result<()> {
    let secret = decode_key(private_hex).context("decode private key")?;
    let public = decode_key(public_hex).context("decode public key")?;
    let expected = VerifyingKey::from_bytes(&public).context("parse public key")?;
    let derived = SigningKey::from_bytes(&secret).verifying_key();
    if derived != expected {
        bail!("private key does not match public key {public_hex}");
    }
    Ok(())
}

/// Decode a hex-encoded 32-byte key.
pub fn decode_key(encoded: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = hex::decode(encoded).context("key is not valid hex")?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow!("key must be {KEY_LEN} bytes, got {}", bytes.len()))
}
