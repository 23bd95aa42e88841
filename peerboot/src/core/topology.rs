//! Cluster topology: one peer per slot, ordered by slot index.

use std::fmt;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::identity::{Identity, IdentityProvider};

/// Loopback host used when no other host is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// A single cluster member: endpoint plus its keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct Peer {
    pub slot_index: usize,
    pub endpoint_uri: String,
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("slot_index", &self.slot_index)
            .field("endpoint_uri", &self.endpoint_uri)
            .field("public_key", &self.public_key)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

/// Ordered, immutable peer list shared with every worker.
///
/// `peers()[i].slot_index == i` for every peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    peers: Vec<Peer>,
}

impl ClusterTopology {
    /// Wrap an already-ordered peer list. Callers must uphold the
    /// slot-equals-position invariant; `core::invariants` checks it.
    pub(crate) fn from_peers(peers: Vec<Peer>) -> Self {
        Self { peers }
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peer(&self, slot_index: usize) -> Option<&Peer> {
        self.peers.get(slot_index)
    }
}

/// Endpoint for `slot_index` given a base port.
pub fn endpoint_uri(host: &str, base_port: u16, slot_index: usize) -> Result<String> {
    let port = slot_port(base_port, slot_index)?;
    Ok(format!("tcp://{host}:{port}"))
}

/// Split a `tcp://<host>:<port>` endpoint into host and port.
pub fn parse_endpoint(uri: &str) -> Result<(&str, u16)> {
    use std::sync::LazyLock;
    static ENDPOINT_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"^tcp://([^:/\s]+):(\d{1,5})$").unwrap());

    let captures = ENDPOINT_RE
        .captures(uri)
        .with_context(|| format!("endpoint '{uri}' is not of the form tcp://<host>:<port>"))?;
    let host = captures.get(1).map_or("", |m| m.as_str());
    let port = captures
        .get(2)
        .map_or("", |m| m.as_str())
        .parse::<u16>()
        .with_context(|| format!("endpoint '{uri}' has an invalid port"))?;
    if port == 0 {
        bail!("endpoint '{uri}' has port 0");
    }
    Ok((host, port))
}

fn slot_port(base_port: u16, slot_index: usize) -> Result<u16> {
    u16::try_from(slot_index)
        .ok()
        .and_then(|offset| base_port.checked_add(offset))
        .with_context(|| format!("slot {slot_index} overflows port range from base {base_port}"))
}

/// Check that `n` slots starting at `base_port` fit in the TCP port range.
pub fn check_port_range(n: usize, base_port: u16) -> Result<()> {
    if n == 0 {
        bail!("cluster size must be >= 1");
    }
    if base_port == 0 {
        bail!("base port must be >= 1");
    }
    slot_port(base_port, n - 1).map(|_| ())
}

/// Check that `host` can appear in a `tcp://<host>:<port>` endpoint.
pub fn check_host(host: &str) -> Result<()> {
    if host.is_empty() || host.contains([':', '/']) || host.contains(char::is_whitespace) {
        bail!("host '{host}' must be non-empty without ':', '/' or whitespace");
    }
    Ok(())
}

/// Build a loopback topology of `n` peers on consecutive ports.
pub fn build(
    n: usize,
    base_port: u16,
    provider: &mut dyn IdentityProvider,
) -> Result<ClusterTopology> {
    build_with_host(n, DEFAULT_HOST, base_port, provider)
}

/// Build a topology of `n` peers on `host`, slot `i` listening on `base_port + i`.
///
/// Configuration problems are reported before the provider is consulted, so a
/// bad cluster size never consumes entropy.
pub fn build_with_host(
    n: usize,
    host: &str,
    base_port: u16,
    provider: &mut dyn IdentityProvider,
) -> Result<ClusterTopology> {
    check_port_range(n, base_port)?;
    check_host(host)?;
    let mut peers = Vec::with_capacity(n);
    for slot_index in 0..n {
        let Identity {
            public_key,
            private_key,
        } = provider
            .generate()
            .with_context(|| format!("generate identity for slot {slot_index}"))?;
        let endpoint_uri = endpoint_uri(host, base_port, slot_index)?;
        debug!(slot_index, %endpoint_uri, "peer assigned");
        peers.push(Peer {
            slot_index,
            endpoint_uri,
            public_key,
            private_key,
        });
    }
    Ok(ClusterTopology::from_peers(peers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::Ed25519Provider;
    use crate::test_support::CountingProvider;
    use std::collections::HashSet;

    #[test]
    fn four_slots_on_base_8000() {
        let topology = build(4, 8000, &mut Ed25519Provider::seeded(0)).expect("build");
        let uris: Vec<&str> = topology
            .peers()
            .iter()
            .map(|peer| peer.endpoint_uri.as_str())
            .collect();
        assert_eq!(
            uris,
            vec![
                "tcp://127.0.0.1:8000",
                "tcp://127.0.0.1:8001",
                "tcp://127.0.0.1:8002",
                "tcp://127.0.0.1:8003",
            ]
        );
    }

    #[test]
    fn slots_match_positions_and_keys_are_distinct() {
        for n in [1, 2, 7, 16] {
            let topology = build(n, 9000, &mut Ed25519Provider::seeded(n as u64)).expect("build");
            assert_eq!(topology.len(), n);
            let mut public = HashSet::new();
            let mut private = HashSet::new();
            for (position, peer) in topology.peers().iter().enumerate() {
                assert_eq!(peer.slot_index, position);
                assert!(public.insert(peer.public_key.clone()));
                assert!(private.insert(peer.private_key.clone()));
            }
        }
    }

    #[test]
    fn provider_called_once_per_slot() {
        let mut provider = CountingProvider::default();
        build(5, 10_000, &mut provider).expect("build");
        assert_eq!(provider.calls, 5);
    }

    #[test]
    fn zero_slots_is_rejected_without_generating() {
        let mut provider = CountingProvider::default();
        let err = build(0, 8000, &mut provider).expect_err("n=0");
        assert!(err.to_string().contains("cluster size must be >= 1"));
        assert_eq!(provider.calls, 0);
    }

    #[test]
    fn port_overflow_is_rejected() {
        let mut provider = CountingProvider::default();
        let err = build(3, 65_534, &mut provider).expect_err("overflow");
        assert!(err.to_string().contains("overflows port range"));
        assert_eq!(provider.calls, 0);
        build(2, 65_534, &mut provider).expect("last port fits");
    }

    #[test]
    fn base_port_zero_is_rejected() {
        let err = build(1, 0, &mut CountingProvider::default()).expect_err("port 0");
        assert!(err.to_string().contains("base port"));
    }

    #[test]
    fn parse_endpoint_splits_host_and_port() {
        assert_eq!(
            parse_endpoint("tcp://127.0.0.1:8003").expect("parse"),
            ("127.0.0.1", 8003)
        );
        assert!(parse_endpoint("udp://127.0.0.1:8003").is_err());
        assert!(parse_endpoint("tcp://127.0.0.1").is_err());
        assert!(parse_endpoint("tcp://127.0.0.1:70000").is_err());
        assert!(parse_endpoint("tcp://127.0.0.1:0").is_err());
    }

    #[test]
    fn unusable_hosts_are_rejected_without_generating() {
        for host in ["", "::1", "a/b", "local host"] {
            let mut provider = CountingProvider::default();
            let err = build_with_host(2, host, 8000, &mut provider).expect_err("bad host");
            assert!(err.to_string().contains("must be non-empty"), "host {host:?}");
            assert_eq!(provider.calls, 0);
        }
    }

    #[test]
    fn custom_host_round_trips_through_wire() {
        let topology = build_with_host(2, "node-a.internal", 7000, &mut Ed25519Provider::seeded(6))
            .expect("build");
        let parsed = crate::core::wire::parse(&crate::core::wire::serialize(&topology))
            .expect("parse");
        assert_eq!(parsed, topology);
    }

    #[test]
    fn custom_host_is_used() {
        let topology = build_with_host(2, "10.0.0.5", 7000, &mut Ed25519Provider::seeded(2))
            .expect("build");
        assert_eq!(topology.peers()[1].endpoint_uri, "tcp://10.0.0.5:7001");
    }
}
