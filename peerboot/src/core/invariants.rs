//! Semantic topology invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::identity::KEY_LEN;
use crate::core::topology::{ClusterTopology, parse_endpoint};

/// Check semantic invariants of a topology:
/// - At least one peer
/// - `slot_index` equals position
/// - Endpoints are `tcp://<host>:<port>` with pairwise distinct ports
/// - Public and private keys are 32-byte hex and pairwise distinct
pub fn validate_topology(topology: &ClusterTopology) -> Vec<String> {
    let mut errors = Vec::new();
    if topology.is_empty() {
        errors.push("topology must contain at least one peer".to_string());
        return errors;
    }

    let mut ports = HashSet::new();
    let mut public_keys = HashSet::new();
    let mut private_keys = HashSet::new();

    for (position, peer) in topology.peers().iter().enumerate() {
        let label = format!("peers[{position}]");
        if peer.slot_index != position {
            errors.push(format!(
                "{label}: slot_index {} does not match position",
                peer.slot_index
            ));
        }

        match parse_endpoint(&peer.endpoint_uri) {
            Ok((_, port)) => {
                if !ports.insert(port) {
                    errors.push(format!("{label}: duplicate port {port}"));
                }
            }
            Err(err) => errors.push(format!("{label}: {err}")),
        }

        if !is_hex_key(&peer.public_key) {
            errors.push(format!("{label}: public key must be {KEY_LEN} hex bytes"));
        } else if !public_keys.insert(peer.public_key.as_str()) {
            errors.push(format!("{label}: duplicate public key"));
        }

        if !is_hex_key(&peer.private_key) {
            errors.push(format!("{label}: private key must be {KEY_LEN} hex bytes"));
        } else if !private_keys.insert(peer.private_key.as_str()) {
            errors.push(format!("{label}: duplicate private key"));
        }
    }
    errors
}

fn is_hex_key(key: &str) -> bool {
    key.len() == KEY_LEN * 2 && key.bytes().all(|b| b.is_ascii_hexdigit())
}
