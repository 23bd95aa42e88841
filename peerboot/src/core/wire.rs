//! Worker-facing topology encoding.
//!
//! The topology travels to workers as one compact JSON document:
//!
//! ```json
//! {"peers":[{"key":"<private hex>","pub":"<public hex>","uri":"tcp://127.0.0.1:8000"}]}
//! ```
//!
//! Peers appear in slot order; a worker's slot index is its position in
//! `peers`. The same string is handed to every worker, so encoding is
//! deterministic.
//!
//! Every worker receives every peer's private key. That is only acceptable
//! for trusted processes co-located on one host; a launcher that spans hosts
//! or untrusted workers must hand each worker its own key only.

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::core::invariants::validate_topology;
use crate::core::topology::{ClusterTopology, Peer};

const V1_SCHEMA: &str = include_str!("../../schemas/topology/v1.schema.json");

#[derive(Debug, Deserialize)]
struct WireTopology {
    peers: Vec<WirePeer>,
}

#[derive(Debug, Deserialize)]
struct WirePeer {
    uri: String,
    key: String,
    #[serde(rename = "pub")]
    public: String,
}

/// Render a topology as the JSON blob passed on every worker's command line.
pub fn serialize(topology: &ClusterTopology) -> String {
    let peers: Vec<Value> = topology
        .peers()
        .iter()
        .map(|peer| {
            json!({
                "uri": peer.endpoint_uri,
                "key": peer.private_key,
                "pub": peer.public_key,
            })
        })
        .collect();
    json!({ "peers": peers }).to_string()
}

/// Parse and validate a serialized topology: schema conformance + semantic invariants.
pub fn parse(raw: &str) -> Result<ClusterTopology> {
    let instance: Value = serde_json::from_str(raw).context("parse topology json")?;
    let schema: Value = serde_json::from_str(V1_SCHEMA).context("parse topology schema")?;
    validate_schema(&instance, &schema)?;

    let wire: WireTopology =
        serde_json::from_value(instance).context("parse topology as v1 struct")?;
    let peers = wire
        .peers
        .into_iter()
        .enumerate()
        .map(|(slot_index, peer)| Peer {
            slot_index,
            endpoint_uri: peer.uri,
            public_key: peer.public,
            private_key: peer.key,
        })
        .collect();
    let topology = ClusterTopology::from_peers(peers);

    let errors = validate_topology(&topology);
    if !errors.is_empty() {
        bail!("topology invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(topology)
}

/// SHA-256 of a serialized topology, hex encoded.
///
/// Launcher and workers log this so operators can confirm every process saw
/// byte-identical input.
pub fn digest(serialized: &str) -> String {
    hex::encode(Sha256::digest(serialized.as_bytes()))
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile topology schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("topology schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::Ed25519Provider;
    use crate::core::topology::build;

    #[test]
    fn round_trips() {
        for n in [1, 4, 12] {
            let topology = build(n, 8000, &mut Ed25519Provider::seeded(n as u64)).expect("build");
            let parsed = parse(&serialize(&topology)).expect("parse");
            assert_eq!(parsed, topology);
        }
    }

    #[test]
    fn serialization_is_deterministic() {
        let topology = build(3, 8000, &mut Ed25519Provider::seeded(21)).expect("build");
        assert_eq!(serialize(&topology), serialize(&topology.clone()));
        let rebuilt = build(3, 8000, &mut Ed25519Provider::seeded(21)).expect("build");
        assert_eq!(serialize(&topology), serialize(&rebuilt));
    }

    #[test]
    fn blob_carries_uri_key_and_pub_per_peer() {
        let topology = build(2, 8000, &mut Ed25519Provider::seeded(8)).expect("build");
        let value: Value = serde_json::from_str(&serialize(&topology)).expect("json");
        let peers = value["peers"].as_array().expect("peers array");
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[1]["uri"], "tcp://127.0.0.1:8001");
        assert_eq!(peers[1]["pub"], topology.peers()[1].public_key.as_str());
        assert_eq!(peers[1]["key"], topology.peers()[1].private_key.as_str());
    }

    #[test]
    fn peer_fields_are_emitted_in_sorted_order() {
        let topology = build(1, 8000, &mut Ed25519Provider::seeded(9)).expect("build");
        let peer = &topology.peers()[0];
        let expected = format!(
            r#"{{"peers":[{{"key":"{}","pub":"{}","uri":"tcp://127.0.0.1:8000"}}]}}"#,
            peer.private_key, peer.public_key
        );
        assert_eq!(serialize(&topology), expected);
    }

    #[test]
    fn rejects_schema_violations() {
        let err = parse(r#"{"peers":[]}"#).expect_err("empty peers");
        assert!(err.to_string().contains("schema validation failed"));

        let err = parse(r#"{"peers":[{"uri":"tcp://127.0.0.1:8000"}]}"#).expect_err("missing keys");
        assert!(err.to_string().contains("schema validation failed"));

        let err = parse("not json").expect_err("garbage");
        assert!(err.to_string().contains("parse topology json"));
    }

    #[test]
    fn rejects_invariant_violations() {
        let topology = build(2, 8000, &mut Ed25519Provider::seeded(13)).expect("build");
        let raw = serialize(&topology).replace("tcp://127.0.0.1:8001", "tcp://127.0.0.1:8000");
        let err = parse(&raw).expect_err("duplicate port");
        assert!(err.to_string().contains("duplicate port 8000"));
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = digest("{\"peers\":[]}");
        assert_eq!(a.len(), 64);
        assert_eq!(a, digest("{\"peers\":[]}"));
        assert_ne!(a, digest("{\"peers\":[1]}"));
    }
}
