//! Anonymized cluster metadata
//!
//! Collected once per connection, after the dial succeeds. Host names never
//! leave this module in clear text: only SHA-256 digests of domain fragments
//! are kept.

use std::net::IpAddr;

use bson::Document;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Deployment shape reported by `hello`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Standalone,
    ReplicaSet,
    Sharded,
    Unknown,
}

impl Topology {
    /// Classify a `hello` (or legacy `isMaster`) reply
    pub fn from_hello(hello: &Document) -> Self {
        if hello.get_str("msg").map(|m| m == "isdbgrid").unwrap_or(false) {
            Topology::Sharded
        } else if hello.contains_key("setName") {
            Topology::ReplicaSet
        } else if hello.contains_key("isWritablePrimary") || hello.contains_key("ismaster") {
            Topology::Standalone
        } else {
            Topology::Unknown
        }
    }
}

/// Raw facts a store reports about its server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: Option<String>,
    pub topology: Topology,
    pub host_count: usize,
}

/// Anonymized description of the cluster behind a connection
#[derive(Debug, Clone)]
pub struct ClusterMetadata {
    pub server_version: Option<String>,
    pub topology: Topology,
    pub host_count: usize,
    /// Hex SHA-256 digests of the hosts' domain fragments
    pub hashed_domains: Vec<String>,
    pub collected_at: DateTime<Utc>,
}

impl ClusterMetadata {
    pub fn from_server_info(info: ServerInfo, hosts: &[(String, Option<u16>)]) -> Self {
        Self {
            server_version: info.version,
            topology: info.topology,
            host_count: info.host_count,
            hashed_domains: hash_domain_fragments(hosts),
            collected_at: Utc::now(),
        }
    }
}

/// Hash the registrable domain and leading label of every named host.
///
/// IP literals and single-label hosts (e.g. `localhost`) contribute nothing.
pub fn hash_domain_fragments(hosts: &[(String, Option<u16>)]) -> Vec<String> {
    let mut digests = Vec::new();

    for (host, _) in hosts {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            continue;
        }

        let labels: Vec<&str> = bare.split('.').filter(|l| !l.is_empty()).collect();
        if labels.len() < 2 {
            continue;
        }

        let registrable = labels[labels.len() - 2..].join(".");
        for fragment in [registrable.as_str(), labels[0]] {
            let digest = sha256_hex(fragment);
            if !digests.contains(&digest) {
                digests.push(digest);
            }
        }
    }

    digests
}

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
