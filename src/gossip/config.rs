//! Gossip tuning parameters and node configuration.

use crate::membership::types::NodeId;
use crate::quorum::QuorumProviderType;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GOSSIP_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_PUSH_PULL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(200);
pub const DEFAULT_QUORUM_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_NODE_DEATH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_GOSSIP_VERSION: &str = "v1";
pub const DEFAULT_FANOUT: usize = 3;
/// Number of gossip sessions kept for diagnostics.
pub const GOSSIP_HISTORY_LEN: usize = 20;

/// Periods and deadlines of the gossip loops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GossipIntervals {
    /// Period of the diff-based gossip round.
    #[serde(with = "duration_ms")]
    pub gossip_interval: Duration,
    /// Period of the full-state exchange.
    #[serde(with = "duration_ms")]
    pub push_pull_interval: Duration,
    /// Period of the failure-detector sweep.
    #[serde(with = "duration_ms")]
    pub probe_interval: Duration,
    /// Deadline for reaching a peer. Should be at least twice the network RTT.
    #[serde(with = "duration_ms")]
    pub probe_timeout: Duration,
    /// How long the node may stay `SuspectNotInQuorum` before committing to `NotInQuorum`.
    #[serde(with = "duration_ms")]
    pub quorum_timeout: Duration,
}

impl Default for GossipIntervals {
    fn default() -> Self {
        Self {
            gossip_interval: DEFAULT_GOSSIP_INTERVAL,
            push_pull_interval: DEFAULT_PUSH_PULL_INTERVAL,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            quorum_timeout: DEFAULT_QUORUM_TIMEOUT,
        }
    }
}

/// Configuration a gossiper starts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipConfig {
    pub node_id: NodeId,
    /// Address peers use to reach this node.
    pub gossip_addr: String,
    /// Restart epoch; must increase every time the node process restarts.
    pub gen_number: u64,
    pub gossip_version: String,
    pub intervals: GossipIntervals,
    /// Silence after which a peer is declared down.
    #[serde(with = "duration_ms")]
    pub node_death_interval: Duration,
    /// Peers contacted per gossip round.
    pub fanout: usize,
    pub quorum_provider: QuorumProviderType,
    pub quorum_member: bool,
    pub cluster_domain: String,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId::new(),
            gossip_addr: "127.0.0.1:9002".to_string(),
            gen_number: 1,
            gossip_version: DEFAULT_GOSSIP_VERSION.to_string(),
            intervals: GossipIntervals::default(),
            node_death_interval: DEFAULT_NODE_DEATH_INTERVAL,
            fanout: DEFAULT_FANOUT,
            quorum_provider: QuorumProviderType::default(),
            quorum_member: true,
            cluster_domain: String::new(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
