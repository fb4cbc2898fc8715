use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of a cluster member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Application-defined key inside a node's record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StoreKey(pub String);

impl From<&str> for StoreKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness of a node as seen by the local gossiper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum NodeStatus {
    #[default]
    Invalid,
    Up,
    Down,
    NeverGossiped,
    NotInQuorum,
    SuspectNotInQuorum,
}

impl NodeStatus {
    /// Statuses of a node that is still gossiping, whatever its own quorum view.
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            NodeStatus::Up | NodeStatus::NotInQuorum | NodeStatus::SuspectNotInQuorum
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Invalid => "INVALID",
            NodeStatus::Up => "UP",
            NodeStatus::Down => "DOWN",
            NodeStatus::NeverGossiped => "NEVER_GOSSIPED",
            NodeStatus::NotInQuorum => "NOT_IN_QUORUM",
            NodeStatus::SuspectNotInQuorum => "SUSPECT_NOT_IN_QUORUM",
        };
        f.write_str(name)
    }
}

/// Opaque map published by a node.
pub type StoreMap = HashMap<StoreKey, serde_json::Value>;

/// The versioned record kept for one node.
///
/// `(gen_number, last_update_ts)` orders two records of the same node: the restart
/// epoch is compared first, the wall clock only breaks ties. `status` is the local
/// observation of the node and is never taken from a peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub gen_number: u64,
    /// Unix ms of the last mutation made by the owning node. Zero means never observed.
    pub last_update_ts: u64,
    /// Unix ms at which a stale generation was observed for this node, zero otherwise.
    pub wait_for_gen_update_ts: u64,
    pub status: NodeStatus,
    pub value: StoreMap,
    pub quorum_member: bool,
    pub cluster_domain: String,
    pub addr: String,
}

impl NodeInfo {
    pub fn new(id: NodeId, gen_number: u64, status: NodeStatus) -> Self {
        Self {
            id,
            gen_number,
            last_update_ts: 0,
            wait_for_gen_update_ts: 0,
            status,
            value: StoreMap::new(),
            quorum_member: true,
            cluster_domain: String::new(),
            addr: String::new(),
        }
    }

    /// A record for a node that is known by configuration but never heard from.
    pub fn placeholder(id: NodeId) -> Self {
        Self::new(id, 0, NodeStatus::NeverGossiped)
    }

    pub fn version(&self) -> (u64, u64) {
        (self.gen_number, self.last_update_ts)
    }

    pub fn has_old_gen(&self) -> bool {
        self.wait_for_gen_update_ts != 0
    }
}

pub type NodeInfoMap = HashMap<NodeId, NodeInfo>;

/// One key's value as published by one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeValue {
    pub id: NodeId,
    pub gen_number: u64,
    pub last_update_ts: u64,
    pub status: NodeStatus,
    pub value: serde_json::Value,
}

pub type NodeValueMap = HashMap<NodeId, NodeValue>;

/// Summary of a record, exchanged before any full data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeMetaInfo {
    pub gossip_version: String,
    pub id: NodeId,
    pub gen_number: u64,
    pub last_update_ts: u64,
}

impl NodeMetaInfo {
    pub fn version(&self) -> (u64, u64) {
        (self.gen_number, self.last_update_ts)
    }
}

pub type StoreMetaInfo = HashMap<NodeId, NodeMetaInfo>;

/// Whether a failure domain counts toward quorum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ClusterDomainState {
    Active,
    #[default]
    Inactive,
}

pub type ClusterDomainsActiveMap = HashMap<String, ClusterDomainState>;

/// Failure domain -> number of quorum members in it.
pub type ClusterDomainsQuorumMembersMap = HashMap<String, usize>;

/// Topology entry pushed by an external cluster manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeUpdate {
    pub addr: String,
    pub quorum_member: bool,
    pub cluster_domain: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GossipDirection {
    MeToPeer,
    PeerToMe,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GossipOp {
    /// Metadata exchange followed by a diff-sized pull and push.
    Diff,
    /// Full state exchange.
    PushPull,
    NodeJoin,
    NodeLeave,
    NodeAlive,
}

/// Diagnostic record of one gossip exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GossipSessionInfo {
    pub node: String,
    pub ts: u64,
    pub dir: GossipDirection,
    pub err: Option<String>,
    pub op: GossipOp,
}

impl GossipSessionInfo {
    pub fn new(node: impl Into<String>, dir: GossipDirection, op: GossipOp) -> Self {
        Self {
            node: node.into(),
            ts: now_ms(),
            dir,
            err: None,
            op,
        }
    }
}

/// Current wall clock in Unix milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
