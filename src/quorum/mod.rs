//! Quorum Providers
//!
//! Pluggable policies answering "is the local node part of a quorum?" from the
//! local view of every node's status.
//!
//! ## Policies
//! - **Default**: global majority of quorum members.
//! - **Failure Domains**: majority of the members living in active domains. A node
//!   whose own domain is inactive is never in quorum.
//! - **Noop**: always in quorum (single-node and test deployments).
//!
//! Nodes count as up while they gossip, even if their own quorum view is degraded
//! (`Up`, `NotInQuorum`, `SuspectNotInQuorum`).

pub mod default;
pub mod failure_domains;
pub mod noop;

pub use default::DefaultQuorum;
pub use failure_domains::FailureDomainsQuorum;
pub use noop::NoopQuorum;

use crate::membership::types::{
    ClusterDomainsActiveMap, ClusterDomainsQuorumMembersMap, NodeId, NodeInfoMap,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum QuorumProviderType {
    #[default]
    Default,
    FailureDomains,
    Noop,
}

impl fmt::Display for QuorumProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuorumProviderType::Default => "default",
            QuorumProviderType::FailureDomains => "failure-domains",
            QuorumProviderType::Noop => "noop",
        };
        f.write_str(name)
    }
}

pub trait Quorum: Send + Sync + fmt::Debug {
    /// Whether the local node is in quorum given the local view of every node.
    fn is_node_in_quorum(&self, local_node_info_map: &NodeInfoMap) -> bool;

    /// Replaces the per-domain count of members eligible to vote.
    fn update_num_of_quorum_members(&mut self, quorum_members: &ClusterDomainsQuorumMembersMap);

    /// Replaces the set of active domains. Returns true if any domain flipped.
    fn update_cluster_domains_active_map(&mut self, active_map: &ClusterDomainsActiveMap) -> bool;

    fn provider_type(&self) -> QuorumProviderType;
}

/// Majority threshold for `members` voters.
pub(crate) fn majority(members: usize) -> usize {
    members / 2 + 1
}

pub fn new_quorum_provider(self_id: NodeId, provider: QuorumProviderType) -> Box<dyn Quorum> {
    match provider {
        QuorumProviderType::Default => Box::new(DefaultQuorum::new(self_id)),
        QuorumProviderType::FailureDomains => Box::new(FailureDomainsQuorum::new(self_id)),
        QuorumProviderType::Noop => Box::new(NoopQuorum),
    }
}
