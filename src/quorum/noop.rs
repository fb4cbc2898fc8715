use super::{Quorum, QuorumProviderType};
use crate::membership::types::{
    ClusterDomainsActiveMap, ClusterDomainsQuorumMembersMap, NodeInfoMap,
};

/// Disables quorum enforcement: the local node is always in quorum.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopQuorum;

impl Quorum for NoopQuorum {
    fn is_node_in_quorum(&self, _local_node_info_map: &NodeInfoMap) -> bool {
        true
    }

    fn update_num_of_quorum_members(&mut self, _quorum_members: &ClusterDomainsQuorumMembersMap) {}

    fn update_cluster_domains_active_map(&mut self, _active_map: &ClusterDomainsActiveMap) -> bool {
        false
    }

    fn provider_type(&self) -> QuorumProviderType {
        QuorumProviderType::Noop
    }
}
