use super::{Quorum, QuorumProviderType, majority};
use crate::membership::types::{
    ClusterDomainsActiveMap, ClusterDomainsQuorumMembersMap, NodeId, NodeInfoMap,
};

/// Global majority over every quorum member, regardless of domain.
#[derive(Debug, Clone)]
pub struct DefaultQuorum {
    self_id: NodeId,
    num_quorum_members: usize,
}

impl DefaultQuorum {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            num_quorum_members: 0,
        }
    }

    pub fn num_quorum_members(&self) -> usize {
        self.num_quorum_members
    }
}

impl Quorum for DefaultQuorum {
    fn is_node_in_quorum(&self, local_node_info_map: &NodeInfoMap) -> bool {
        let up_nodes = local_node_info_map
            .values()
            .filter(|info| info.quorum_member && info.status.is_alive())
            .count();
        let quorum = majority(self.num_quorum_members);

        tracing::debug!(
            "Quorum check on {}: {} up, {} needed",
            self.self_id,
            up_nodes,
            quorum
        );
        up_nodes >= quorum
    }

    fn update_num_of_quorum_members(&mut self, quorum_members: &ClusterDomainsQuorumMembersMap) {
        self.num_quorum_members = quorum_members.values().sum();
    }

    fn update_cluster_domains_active_map(&mut self, _active_map: &ClusterDomainsActiveMap) -> bool {
        false
    }

    fn provider_type(&self) -> QuorumProviderType {
        QuorumProviderType::Default
    }
}
