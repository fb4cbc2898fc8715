use super::{Quorum, QuorumProviderType, majority};
use crate::membership::types::{
    ClusterDomainState, ClusterDomainsActiveMap, ClusterDomainsQuorumMembersMap, NodeId,
    NodeInfoMap,
};

/// Majority restricted to the members of active failure domains.
///
/// Deactivating a domain removes both its members and its votes from the
/// calculation, so the surviving domains can keep quorum on their own.
#[derive(Debug, Clone)]
pub struct FailureDomainsQuorum {
    self_id: NodeId,
    active_map: ClusterDomainsActiveMap,
    quorum_members_map: ClusterDomainsQuorumMembersMap,
}

impl FailureDomainsQuorum {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            active_map: ClusterDomainsActiveMap::new(),
            quorum_members_map: ClusterDomainsQuorumMembersMap::new(),
        }
    }

    pub fn is_domain_active(&self, domain: &str) -> bool {
        self.active_map.get(domain) == Some(&ClusterDomainState::Active)
    }
}

impl Quorum for FailureDomainsQuorum {
    fn is_node_in_quorum(&self, local_node_info_map: &NodeInfoMap) -> bool {
        let self_domain = local_node_info_map
            .get(&self.self_id)
            .map(|info| info.cluster_domain.as_str())
            .unwrap_or_default();

        if !self.is_domain_active(self_domain) {
            tracing::debug!(
                "Node {} is in inactive domain '{}', not in quorum",
                self.self_id,
                self_domain
            );
            return false;
        }

        let total_in_active_domains: usize = self
            .quorum_members_map
            .iter()
            .filter(|(domain, _)| self.is_domain_active(domain))
            .map(|(_, members)| *members)
            .sum();

        let up_in_active_domains = local_node_info_map
            .values()
            .filter(|info| info.quorum_member && self.is_domain_active(&info.cluster_domain))
            .filter(|info| info.status.is_alive())
            .count();

        up_in_active_domains >= majority(total_in_active_domains)
    }

    fn update_num_of_quorum_members(&mut self, quorum_members: &ClusterDomainsQuorumMembersMap) {
        self.quorum_members_map = quorum_members.clone();
    }

    fn update_cluster_domains_active_map(&mut self, active_map: &ClusterDomainsActiveMap) -> bool {
        let mut changed = false;

        for (domain, state) in active_map {
            let previous = self.active_map.get(domain).copied().unwrap_or_default();
            if previous != *state {
                changed = true;
                match state {
                    ClusterDomainState::Active => {
                        tracing::info!("Marking domain {} as active", domain)
                    }
                    ClusterDomainState::Inactive => {
                        tracing::info!("Marking domain {} as inactive", domain)
                    }
                }
            }
        }
        // A domain missing from the new map is inactive.
        for (domain, state) in &self.active_map {
            if *state == ClusterDomainState::Active && !active_map.contains_key(domain) {
                tracing::info!("Marking domain {} as inactive", domain);
                changed = true;
            }
        }

        self.active_map = active_map.clone();
        changed
    }

    fn provider_type(&self) -> QuorumProviderType {
        QuorumProviderType::FailureDomains
    }
}
