use crate::error::{GossipError, Result};
use crate::membership::types::{
    ClusterDomainsQuorumMembersMap, NodeId, NodeInfo, NodeInfoMap, NodeMetaInfo, NodeStatus,
    NodeUpdate, NodeValue, NodeValueMap, StoreKey, StoreMetaInfo, now_ms,
};

use std::collections::BTreeSet;
use std::time::Duration;

/// Outcome of merging a batch of remote records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Ids seen for the first time.
    pub adopted: Vec<NodeId>,
    /// Ids whose local record was replaced by a newer one.
    pub replaced: Vec<NodeId>,
    /// Subset of `replaced` where the generation number went up, i.e. the node restarted.
    pub restarted: Vec<NodeId>,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.replaced.is_empty()
    }
}

/// Status transitions produced by one failure-detector sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusSweep {
    pub died: Vec<NodeId>,
    pub revived: Vec<NodeId>,
}

/// The local node's record plus the latest known record of every peer.
///
/// The store has no interior locking: the gossiper keeps it behind the same
/// mutex as the node state machine.
#[derive(Debug, Clone)]
pub struct GossipStore {
    id: NodeId,
    gossip_version: String,
    node_map: NodeInfoMap,
}

impl GossipStore {
    /// Creates a store holding only the local record, in `Down` state.
    pub fn new(id: NodeId, gen_number: u64, gossip_version: impl Into<String>) -> Self {
        let mut local = NodeInfo::new(id.clone(), gen_number, NodeStatus::Down);
        local.last_update_ts = now_ms();

        let mut node_map = NodeInfoMap::new();
        node_map.insert(id.clone(), local);

        Self {
            id,
            gossip_version: gossip_version.into(),
            node_map,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.id
    }

    pub fn gossip_version(&self) -> &str {
        &self.gossip_version
    }

    pub fn gen_number(&self) -> u64 {
        self.local().map(|info| info.gen_number).unwrap_or(0)
    }

    fn local(&self) -> Option<&NodeInfo> {
        self.node_map.get(&self.id)
    }

    fn local_mut(&mut self) -> &mut NodeInfo {
        let id = self.id.clone();
        self.node_map
            .entry(id.clone())
            .or_insert_with(|| NodeInfo::new(id, 0, NodeStatus::Down))
    }

    /// Strictly increasing timestamp for the local record, so two updates within
    /// the same millisecond still order correctly on every peer.
    fn bump_local_ts(&mut self) {
        let local = self.local_mut();
        local.last_update_ts = now_ms().max(local.last_update_ts + 1);
    }

    /// Publishes `value` under `key` in the local record.
    pub fn update_self(&mut self, key: StoreKey, value: serde_json::Value) {
        self.local_mut().value.insert(key, value);
        self.bump_local_ts();
    }

    /// Heartbeat: advances the local timestamp so peers keep seeing us as alive.
    pub fn touch_self(&mut self) {
        self.bump_local_ts();
    }

    pub fn update_self_status(&mut self, status: NodeStatus) {
        self.local_mut().status = status;
        self.bump_local_ts();
    }

    pub fn self_status(&self) -> NodeStatus {
        self.local().map(|info| info.status).unwrap_or_default()
    }

    /// Sets the local node's quorum participation, failure domain and address.
    pub fn set_self_membership(&mut self, quorum_member: bool, cluster_domain: &str, addr: &str) {
        let local = self.local_mut();
        local.quorum_member = quorum_member;
        local.cluster_domain = cluster_domain.to_string();
        local.addr = addr.to_string();
    }

    /// Overrides the locally observed status of a node.
    pub fn update_node_status(&mut self, id: &NodeId, status: NodeStatus) -> Result<()> {
        let info = self
            .node_map
            .get_mut(id)
            .ok_or_else(|| GossipError::NodeNotFound(id.clone()))?;
        info.status = status;
        Ok(())
    }

    /// Registers a node known by configuration, or refreshes its topology fields.
    ///
    /// Returns true if the node was not known before.
    pub fn add_node(&mut self, id: &NodeId, update: &NodeUpdate) -> bool {
        let is_new = !self.node_map.contains_key(id);
        let info = self
            .node_map
            .entry(id.clone())
            .or_insert_with(|| NodeInfo::placeholder(id.clone()));

        info.quorum_member = update.quorum_member;
        info.cluster_domain = update.cluster_domain.clone();
        info.addr = update.addr.clone();

        if is_new {
            tracing::info!("Adding node {} to gossip map", id);
        }
        is_new
    }

    /// Excludes a node from quorum math without dropping its record.
    pub fn retire_node(&mut self, id: &NodeId) -> bool {
        match self.node_map.get_mut(id) {
            Some(info) if info.quorum_member => {
                tracing::info!("Node {} is no longer a quorum member", id);
                info.quorum_member = false;
                true
            }
            _ => false,
        }
    }

    /// Every known node's value for `key`; nodes that never set it are omitted.
    pub fn get_store_key_value(&self, key: &StoreKey) -> NodeValueMap {
        self.node_map
            .iter()
            .filter_map(|(id, info)| {
                info.value.get(key).map(|value| {
                    (
                        id.clone(),
                        NodeValue {
                            id: info.id.clone(),
                            gen_number: info.gen_number,
                            last_update_ts: info.last_update_ts,
                            status: info.status,
                            value: value.clone(),
                        },
                    )
                })
            })
            .collect()
    }

    /// Union of keys published by any known node, sorted.
    pub fn get_store_keys(&self) -> Vec<StoreKey> {
        let keys: BTreeSet<&StoreKey> = self
            .node_map
            .values()
            .flat_map(|info| info.value.keys())
            .collect();
        keys.into_iter().cloned().collect()
    }

    /// Flags that a peer advertised an older generation for `id` than the one held.
    ///
    /// Returns false if `id` is unknown. The flag is cleared by the next merge that
    /// replaces the record.
    pub fn mark_node_has_old_gen(&mut self, id: &NodeId) -> bool {
        match self.node_map.get_mut(id) {
            Some(info) => {
                if !info.has_old_gen() {
                    info.wait_for_gen_update_ts = now_ms();
                }
                true
            }
            None => false,
        }
    }

    /// Last-writer-wins merge guarded by generation.
    ///
    /// Incoming records replace local ones only when `(gen_number, last_update_ts)`
    /// is strictly greater. The local record is never overwritten.
    ///
    /// Status, quorum membership and failure domain are local configuration:
    /// a replaced record keeps the held values, and an adopted one does not vote
    /// until [`add_node`](Self::add_node) lists it.
    pub fn update(&mut self, new_data: NodeInfoMap) -> MergeReport {
        let mut report = MergeReport::default();

        for (id, mut incoming) in new_data {
            if id == self.id {
                continue;
            }
            incoming.id = id.clone();
            incoming.wait_for_gen_update_ts = 0;

            match self.node_map.get_mut(&id) {
                None => {
                    incoming.status = NodeStatus::Down;
                    incoming.quorum_member = false;
                    tracing::debug!("Discovered node {} via gossip", id);
                    self.node_map.insert(id.clone(), incoming);
                    report.adopted.push(id);
                }
                Some(existing) if incoming.version() > existing.version() => {
                    if incoming.gen_number > existing.gen_number {
                        tracing::info!(
                            "Node {} restarted: gen {} -> {}",
                            id,
                            existing.gen_number,
                            incoming.gen_number
                        );
                        report.restarted.push(id.clone());
                    }
                    incoming.status = existing.status;
                    incoming.quorum_member = existing.quorum_member;
                    incoming.cluster_domain = std::mem::take(&mut existing.cluster_domain);
                    if !existing.addr.is_empty() {
                        incoming.addr = std::mem::take(&mut existing.addr);
                    }
                    *existing = incoming;
                    report.replaced.push(id);
                }
                Some(_) => {}
            }
        }

        report.adopted.sort();
        report.replaced.sort();
        report.restarted.sort();
        report
    }

    /// Full records for the requested ids; unknown ids are skipped.
    pub fn subset(&self, nodes: &[NodeId]) -> NodeInfoMap {
        nodes
            .iter()
            .filter_map(|id| self.node_map.get(id).map(|info| (id.clone(), info.clone())))
            .collect()
    }

    pub fn meta_info(&self) -> StoreMetaInfo {
        self.node_map
            .iter()
            .map(|(id, info)| {
                (
                    id.clone(),
                    NodeMetaInfo {
                        gossip_version: self.gossip_version.clone(),
                        id: id.clone(),
                        gen_number: info.gen_number,
                        last_update_ts: info.last_update_ts,
                    },
                )
            })
            .collect()
    }

    /// Classifies every id in `remote` as `(stale, fresh)`.
    ///
    /// `stale` ids should be pulled from the peer, `fresh` ids pushed to it. Equal
    /// versions land in neither list. The local record is never reported stale.
    pub fn diff(&self, remote: &StoreMetaInfo) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut stale = Vec::new();
        let mut fresh = Vec::new();

        for (id, meta) in remote {
            match self.node_map.get(id) {
                None => {
                    if *id != self.id {
                        stale.push(id.clone());
                    }
                }
                Some(local) => {
                    if local.version() < meta.version() {
                        if *id != self.id {
                            stale.push(id.clone());
                        }
                    } else if local.version() > meta.version() {
                        fresh.push(id.clone());
                    }
                }
            }
        }

        stale.sort();
        fresh.sort();
        (stale, fresh)
    }

    /// Ids held locally that `remote` has never heard of.
    pub fn missing_from(&self, remote: &StoreMetaInfo) -> Vec<NodeId> {
        let mut missing: Vec<NodeId> = self
            .node_map
            .keys()
            .filter(|id| !remote.contains_key(*id))
            .cloned()
            .collect();
        missing.sort();
        missing
    }

    /// Failure-detector sweep over every peer record.
    pub fn update_node_statuses(
        &mut self,
        probe_interval: Duration,
        node_death_interval: Duration,
    ) -> StatusSweep {
        self.update_node_statuses_at(now_ms(), probe_interval, node_death_interval)
    }

    pub(crate) fn update_node_statuses_at(
        &mut self,
        now: u64,
        probe_interval: Duration,
        node_death_interval: Duration,
    ) -> StatusSweep {
        let probe_ms = probe_interval.as_millis() as u64;
        let death_ms = node_death_interval.as_millis() as u64;
        let mut sweep = StatusSweep::default();

        for (id, info) in self.node_map.iter_mut() {
            if *id == self.id {
                continue;
            }

            let old_gen_expired =
                info.has_old_gen() && now.saturating_sub(info.wait_for_gen_update_ts) > probe_ms;
            let stale = now.saturating_sub(info.last_update_ts) > death_ms;

            if old_gen_expired || stale {
                let next = if info.last_update_ts == 0 && !old_gen_expired {
                    NodeStatus::NeverGossiped
                } else {
                    NodeStatus::Down
                };
                if info.status != next {
                    if info.status.is_alive() {
                        tracing::warn!(
                            "Node {} marked {} (last update {} ms ago)",
                            id,
                            next,
                            now.saturating_sub(info.last_update_ts)
                        );
                        sweep.died.push(id.clone());
                    }
                    info.status = next;
                }
            } else if !info.has_old_gen() && !info.status.is_alive() {
                tracing::info!("Node {} is alive", id);
                info.status = NodeStatus::Up;
                sweep.revived.push(id.clone());
            }
        }

        sweep.died.sort();
        sweep.revived.sort();
        sweep
    }

    /// Copy of every record.
    pub fn local_state(&self) -> NodeInfoMap {
        self.node_map.clone()
    }

    pub fn node_map(&self) -> &NodeInfoMap {
        &self.node_map
    }

    pub fn local_node_info(&self, id: &NodeId) -> Result<NodeInfo> {
        self.node_map
            .get(id)
            .cloned()
            .ok_or_else(|| GossipError::NodeNotFound(id.clone()))
    }

    /// Number of quorum members per failure domain, across all known records.
    pub fn quorum_members_by_domain(&self) -> ClusterDomainsQuorumMembersMap {
        let mut members = ClusterDomainsQuorumMembersMap::new();
        for info in self.node_map.values().filter(|info| info.quorum_member) {
            *members.entry(info.cluster_domain.clone()).or_insert(0) += 1;
        }
        members
    }
}
