use super::channel::{Connector, MessageChannel, TcpConnector};
use super::config::{GOSSIP_HISTORY_LEN, GossipConfig, GossipIntervals};
use super::history::GossipHistory;
use super::message::GossipMessage;
use crate::error::{GossipError, Result};
use crate::membership::types::*;
use crate::quorum::{QuorumProviderType, new_quorum_provider};
use crate::state::{NodeStateMachine, StateEvent, SuspicionEpisode, Transition};
use crate::store::{GossipStore, MergeReport, StatusSweep};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const STATUS_FEED_CAPACITY: usize = 256;

/// A status change of the local node or of a peer, as seen by this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub node: NodeId,
    pub from: NodeStatus,
    pub to: NodeStatus,
}

/// The store and the state machine move together under one lock, so every
/// transition sees the same map it was computed from.
#[derive(Debug)]
struct Membership {
    store: GossipStore,
    machine: NodeStateMachine,
}

impl Membership {
    fn apply(&mut self, event: StateEvent) -> Transition {
        let transition = self.machine.handle(event, self.store.node_map());
        if transition.changed() {
            self.store.update_self_status(transition.to);
        }
        transition
    }

    fn apply_suspicion_timeout(&mut self, episode_id: u64) -> Option<Transition> {
        let transition = self
            .machine
            .on_suspicion_timeout(episode_id, self.store.node_map())?;
        if transition.changed() {
            self.store.update_self_status(transition.to);
        }
        Some(transition)
    }
}

/// Drives gossip sessions with peers and feeds membership changes into the
/// local state machine.
pub struct Gossiper {
    self_id: NodeId,
    gossip_addr: String,
    fanout: usize,
    membership: Mutex<Membership>,
    /// Peer gossip address -> node id.
    peers: DashMap<String, NodeId>,
    intervals: RwLock<GossipIntervals>,
    node_death_interval: RwLock<Duration>,
    history: GossipHistory,
    connector: Arc<dyn Connector>,
    status_tx: broadcast::Sender<StatusChange>,
    running: Mutex<Option<CancellationToken>>,
}

impl Gossiper {
    pub fn new(config: GossipConfig, connector: Arc<dyn Connector>) -> Arc<Self> {
        let mut store = GossipStore::new(
            config.node_id.clone(),
            config.gen_number,
            config.gossip_version.clone(),
        );
        store.set_self_membership(
            config.quorum_member,
            &config.cluster_domain,
            &config.gossip_addr,
        );
        let machine = NodeStateMachine::new(
            config.node_id.clone(),
            new_quorum_provider(config.node_id.clone(), config.quorum_provider),
        );
        let (status_tx, _) = broadcast::channel(STATUS_FEED_CAPACITY);

        tracing::info!(
            "Gossiper {} created (gen={}, version={}, quorum={})",
            config.node_id,
            config.gen_number,
            config.gossip_version,
            config.quorum_provider
        );

        Arc::new(Self {
            self_id: config.node_id,
            gossip_addr: config.gossip_addr,
            fanout: config.fanout.max(1),
            membership: Mutex::new(Membership { store, machine }),
            peers: DashMap::new(),
            intervals: RwLock::new(config.intervals),
            node_death_interval: RwLock::new(config.node_death_interval),
            history: GossipHistory::new(GOSSIP_HISTORY_LEN),
            connector,
            status_tx,
            running: Mutex::new(None),
        })
    }

    pub fn with_tcp(config: GossipConfig) -> Arc<Self> {
        Self::new(config, Arc::new(TcpConnector))
    }

    // ============================================================
    // PEERS
    // ============================================================

    /// Registers a peer to gossip with. Unknown ids get a placeholder record.
    pub fn add_node(&self, addr: &str, id: NodeId) {
        if id == self.self_id {
            return;
        }

        {
            let mut membership = self.membership.lock();
            if membership.store.local_node_info(&id).is_err() {
                membership.store.add_node(
                    &id,
                    &NodeUpdate {
                        addr: addr.to_string(),
                        quorum_member: true,
                        cluster_domain: String::new(),
                    },
                );
            }
        }

        tracing::info!("Adding peer {} at {}", id, addr);
        self.peers.insert(addr.to_string(), id.clone());
        self.history.add_latest(GossipSessionInfo::new(
            id.to_string(),
            GossipDirection::MeToPeer,
            GossipOp::NodeJoin,
        ));
    }

    /// Stops gossiping with `addr`. The peer's record stays in the store.
    pub fn remove_node(&self, addr: &str) -> Result<()> {
        match self.peers.remove(addr) {
            Some((_, id)) => {
                tracing::info!("Removed peer {} at {}", id, addr);
                Ok(())
            }
            None => Err(GossipError::AddressNotFound(addr.to_string())),
        }
    }

    /// Addresses of the peers currently gossiped with.
    pub fn get_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.peers.iter().map(|e| e.key().clone()).collect();
        nodes.sort();
        nodes
    }

    /// Replaces the cluster membership with `nodes`.
    ///
    /// Listed peers are registered and get placeholder records if unknown.
    /// Peers no longer listed stop counting towards quorum and are no longer
    /// gossiped with. The per-domain member counts are then handed to the
    /// quorum provider.
    pub fn update_cluster(self: &Arc<Self>, nodes: HashMap<NodeId, NodeUpdate>) -> Transition {
        let (transition, members) = {
            let mut membership = self.membership.lock();
            let known: Vec<NodeId> = membership.store.node_map().keys().cloned().collect();

            for id in known {
                if id != self.self_id && !nodes.contains_key(&id) {
                    membership.store.retire_node(&id);
                }
            }
            for (id, update) in &nodes {
                if membership.store.add_node(id, update) {
                    tracing::info!("Node {} joined the cluster at {}", id, update.addr);
                }
            }

            let members = membership.store.quorum_members_by_domain();
            let transition = membership.apply(StateEvent::UpdateClusterSize(members.clone()));
            (transition, members)
        };

        self.peers.retain(|addr, id| {
            *id != self.self_id && nodes.get(id).is_some_and(|update| update.addr == *addr)
        });
        for (id, update) in nodes {
            if id != self.self_id && !update.addr.is_empty() {
                self.peers.insert(update.addr, id);
            }
        }

        tracing::info!("Cluster updated, quorum members per domain: {:?}", members);
        self.after_transitions(vec![transition.clone()]);
        transition
    }

    // ============================================================
    // LOCAL STATE
    // ============================================================

    pub fn node_id(&self) -> &NodeId {
        &self.self_id
    }

    pub fn gossip_addr(&self) -> &str {
        &self.gossip_addr
    }

    pub fn update_self(&self, key: impl Into<StoreKey>, value: serde_json::Value) {
        self.membership.lock().store.update_self(key.into(), value);
    }

    pub fn get_store_key_value(&self, key: &StoreKey) -> NodeValueMap {
        self.membership.lock().store.get_store_key_value(key)
    }

    pub fn get_store_keys(&self) -> Vec<StoreKey> {
        self.membership.lock().store.get_store_keys()
    }

    pub fn get_self_status(&self) -> NodeStatus {
        self.membership.lock().machine.status()
    }

    pub fn get_local_state(&self) -> NodeInfoMap {
        self.membership.lock().store.local_state()
    }

    pub fn get_local_node_info(&self, id: &NodeId) -> Result<NodeInfo> {
        self.membership.lock().store.local_node_info(id)
    }

    pub fn quorum_provider_type(&self) -> QuorumProviderType {
        self.membership.lock().machine.quorum_provider_type()
    }

    /// Merges records learned out of band, as if gossiped by a peer.
    pub fn update(self: &Arc<Self>, new_data: NodeInfoMap) -> MergeReport {
        self.merge_remote(new_data)
    }

    pub fn get_gossip_history(&self) -> Vec<GossipSessionInfo> {
        self.history.get_all_records()
    }

    pub fn log_gossip_history(&self) {
        self.history.log_records();
    }

    /// Feed of status changes of this node and of its peers.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.status_tx.subscribe()
    }

    // ============================================================
    // INTERVALS
    // ============================================================

    pub fn intervals(&self) -> GossipIntervals {
        *self.intervals.read()
    }

    pub fn gossip_interval(&self) -> Duration {
        self.intervals.read().gossip_interval
    }

    /// Takes effect from the next round.
    pub fn set_gossip_interval(&self, interval: Duration) {
        self.intervals.write().gossip_interval = interval;
    }

    pub fn node_death_interval(&self) -> Duration {
        *self.node_death_interval.read()
    }

    pub fn set_node_death_interval(&self, interval: Duration) {
        *self.node_death_interval.write() = interval;
    }

    // ============================================================
    // STATE MACHINE INPUTS
    // ============================================================

    pub fn update_num_of_quorum_members(
        self: &Arc<Self>,
        members: ClusterDomainsQuorumMembersMap,
    ) -> Transition {
        self.dispatch(StateEvent::UpdateClusterSize(members))
    }

    pub fn update_cluster_domains_active_map(
        self: &Arc<Self>,
        active_map: ClusterDomainsActiveMap,
    ) -> Transition {
        self.dispatch(StateEvent::UpdateClusterDomainsActiveMap(active_map))
    }

    /// Reports that an external observer saw `id` leave.
    ///
    /// While this node is `Up` the peer is marked down and its id returned.
    /// Otherwise this node takes itself down and returns its own id.
    pub fn external_node_leave(self: &Arc<Self>, id: &NodeId) -> Result<NodeId> {
        let (left, transitions, peer_change) = {
            let mut membership = self.membership.lock();
            if membership.machine.status() == NodeStatus::Up {
                let previous = membership.store.local_node_info(id)?.status;
                membership.store.update_node_status(id, NodeStatus::Down)?;
                let transition = membership.apply(StateEvent::NodeLeave);
                let change = StatusChange {
                    node: id.clone(),
                    from: previous,
                    to: NodeStatus::Down,
                };
                (id.clone(), vec![transition], Some(change))
            } else {
                let transition = membership.apply(StateEvent::SelfLeave);
                (self.self_id.clone(), vec![transition], None)
            }
        };

        tracing::info!("External leave of {} handled, {} is out", id, left);
        if let Some(change) = peer_change
            && change.from != change.to
        {
            let _ = self.status_tx.send(change);
        }
        self.after_transitions(transitions);
        Ok(left)
    }

    /// Feeds one event to the state machine.
    pub fn dispatch(self: &Arc<Self>, event: StateEvent) -> Transition {
        let transition = self.membership.lock().apply(event);
        self.after_transitions(vec![transition.clone()]);
        transition
    }

    fn after_transitions(self: &Arc<Self>, transitions: Vec<Transition>) {
        for transition in transitions {
            if transition.changed() {
                let _ = self.status_tx.send(StatusChange {
                    node: self.self_id.clone(),
                    from: transition.from,
                    to: transition.to,
                });
            }
            if let Some(episode) = transition.suspicion {
                self.arm_suspicion_timer(episode);
            }
        }
    }

    fn arm_suspicion_timer(self: &Arc<Self>, episode: SuspicionEpisode) {
        let quorum_timeout = self.intervals.read().quorum_timeout;
        let gossiper = Arc::clone(self);

        tracing::debug!(
            "Suspicion episode {} armed for {:?}",
            episode.id,
            quorum_timeout
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = episode.token.cancelled() => {
                    tracing::debug!("Suspicion episode {} cancelled", episode.id);
                }
                _ = tokio::time::sleep(quorum_timeout) => {
                    let transition = gossiper
                        .membership
                        .lock()
                        .apply_suspicion_timeout(episode.id);
                    if let Some(transition) = transition {
                        gossiper.after_transitions(vec![transition]);
                    }
                }
            }
        });
    }

    // ============================================================
    // LIFECYCLE
    // ============================================================

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Announces this node as alive and spawns the gossip, push-pull and probe loops.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let shutdown = {
            let mut running = self.running.lock();
            if running.is_some() {
                return Err(GossipError::AlreadyRunning);
            }
            let token = CancellationToken::new();
            *running = Some(token.clone());
            token
        };

        tracing::info!("Starting gossiper {} on {}", self.self_id, self.gossip_addr);
        self.dispatch(StateEvent::SelfAlive);

        let gossiper = Arc::clone(self);
        let token = shutdown.clone();
        tokio::spawn(async move { gossiper.gossip_loop(token).await });

        let gossiper = Arc::clone(self);
        let token = shutdown.clone();
        tokio::spawn(async move { gossiper.push_pull_loop(token).await });

        let gossiper = Arc::clone(self);
        tokio::spawn(async move { gossiper.probe_loop(shutdown).await });

        Ok(())
    }

    /// Stops the loops, cancels any pending suspicion and takes this node down.
    pub fn stop(self: &Arc<Self>) -> Result<()> {
        let token = self.running.lock().take().ok_or(GossipError::NotRunning)?;
        token.cancel();

        let transition = {
            let mut membership = self.membership.lock();
            membership.machine.cancel_suspicion();
            membership.apply(StateEvent::SelfLeave)
        };
        tracing::info!("Gossiper {} stopped", self.self_id);
        self.after_transitions(vec![transition]);
        Ok(())
    }

    async fn gossip_loop(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let interval = self.gossip_interval();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            self.gossip_round();
        }
    }

    async fn push_pull_loop(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let interval = self.intervals.read().push_pull_interval;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let Some((addr, _)) = self.select_peers(1).into_iter().next() else {
                continue;
            };
            let gossiper = Arc::clone(&self);
            tokio::spawn(async move {
                let _ = gossiper.push_pull_with(&addr).await;
            });
        }
    }

    async fn probe_loop(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let interval = self.intervals.read().probe_interval;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            self.probe_round();
        }
    }

    fn select_peers(&self, count: usize) -> Vec<(String, NodeId)> {
        let peers: Vec<(String, NodeId)> = self
            .peers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let mut rng = rand::thread_rng();
        peers.choose_multiple(&mut rng, count).cloned().collect()
    }

    // ============================================================
    // ROUNDS
    // ============================================================

    /// Starts a diff session with up to `fanout` random peers.
    ///
    /// Sessions run on their own tasks so a slow peer does not hold up the others.
    pub fn gossip_round(self: &Arc<Self>) {
        self.membership.lock().store.touch_self();

        for (addr, _) in self.select_peers(self.fanout) {
            let gossiper = Arc::clone(self);
            tokio::spawn(async move {
                let _ = gossiper.gossip_with(&addr).await;
            });
        }
    }

    /// Runs the failure detector and feeds the outcome to the state machine.
    pub fn probe_round(self: &Arc<Self>) -> StatusSweep {
        let probe_interval = self.intervals.read().probe_interval;
        let death_interval = self.node_death_interval();
        self.sweep(probe_interval, death_interval, true)
    }

    fn sweep(
        self: &Arc<Self>,
        probe_interval: Duration,
        death_interval: Duration,
        heartbeat: bool,
    ) -> StatusSweep {
        let (sweep, previous, transitions) = {
            let mut membership = self.membership.lock();
            if heartbeat {
                membership.store.touch_self();
            }
            let previous: HashMap<NodeId, NodeStatus> = membership
                .store
                .node_map()
                .iter()
                .map(|(id, info)| (id.clone(), info.status))
                .collect();

            let sweep = membership
                .store
                .update_node_statuses(probe_interval, death_interval);

            let mut transitions = Vec::new();
            if !sweep.died.is_empty() {
                transitions.push(membership.apply(StateEvent::NodeLeave));
            }
            if !sweep.revived.is_empty() {
                transitions.push(membership.apply(StateEvent::NodeAlive));
            }
            if heartbeat {
                transitions.push(membership.apply(StateEvent::SelfAlive));
            }
            (sweep, previous, transitions)
        };

        for (ids, to, op) in [
            (&sweep.died, NodeStatus::Down, GossipOp::NodeLeave),
            (&sweep.revived, NodeStatus::Up, GossipOp::NodeAlive),
        ] {
            for id in ids {
                let from = previous.get(id).copied().unwrap_or_default();
                tracing::info!("Peer {} is now {} (was {})", id, to, from);
                self.history.add_latest(GossipSessionInfo::new(
                    id.to_string(),
                    GossipDirection::MeToPeer,
                    op,
                ));
                let _ = self.status_tx.send(StatusChange {
                    node: id.clone(),
                    from,
                    to,
                });
            }
        }

        self.after_transitions(transitions);
        sweep
    }

    // ============================================================
    // OUTBOUND SESSIONS
    // ============================================================

    /// Runs one diff session with the peer at `addr`.
    pub async fn gossip_with(self: &Arc<Self>, addr: &str) -> Result<()> {
        let deadline = self.diff_deadline();

        let result = match tokio::time::timeout(deadline, self.diff_session(addr)).await {
            Ok(result) => result,
            Err(_) => Err(GossipError::Timeout(format!("diff session with {}", addr))),
        };
        self.record_session(addr, GossipDirection::MeToPeer, GossipOp::Diff, &result);
        result
    }

    fn diff_deadline(&self) -> Duration {
        let intervals = self.intervals();
        intervals.gossip_interval.max(intervals.probe_timeout)
    }

    /// Exchanges full state with the peer at `addr`.
    pub async fn push_pull_with(self: &Arc<Self>, addr: &str) -> Result<()> {
        let intervals = self.intervals();
        let deadline = intervals.push_pull_interval.max(intervals.probe_timeout);

        let result = match tokio::time::timeout(deadline, self.push_pull_session(addr)).await {
            Ok(result) => result,
            Err(_) => Err(GossipError::Timeout(format!("push-pull with {}", addr))),
        };
        self.record_session(addr, GossipDirection::MeToPeer, GossipOp::PushPull, &result);
        result
    }

    async fn connect(&self, addr: &str) -> Result<Box<dyn MessageChannel>> {
        let probe_timeout = self.intervals.read().probe_timeout;
        match tokio::time::timeout(probe_timeout, self.connector.connect(addr)).await {
            Ok(channel) => channel,
            Err(_) => Err(GossipError::Timeout(format!("connect to {}", addr))),
        }
    }

    async fn diff_session(self: &Arc<Self>, addr: &str) -> Result<()> {
        let mut channel = self.connect(addr).await?;
        let result = self.run_diff(channel.as_mut()).await;
        channel.close().await;
        result
    }

    async fn run_diff(self: &Arc<Self>, channel: &mut dyn MessageChannel) -> Result<()> {
        let (meta, gossip_version) = {
            let mut membership = self.membership.lock();
            membership.store.touch_self();
            (
                membership.store.meta_info(),
                membership.store.gossip_version().to_string(),
            )
        };

        channel
            .send_data(&GossipMessage::MetaRequest {
                from: self.self_id.clone(),
                gossip_version,
                meta,
            })
            .await?;

        let (peer_id, remote_meta) = match channel.rcv_data().await? {
            GossipMessage::MetaReply {
                from,
                gossip_version,
                meta,
            } => {
                self.check_version(channel.peer(), &gossip_version)?;
                (from, meta)
            }
            other => return Err(GossipError::UnexpectedMessage(other.name().to_string())),
        };
        self.check_peer_generation(&peer_id, &remote_meta);

        let (stale, push) = {
            let membership = self.membership.lock();
            let (stale, mut fresh) = membership.store.diff(&remote_meta);
            fresh.extend(membership.store.missing_from(&remote_meta));
            (stale, membership.store.subset(&fresh))
        };

        if !stale.is_empty() {
            tracing::debug!("Pulling {} records from {}", stale.len(), peer_id);
            channel
                .send_data(&GossipMessage::PullRequest { nodes: stale })
                .await?;
            match channel.rcv_data().await? {
                GossipMessage::PullReply { nodes } => {
                    self.merge_remote(nodes);
                }
                other => return Err(GossipError::UnexpectedMessage(other.name().to_string())),
            }
        }

        if !push.is_empty() {
            tracing::debug!("Pushing {} records to {}", push.len(), peer_id);
            channel
                .send_data(&GossipMessage::Push { nodes: push })
                .await?;
            match channel.rcv_data().await? {
                GossipMessage::PushAck => {}
                other => return Err(GossipError::UnexpectedMessage(other.name().to_string())),
            }
        }

        channel.send_data(&GossipMessage::Done).await
    }

    async fn push_pull_session(self: &Arc<Self>, addr: &str) -> Result<()> {
        let mut channel = self.connect(addr).await?;
        let result = self.run_push_pull(channel.as_mut()).await;
        channel.close().await;
        result
    }

    async fn run_push_pull(self: &Arc<Self>, channel: &mut dyn MessageChannel) -> Result<()> {
        let (state, gossip_version) = {
            let mut membership = self.membership.lock();
            membership.store.touch_self();
            (
                membership.store.local_state(),
                membership.store.gossip_version().to_string(),
            )
        };

        channel
            .send_data(&GossipMessage::PushPull {
                from: self.self_id.clone(),
                gossip_version,
                state,
            })
            .await?;
        match channel.rcv_data().await? {
            GossipMessage::PushPullReply { state, .. } => {
                self.merge_remote(state);
            }
            other => return Err(GossipError::UnexpectedMessage(other.name().to_string())),
        }
        channel.send_data(&GossipMessage::Done).await
    }

    // ============================================================
    // INBOUND SESSIONS
    // ============================================================

    /// Answers one inbound session until the peer is done or the channel fails.
    pub async fn serve_channel(self: Arc<Self>, mut channel: Box<dyn MessageChannel>) {
        let peer = channel.peer().to_string();
        let mut op = GossipOp::Diff;
        // A silent peer must not hold the task or the socket.
        let deadline = self
            .diff_deadline()
            .max(self.intervals.read().push_pull_interval);

        let result = loop {
            let msg = match tokio::time::timeout(deadline, channel.rcv_data()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(GossipError::ChannelClosed)) => break Ok(()),
                Ok(Err(e)) => break Err(e),
                Err(_) => {
                    break Err(GossipError::Timeout(format!(
                        "inbound session from {} idle for {:?}",
                        peer, deadline
                    )));
                }
            };
            if let GossipMessage::PushPull { .. } = msg {
                op = GossipOp::PushPull;
            }
            match self.answer(msg) {
                Ok(Some(reply)) => {
                    if let Err(e) = channel.send_data(&reply).await {
                        break Err(e);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.record_session(&peer, GossipDirection::PeerToMe, op, &result);
        channel.close().await;
    }

    /// Reply to one inbound message, or `None` once the session is over.
    fn answer(self: &Arc<Self>, msg: GossipMessage) -> Result<Option<GossipMessage>> {
        let reply = match msg {
            GossipMessage::MetaRequest {
                from,
                gossip_version,
                meta,
            } => {
                self.check_version(&from.0, &gossip_version)?;
                self.check_peer_generation(&from, &meta);
                let mut membership = self.membership.lock();
                membership.store.touch_self();
                GossipMessage::MetaReply {
                    from: self.self_id.clone(),
                    gossip_version: membership.store.gossip_version().to_string(),
                    meta: membership.store.meta_info(),
                }
            }
            GossipMessage::PullRequest { nodes } => GossipMessage::PullReply {
                nodes: self.membership.lock().store.subset(&nodes),
            },
            GossipMessage::Push { nodes } => {
                self.merge_remote(nodes);
                GossipMessage::PushAck
            }
            GossipMessage::PushPull {
                from,
                gossip_version,
                state,
            } => {
                self.check_version(&from.0, &gossip_version)?;
                let local = {
                    let mut membership = self.membership.lock();
                    membership.store.touch_self();
                    membership.store.local_state()
                };
                self.merge_remote(state);
                GossipMessage::PushPullReply {
                    from: self.self_id.clone(),
                    state: local,
                }
            }
            GossipMessage::Done => return Ok(None),
            other => return Err(GossipError::UnexpectedMessage(other.name().to_string())),
        };
        Ok(Some(reply))
    }

    // ============================================================
    // MERGE
    // ============================================================

    fn check_version(&self, peer: &str, remote: &str) -> Result<()> {
        let local = self.membership.lock().store.gossip_version().to_string();
        if local != remote {
            tracing::warn!(
                "Gossip version mismatch with {}: local {}, remote {}",
                peer,
                local,
                remote
            );
            return Err(GossipError::VersionMismatch {
                peer: peer.to_string(),
                local,
                remote: remote.to_string(),
            });
        }
        Ok(())
    }

    /// Flags a peer that announces a lower generation than the one held locally.
    fn check_peer_generation(&self, peer_id: &NodeId, remote_meta: &StoreMetaInfo) {
        let Some(remote) = remote_meta.get(peer_id) else {
            return;
        };

        let mut membership = self.membership.lock();
        let held = match membership.store.local_node_info(peer_id) {
            Ok(info) => info.gen_number,
            Err(_) => return,
        };
        if remote.gen_number < held && membership.store.mark_node_has_old_gen(peer_id) {
            tracing::warn!(
                "Peer {} announced generation {} but {} is known",
                peer_id,
                remote.gen_number,
                held
            );
        }
    }

    fn merge_remote(self: &Arc<Self>, nodes: NodeInfoMap) -> MergeReport {
        if nodes.is_empty() {
            return MergeReport::default();
        }

        let report = self.membership.lock().store.update(nodes);
        for id in &report.restarted {
            tracing::info!("Node {} restarted with a new generation", id);
        }
        for id in &report.adopted {
            tracing::debug!("Learned about node {}", id);
        }

        if !report.is_empty() {
            // Records that just moved forward may revive peers immediately.
            let intervals = self.intervals();
            self.sweep(intervals.probe_interval, self.node_death_interval(), false);
        }
        report
    }

    fn record_session(&self, node: &str, dir: GossipDirection, op: GossipOp, result: &Result<()>) {
        let mut session = GossipSessionInfo::new(node, dir, op);
        if let Err(e) = result {
            tracing::debug!("Gossip {:?} with {} failed: {}", op, node, e);
            session.err = Some(e.to_string());
        }
        self.history.add_latest(session);
    }
}
