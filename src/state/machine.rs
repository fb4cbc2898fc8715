use crate::membership::types::{
    ClusterDomainsActiveMap, ClusterDomainsQuorumMembersMap, NodeId, NodeInfoMap, NodeStatus,
};
use crate::quorum::{Quorum, QuorumProviderType};

use tokio_util::sync::CancellationToken;

/// Membership events fed to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    SelfAlive,
    NodeAlive,
    SelfLeave,
    NodeLeave,
    UpdateClusterSize(ClusterDomainsQuorumMembersMap),
    UpdateClusterDomainsActiveMap(ClusterDomainsActiveMap),
    /// The grace period of the current suspicion episode expired.
    Timeout,
}

/// One stay in `SuspectNotInQuorum`.
#[derive(Debug, Clone)]
pub struct SuspicionEpisode {
    pub id: u64,
    /// Cancelled as soon as the machine leaves the suspect state.
    pub token: CancellationToken,
}

/// Result of handling one event.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: NodeStatus,
    pub to: NodeStatus,
    /// Set when this transition opened a suspicion episode; the caller must arm its timer.
    pub suspicion: Option<SuspicionEpisode>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug)]
pub struct NodeStateMachine {
    self_id: NodeId,
    status: NodeStatus,
    quorum: Box<dyn Quorum>,
    next_episode: u64,
    episode: Option<SuspicionEpisode>,
}

impl NodeStateMachine {
    /// A machine starts in `Down`.
    pub fn new(self_id: NodeId, quorum: Box<dyn Quorum>) -> Self {
        Self {
            self_id,
            status: NodeStatus::Down,
            quorum,
            next_episode: 1,
            episode: None,
        }
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn quorum_provider_type(&self) -> QuorumProviderType {
        self.quorum.provider_type()
    }

    pub fn is_in_quorum(&self, local_node_info_map: &NodeInfoMap) -> bool {
        self.quorum.is_node_in_quorum(local_node_info_map)
    }

    /// Id of the open suspicion episode, if any.
    pub fn current_episode(&self) -> Option<u64> {
        self.episode.as_ref().map(|episode| episode.id)
    }

    pub fn handle(&mut self, event: StateEvent, local_node_info_map: &NodeInfoMap) -> Transition {
        let from = self.status;

        let domains_changed = match &event {
            StateEvent::UpdateClusterSize(members) => {
                self.quorum.update_num_of_quorum_members(members);
                false
            }
            StateEvent::UpdateClusterDomainsActiveMap(active_map) => {
                self.quorum.update_cluster_domains_active_map(active_map)
            }
            _ => false,
        };

        let to = match from {
            NodeStatus::NotInQuorum => match event {
                StateEvent::SelfAlive | StateEvent::NodeAlive | StateEvent::UpdateClusterSize(_) => {
                    self.up_if_in_quorum(from, local_node_info_map)
                }
                StateEvent::UpdateClusterDomainsActiveMap(_) if domains_changed => {
                    self.up_if_in_quorum(from, local_node_info_map)
                }
                StateEvent::SelfLeave => NodeStatus::Down,
                _ => from,
            },
            NodeStatus::SuspectNotInQuorum => match event {
                StateEvent::NodeAlive | StateEvent::UpdateClusterSize(_) => {
                    self.up_if_in_quorum(from, local_node_info_map)
                }
                StateEvent::UpdateClusterDomainsActiveMap(_) if domains_changed => {
                    self.up_if_in_quorum(from, local_node_info_map)
                }
                StateEvent::Timeout => {
                    self.up_if_in_quorum(NodeStatus::NotInQuorum, local_node_info_map)
                }
                StateEvent::SelfLeave => NodeStatus::Down,
                _ => from,
            },
            NodeStatus::Up => match event {
                StateEvent::NodeLeave | StateEvent::UpdateClusterSize(_) => {
                    self.suspect_unless_in_quorum(local_node_info_map)
                }
                StateEvent::UpdateClusterDomainsActiveMap(_) if domains_changed => {
                    self.suspect_unless_in_quorum(local_node_info_map)
                }
                StateEvent::SelfLeave => NodeStatus::Down,
                _ => from,
            },
            _ => match event {
                StateEvent::SelfAlive => NodeStatus::NotInQuorum,
                _ => NodeStatus::Down,
            },
        };

        self.status = to;
        let suspicion = self.track_episode(from, to);

        if from != to {
            if to == NodeStatus::SuspectNotInQuorum || to == NodeStatus::NotInQuorum {
                tracing::warn!("Node {} status {} -> {}", self.self_id, from, to);
            } else {
                tracing::info!("Node {} status {} -> {}", self.self_id, from, to);
            }
        }

        Transition {
            from,
            to,
            suspicion,
        }
    }

    /// Delivers the expiry of suspicion episode `episode_id`.
    ///
    /// Returns `None` without touching the state if that episode is no longer open.
    pub fn on_suspicion_timeout(
        &mut self,
        episode_id: u64,
        local_node_info_map: &NodeInfoMap,
    ) -> Option<Transition> {
        if self.current_episode() != Some(episode_id) {
            tracing::debug!(
                "Ignoring expiry of closed suspicion episode {} on {}",
                episode_id,
                self.self_id
            );
            return None;
        }
        Some(self.handle(StateEvent::Timeout, local_node_info_map))
    }

    /// Cancels the open suspicion episode, if any, without changing state.
    pub fn cancel_suspicion(&mut self) {
        if let Some(episode) = self.episode.take() {
            episode.token.cancel();
        }
    }

    fn up_if_in_quorum(&self, otherwise: NodeStatus, map: &NodeInfoMap) -> NodeStatus {
        if self.quorum.is_node_in_quorum(map) {
            NodeStatus::Up
        } else {
            otherwise
        }
    }

    fn suspect_unless_in_quorum(&self, map: &NodeInfoMap) -> NodeStatus {
        if self.quorum.is_node_in_quorum(map) {
            NodeStatus::Up
        } else {
            NodeStatus::SuspectNotInQuorum
        }
    }

    fn track_episode(&mut self, from: NodeStatus, to: NodeStatus) -> Option<SuspicionEpisode> {
        let was_suspect = from == NodeStatus::SuspectNotInQuorum;
        let is_suspect = to == NodeStatus::SuspectNotInQuorum;

        if was_suspect && !is_suspect {
            self.cancel_suspicion();
            None
        } else if !was_suspect && is_suspect {
            let episode = SuspicionEpisode {
                id: self.next_episode,
                token: CancellationToken::new(),
            };
            self.next_episode += 1;
            self.episode = Some(episode.clone());
            Some(episode)
        } else {
            None
        }
    }
}
