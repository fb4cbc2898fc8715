//! Wire messages exchanged between gossipers over a message channel.
//!
//! A diff session is `MetaRequest -> MetaReply`, then optionally
//! `PullRequest -> PullReply` and `Push -> PushAck`, then `Done`.
//! A full sync is `PushPull -> PushPullReply`, then `Done`.

use crate::membership::types::{NodeId, NodeInfoMap, StoreMetaInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GossipMessage {
    MetaRequest {
        from: NodeId,
        gossip_version: String,
        meta: StoreMetaInfo,
    },
    MetaReply {
        from: NodeId,
        gossip_version: String,
        meta: StoreMetaInfo,
    },
    PullRequest {
        nodes: Vec<NodeId>,
    },
    PullReply {
        nodes: NodeInfoMap,
    },
    Push {
        nodes: NodeInfoMap,
    },
    PushAck,
    PushPull {
        from: NodeId,
        gossip_version: String,
        state: NodeInfoMap,
    },
    PushPullReply {
        from: NodeId,
        state: NodeInfoMap,
    },
    Done,
}

impl GossipMessage {
    pub fn name(&self) -> &'static str {
        match self {
            GossipMessage::MetaRequest { .. } => "MetaRequest",
            GossipMessage::MetaReply { .. } => "MetaReply",
            GossipMessage::PullRequest { .. } => "PullRequest",
            GossipMessage::PullReply { .. } => "PullReply",
            GossipMessage::Push { .. } => "Push",
            GossipMessage::PushAck => "PushAck",
            GossipMessage::PushPull { .. } => "PushPull",
            GossipMessage::PushPullReply { .. } => "PushPullReply",
            GossipMessage::Done => "Done",
        }
    }
}
