//! HTTP Protocol Definitions
//!
//! DTOs and endpoints of the node's HTTP status surface. Gossip itself does
//! not go through HTTP; see [`super::message`] for the wire messages.

use crate::membership::types::{NodeId, NodeStatus, StoreKey};
use crate::quorum::QuorumProviderType;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_STATUS: &str = "/status";
pub const ENDPOINT_NODES: &str = "/nodes";
pub const ENDPOINT_PEERS: &str = "/peers";
pub const ENDPOINT_HISTORY: &str = "/history";
pub const ENDPOINT_STORE: &str = "/store";

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub node_id: NodeId,
    pub gossip_addr: String,
    pub status: NodeStatus,
    pub quorum_provider: QuorumProviderType,
    pub running: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateSelfRequest {
    pub key: StoreKey,
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateSelfResponse {
    pub success: bool,
}
