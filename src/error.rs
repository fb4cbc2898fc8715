//! Error types for the gossip and quorum layer.

use thiserror::Error;

use crate::membership::types::NodeId;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("address not found: {0}")]
    AddressNotFound(String),

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("gossiper is already running")]
    AlreadyRunning,

    #[error("gossiper is not running")]
    NotRunning,

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("gossip version mismatch with {peer}: local {local}, remote {remote}")]
    VersionMismatch {
        peer: String,
        local: String,
        remote: String,
    },

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(u64),

    #[error("message channel closed")]
    ChannelClosed,
}

/// Result alias for gossip operations.
pub type Result<T> = std::result::Result<T, GossipError>;
