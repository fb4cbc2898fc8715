//! Quorum Gossip Library
//!
//! Gossip-based cluster membership with a quorum-aware node state machine.
//! Every node keeps a versioned record per cluster member, reconciles it with
//! random peers, detects silent peers, and decides from the merged view
//! whether it is still part of a working majority.
//!
//! ## Architecture Modules
//! - **`membership`**: the shared data model (node ids, records, metadata, domain maps).
//! - **`store`**: the versioned store. Generation-guarded last-writer-wins merge,
//!   metadata diffs and the failure-detector sweep.
//! - **`quorum`**: pluggable quorum providers (simple majority, failure domains, noop).
//! - **`state`**: the node state machine (`Down`, `NotInQuorum`, `SuspectNotInQuorum`, `Up`)
//!   with its suspicion grace period.
//! - **`gossip`**: the protocol driver. Peer list, diff and push-pull sessions over
//!   message channels, probe loop, session history and the HTTP status surface.

pub mod error;
pub mod gossip;
pub mod membership;
pub mod quorum;
pub mod state;
pub mod store;
