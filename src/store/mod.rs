//! Versioned Store
//!
//! Holds the local node's own record and the latest known record of every peer,
//! and provides the mutation and merge primitives the gossip protocol is built on.
//!
//! ## Core Concepts
//! - **Versioning**: records are ordered by `(gen_number, last_update_ts)`.
//! - **Anti-Entropy**: `meta_info` + `diff` decide what to exchange, `subset` + `update`
//!   move and merge the full records.
//! - **Failure Detection**: `update_node_statuses` turns stale timestamps into `Down`
//!   and fresh ones back into `Up`. Records are never deleted.

pub mod gossip_store;

pub use gossip_store::{GossipStore, MergeReport, StatusSweep};

#[cfg(test)]
mod tests;
