//! Membership Data Model
//!
//! Types shared by every layer of the gossip subsystem: node identities, the
//! versioned per-node record, metadata summaries, failure-domain maps and the
//! session diagnostics kept by the protocol driver.
//!
//! ## Ordering
//! - **Generation Numbers**: a node's restart epoch. A record with a lower generation is
//!   stale no matter how recent its timestamp is.
//! - **Timestamps**: wall-clock Unix milliseconds, compared only between records of the
//!   same generation.

pub mod types;

#[cfg(test)]
mod tests;
