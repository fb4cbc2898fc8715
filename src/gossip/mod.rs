//! Gossip Protocol Driver
//!
//! Keeps every node's [`GossipStore`](crate::store::GossipStore) converging
//! with its peers and turns what it learns into state-machine events.
//!
//! ## Loops
//! - **Gossip round**: every `gossip_interval`, a diff session with up to `fanout`
//!   random peers. Metadata goes first; only stale records are pulled and only
//!   fresher or missing ones are pushed.
//! - **Push-pull**: every `push_pull_interval`, a full-state exchange with one peer.
//! - **Probe**: every `probe_interval`, a failure-detector sweep feeding
//!   `NodeLeave`/`NodeAlive`, plus a `SelfAlive` heartbeat.
//!
//! ## Transport
//! Sessions run over [`channel::MessageChannel`]s, framed JSON over TCP in
//! production. The HTTP handlers only expose the node's view for operators.

pub mod channel;
pub mod config;
pub mod handlers;
pub mod history;
pub mod message;
pub mod protocol;
pub mod service;

pub use channel::{Connector, FramedChannel, MessageChannel, TcpConnector, run_on_rcv_data};
pub use config::{GossipConfig, GossipIntervals};
pub use history::GossipHistory;
pub use message::GossipMessage;
pub use service::{Gossiper, StatusChange};
