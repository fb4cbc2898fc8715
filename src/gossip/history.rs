//! Bounded log of recent gossip sessions.

use crate::membership::types::{GossipDirection, GossipSessionInfo};

use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct GossipHistory {
    records: Mutex<VecDeque<GossipSessionInfo>>,
    max_len: usize,
}

impl GossipHistory {
    /// Keeps at least one session even when `max_len` is 0.
    pub fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_len)),
            max_len,
        }
    }

    /// Appends a session, evicting the oldest once full.
    pub fn add_latest(&self, session: GossipSessionInfo) {
        let mut records = self.records.lock();
        while records.len() >= self.max_len {
            records.pop_front();
        }
        records.push_back(session);
    }

    /// Retained sessions, oldest first.
    pub fn get_all_records(&self) -> Vec<GossipSessionInfo> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn log_records(&self) {
        for record in self.records.lock().iter() {
            let dir = match record.dir {
                GossipDirection::MeToPeer => "ME_TO_PEER",
                GossipDirection::PeerToMe => "PEER_TO_ME",
            };
            tracing::info!(
                "Node: {} Ts: {} Dir: {} Op: {:?} Error: {}",
                record.node,
                record.ts,
                dir,
                record.op,
                record.err.as_deref().unwrap_or("none")
            );
        }
    }
}
