//! Membership Module Tests
//!
//! Validates the shared data model.
//!
//! ## Test Scopes
//! - **Identifiers**: uniqueness, hashing and transparent serialization of ids and keys.
//! - **Statuses**: which statuses count as a live, gossiping node.
//! - **Records**: placeholder construction and the version ordering tuple.

#[cfg(test)]
mod tests {
    use crate::membership::types::{
        GossipDirection, GossipOp, GossipSessionInfo, NodeId, NodeInfo, NodeInfoMap, NodeStatus,
        StoreKey,
    };

    // ============================================================
    // NODE ID TESTS
    // ============================================================

    #[test]
    fn test_node_id_is_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();

        assert_ne!(id1, id2, "Each NodeId should be unique");
    }

    #[test]
    fn test_node_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(NodeId::from("node-1"));
        set.insert(NodeId::from("node-1")); // duplicate
        set.insert(NodeId::from("node-2"));

        assert_eq!(set.len(), 2, "HashSet should have 2 unique NodeIds");
    }

    #[test]
    fn test_node_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&NodeId::from("n1")).unwrap();
        assert_eq!(json, "\"n1\"");

        let key = serde_json::to_string(&StoreKey::from("volumes")).unwrap();
        assert_eq!(key, "\"volumes\"");
    }

    // ============================================================
    // NODE STATUS TESTS
    // ============================================================

    #[test]
    fn test_alive_statuses() {
        assert!(NodeStatus::Up.is_alive());
        assert!(NodeStatus::NotInQuorum.is_alive());
        assert!(NodeStatus::SuspectNotInQuorum.is_alive());

        assert!(!NodeStatus::Down.is_alive());
        assert!(!NodeStatus::NeverGossiped.is_alive());
        assert!(!NodeStatus::Invalid.is_alive());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(NodeStatus::SuspectNotInQuorum.to_string(), "SUSPECT_NOT_IN_QUORUM");
        assert_eq!(NodeStatus::Up.to_string(), "UP");
    }

    // ============================================================
    // NODE INFO TESTS
    // ============================================================

    #[test]
    fn test_placeholder_was_never_observed() {
        let info = NodeInfo::placeholder(NodeId::from("n1"));

        assert_eq!(info.status, NodeStatus::NeverGossiped);
        assert_eq!(info.version(), (0, 0));
        assert!(info.quorum_member);
        assert!(!info.has_old_gen());
    }

    #[test]
    fn test_version_orders_generation_before_timestamp() {
        let mut older_gen = NodeInfo::new(NodeId::from("n1"), 1, NodeStatus::Up);
        older_gen.last_update_ts = 9_000;

        let mut newer_gen = NodeInfo::new(NodeId::from("n1"), 2, NodeStatus::Up);
        newer_gen.last_update_ts = 1_000;

        assert!(newer_gen.version() > older_gen.version());
    }

    #[test]
    fn test_node_info_map_json_round_trip() {
        let mut info = NodeInfo::new(NodeId::from("n1"), 3, NodeStatus::Up);
        info.last_update_ts = 42;
        info.value
            .insert(StoreKey::from("capacity"), serde_json::json!({"free": 10}));

        let mut map = NodeInfoMap::new();
        map.insert(info.id.clone(), info.clone());

        let json = serde_json::to_string(&map).expect("Serialization failed");
        let restored: NodeInfoMap = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(restored.get(&info.id), Some(&info));
    }

    #[test]
    fn test_session_info_starts_without_error() {
        let session = GossipSessionInfo::new("10.0.0.1:9002", GossipDirection::MeToPeer, GossipOp::Diff);

        assert!(session.err.is_none());
        assert!(session.ts > 0);
    }
}
