//! Store Module Tests
//!
//! Validates the versioned store in isolation (no networking).
//!
//! ## Test Scopes
//! - **Local Mutation**: `update_self`, heartbeats and key lookups.
//! - **Merge**: generation-guarded last-writer-wins, idempotence and order independence.
//! - **Anti-Entropy Helpers**: `meta_info`, `diff` and `subset` agreeing with each other.
//! - **Failure Detection**: the status sweep driven by stale timestamps and old generations.

#[cfg(test)]
mod tests {
    use crate::membership::types::{
        NodeId, NodeInfo, NodeInfoMap, NodeStatus, NodeUpdate, StoreKey, now_ms,
    };
    use crate::store::GossipStore;
    use serde_json::json;
    use std::time::Duration;

    const PROBE: Duration = Duration::from_secs(5);
    const DEATH: Duration = Duration::from_secs(10);

    fn record(id: &str, gen_number: u64, ts: u64) -> NodeInfo {
        let mut info = NodeInfo::new(NodeId::from(id), gen_number, NodeStatus::Up);
        info.last_update_ts = ts;
        info
    }

    fn batch(records: Vec<NodeInfo>) -> NodeInfoMap {
        records.into_iter().map(|info| (info.id.clone(), info)).collect()
    }

    fn store(id: &str) -> GossipStore {
        GossipStore::new(NodeId::from(id), 1, "v1")
    }

    // ============================================================
    // LOCAL MUTATION
    // ============================================================

    #[test]
    fn test_new_store_holds_only_self_in_down() {
        let store = store("self");

        assert_eq!(store.node_map().len(), 1);
        assert_eq!(store.self_status(), NodeStatus::Down);
        assert_eq!(store.gen_number(), 1);
        assert_eq!(store.gossip_version(), "v1");
    }

    #[test]
    fn test_update_self_sets_value_and_bumps_ts() {
        let mut store = store("self");
        let self_id = NodeId::from("self");
        let before = store.local_node_info(&self_id).unwrap().last_update_ts;

        store.update_self(StoreKey::from("k"), json!(1));
        let first = store.local_node_info(&self_id).unwrap();
        store.update_self(StoreKey::from("k"), json!(2));
        let second = store.local_node_info(&self_id).unwrap();

        assert!(first.last_update_ts > before);
        assert!(second.last_update_ts > first.last_update_ts);
        assert_eq!(second.value.get(&StoreKey::from("k")), Some(&json!(2)));
    }

    #[test]
    fn test_get_store_key_value_omits_nodes_without_key() {
        let mut store = store("self");
        store.update_self(StoreKey::from("disk"), json!("ssd"));

        let mut peer = record("peer", 1, 100);
        peer.value.insert(StoreKey::from("cpu"), json!(8));
        store.update(batch(vec![peer]));

        let disks = store.get_store_key_value(&StoreKey::from("disk"));
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[&NodeId::from("self")].value, json!("ssd"));

        let cpus = store.get_store_key_value(&StoreKey::from("cpu"));
        assert_eq!(cpus.len(), 1);
        assert_eq!(cpus[&NodeId::from("peer")].gen_number, 1);
        assert_eq!(cpus[&NodeId::from("peer")].last_update_ts, 100);
    }

    #[test]
    fn test_get_store_keys_is_union() {
        let mut store = store("self");
        store.update_self(StoreKey::from("b"), json!(null));

        let mut peer = record("peer", 1, 100);
        peer.value.insert(StoreKey::from("a"), json!(1));
        peer.value.insert(StoreKey::from("b"), json!(2));
        store.update(batch(vec![peer]));

        assert_eq!(
            store.get_store_keys(),
            vec![StoreKey::from("a"), StoreKey::from("b")]
        );
    }

    // ============================================================
    // MERGE
    // ============================================================

    #[test]
    fn test_update_adopts_unknown_nodes_as_down() {
        let mut store = store("self");

        let report = store.update(batch(vec![record("peer", 1, 100)]));

        assert_eq!(report.adopted, vec![NodeId::from("peer")]);
        let peer = store.local_node_info(&NodeId::from("peer")).unwrap();
        assert_eq!(peer.status, NodeStatus::Down);
        assert_eq!(peer.version(), (1, 100));
    }

    #[test]
    fn test_update_newer_timestamp_wins_and_keeps_local_status() {
        let mut store = store("self");
        store.update(batch(vec![record("peer", 1, 100)]));
        store
            .update_node_status(&NodeId::from("peer"), NodeStatus::Up)
            .unwrap();

        let mut newer = record("peer", 1, 200);
        newer.status = NodeStatus::Down;
        newer.value.insert(StoreKey::from("k"), json!("new"));
        let report = store.update(batch(vec![newer]));

        assert_eq!(report.replaced, vec![NodeId::from("peer")]);
        assert!(report.restarted.is_empty());
        let peer = store.local_node_info(&NodeId::from("peer")).unwrap();
        assert_eq!(peer.last_update_ts, 200);
        assert_eq!(peer.status, NodeStatus::Up);
        assert_eq!(peer.value.get(&StoreKey::from("k")), Some(&json!("new")));
    }

    #[test]
    fn test_update_higher_generation_wins_over_newer_timestamp() {
        let mut store = store("self");
        store.update(batch(vec![record("peer", 1, 9_000)]));

        let report = store.update(batch(vec![record("peer", 2, 10)]));

        assert_eq!(report.restarted, vec![NodeId::from("peer")]);
        assert_eq!(
            store.local_node_info(&NodeId::from("peer")).unwrap().version(),
            (2, 10)
        );
    }

    #[test]
    fn test_update_discards_ties_and_older_data() {
        let mut store = store("self");
        let mut held = record("peer", 2, 500);
        held.value.insert(StoreKey::from("k"), json!("held"));
        store.update(batch(vec![held]));

        let mut tie = record("peer", 2, 500);
        tie.value.insert(StoreKey::from("k"), json!("tie"));
        let older_gen = record("peer", 1, 9_999);

        assert!(store.update(batch(vec![tie])).is_empty());
        assert!(store.update(batch(vec![older_gen])).is_empty());

        let peer = store.local_node_info(&NodeId::from("peer")).unwrap();
        assert_eq!(peer.version(), (2, 500));
        assert_eq!(peer.value.get(&StoreKey::from("k")), Some(&json!("held")));
    }

    #[test]
    fn test_adopted_nodes_do_not_vote() {
        let mut store = store("self");
        let mut stranger = record("stranger", 1, 100);
        stranger.quorum_member = true;
        stranger.cluster_domain = "zone-x".to_string();

        store.update(batch(vec![stranger]));

        let held = store.local_node_info(&NodeId::from("stranger")).unwrap();
        assert!(!held.quorum_member);
        assert_eq!(store.quorum_members_by_domain().get("zone-x"), None);
        assert_eq!(store.quorum_members_by_domain().get(""), Some(&1));
    }

    #[test]
    fn test_update_keeps_local_membership_and_domain() {
        let mut store = store("self");
        let peer = NodeId::from("peer");
        store.add_node(
            &peer,
            &NodeUpdate {
                addr: "10.0.0.2:9002".to_string(),
                quorum_member: true,
                cluster_domain: "zone-a".to_string(),
            },
        );
        store.retire_node(&peer);

        let mut newer = record("peer", 1, 200);
        newer.quorum_member = true;
        newer.cluster_domain = "zone-b".to_string();
        newer.addr = "10.9.9.9:1".to_string();
        let report = store.update(batch(vec![newer]));

        assert_eq!(report.replaced, vec![peer.clone()]);
        let held = store.local_node_info(&peer).unwrap();
        assert_eq!(held.last_update_ts, 200);
        assert!(!held.quorum_member, "a retired node stays retired");
        assert_eq!(held.cluster_domain, "zone-a");
        assert_eq!(held.addr, "10.0.0.2:9002");
        assert_eq!(store.quorum_members_by_domain().get("zone-a"), None);
    }

    #[test]
    fn test_update_never_overwrites_self() {
        let mut store = store("self");
        let before = store.local_node_info(&NodeId::from("self")).unwrap();

        let report = store.update(batch(vec![record("self", 99, u64::MAX)]));

        assert!(report.is_empty());
        assert_eq!(store.local_node_info(&NodeId::from("self")).unwrap(), before);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut store = store("self");
        let input = batch(vec![record("a", 1, 100), record("b", 3, 50)]);

        store.update(input.clone());
        let once = store.local_state();
        let second = store.update(input);

        assert!(second.is_empty());
        assert_eq!(store.local_state(), once);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let a = record("peer", 1, 900);
        let b = record("peer", 2, 100);

        let mut ab = store("self");
        ab.update(batch(vec![a.clone()]));
        ab.update(batch(vec![b.clone()]));

        let mut ba = store("self");
        ba.update(batch(vec![b.clone()]));
        ba.update(batch(vec![a.clone()]));

        let id = NodeId::from("peer");
        let merged_ab = ab.local_node_info(&id).unwrap();
        let merged_ba = ba.local_node_info(&id).unwrap();
        assert_eq!(merged_ab, merged_ba);
        assert!(merged_ab.version() >= a.version());
        assert!(merged_ab.version() >= b.version());
    }

    // ============================================================
    // ANTI-ENTROPY HELPERS
    // ============================================================

    #[test]
    fn test_subset_skips_unknown_ids() {
        let mut store = store("self");
        store.update(batch(vec![record("a", 1, 100)]));

        let subset = store.subset(&[NodeId::from("a"), NodeId::from("ghost")]);

        assert_eq!(subset.len(), 1);
        assert!(subset.contains_key(&NodeId::from("a")));
    }

    #[test]
    fn test_meta_info_summarizes_every_record() {
        let mut store = store("self");
        store.update(batch(vec![record("a", 4, 100)]));

        let meta = store.meta_info();

        assert_eq!(meta.len(), 2);
        assert_eq!(meta[&NodeId::from("a")].version(), (4, 100));
        assert_eq!(meta[&NodeId::from("a")].gossip_version, "v1");
    }

    #[test]
    fn test_diff_classifies_stale_and_fresh() {
        let mut local = store("local");
        local.update(batch(vec![
            record("older_here", 1, 100),
            record("newer_here", 2, 100),
            record("same", 1, 100),
        ]));

        let mut remote = store("remote");
        remote.update(batch(vec![
            record("older_here", 1, 200),
            record("newer_here", 1, 900),
            record("same", 1, 100),
            record("unknown_here", 1, 1),
        ]));

        let (stale, fresh) = local.diff(&remote.meta_info());

        assert_eq!(
            stale,
            vec![
                NodeId::from("older_here"),
                NodeId::from("remote"),
                NodeId::from("unknown_here")
            ]
        );
        assert_eq!(fresh, vec![NodeId::from("newer_here")]);
        assert_eq!(
            local.missing_from(&remote.meta_info()),
            vec![NodeId::from("local")]
        );
    }

    #[test]
    fn test_diff_then_subset_converges_records() {
        let mut s1 = store("s1");
        let mut shared = record("shared", 2, 700);
        shared.value.insert(StoreKey::from("k"), json!({"v": 1}));
        s1.update(batch(vec![shared, record("only_s1", 1, 10)]));

        let mut s2 = store("s2");
        s2.update(batch(vec![record("shared", 1, 900)]));

        let (stale, _) = s2.diff(&s1.meta_info());
        s2.update(s1.subset(&stale));

        for id in &stale {
            let want = s1.local_node_info(id).unwrap();
            let got = s2.local_node_info(id).unwrap();
            assert_eq!(got.version(), want.version(), "version of {}", id);
            assert_eq!(got.value, want.value, "value of {}", id);
        }
        assert!(s2.diff(&s1.meta_info()).0.is_empty());
    }

    // ============================================================
    // FAILURE DETECTION
    // ============================================================

    #[test]
    fn test_sweep_marks_stale_nodes_down() {
        let mut store = store("self");
        store.update(batch(vec![record("peer", 1, 1_000)]));
        store
            .update_node_status(&NodeId::from("peer"), NodeStatus::Up)
            .unwrap();

        let sweep = store.update_node_statuses_at(1_000 + 10_001, PROBE, DEATH);

        assert_eq!(sweep.died, vec![NodeId::from("peer")]);
        assert_eq!(
            store.local_node_info(&NodeId::from("peer")).unwrap().status,
            NodeStatus::Down
        );
        assert_eq!(store.self_status(), NodeStatus::Down, "self is not swept");
    }

    #[test]
    fn test_sweep_keeps_never_gossiped_placeholders() {
        let mut store = store("self");
        let update = NodeUpdate {
            addr: "10.0.0.2:9002".to_string(),
            quorum_member: true,
            cluster_domain: String::new(),
        };
        store.add_node(&NodeId::from("peer"), &update);

        let sweep = store.update_node_statuses(PROBE, DEATH);

        assert!(sweep.died.is_empty());
        assert!(sweep.revived.is_empty());
        assert_eq!(
            store.local_node_info(&NodeId::from("peer")).unwrap().status,
            NodeStatus::NeverGossiped
        );
    }

    #[test]
    fn test_sweep_revives_fresh_nodes() {
        let mut store = store("self");
        store.update(batch(vec![record("peer", 1, 5_000)]));

        let sweep = store.update_node_statuses_at(6_000, PROBE, DEATH);

        assert_eq!(sweep.revived, vec![NodeId::from("peer")]);
        assert_eq!(
            store.local_node_info(&NodeId::from("peer")).unwrap().status,
            NodeStatus::Up
        );
    }

    #[test]
    fn test_old_generation_flag_expires_into_down() {
        let mut store = store("self");
        let ts = now_ms();
        store.update(batch(vec![record("peer", 3, ts)]));
        store
            .update_node_status(&NodeId::from("peer"), NodeStatus::Up)
            .unwrap();

        assert!(!store.mark_node_has_old_gen(&NodeId::from("ghost")));
        assert!(store.mark_node_has_old_gen(&NodeId::from("peer")));

        let early = store.update_node_statuses_at(ts, PROBE, DEATH);
        assert!(early.died.is_empty());

        let late = store.update_node_statuses_at(now_ms() + 6_000, PROBE, DEATH);
        assert_eq!(late.died, vec![NodeId::from("peer")]);

        // A newer generation clears the flag and the node can come back.
        store.update(batch(vec![record("peer", 4, now_ms())]));
        let peer = store.local_node_info(&NodeId::from("peer")).unwrap();
        assert!(!peer.has_old_gen());
        let revived = store.update_node_statuses(PROBE, DEATH);
        assert_eq!(revived.revived, vec![NodeId::from("peer")]);
    }

    // ============================================================
    // TOPOLOGY
    // ============================================================

    #[test]
    fn test_add_and_retire_nodes() {
        let mut store = store("self");
        let update = NodeUpdate {
            addr: "10.0.0.2:9002".to_string(),
            quorum_member: true,
            cluster_domain: "zone-a".to_string(),
        };

        assert!(store.add_node(&NodeId::from("peer"), &update));
        assert!(!store.add_node(&NodeId::from("peer"), &update));

        let members = store.quorum_members_by_domain();
        assert_eq!(members.get("zone-a"), Some(&1));
        assert_eq!(members.get(""), Some(&1), "self defaults to the empty domain");

        assert!(store.retire_node(&NodeId::from("peer")));
        assert!(!store.retire_node(&NodeId::from("peer")));
        assert_eq!(store.quorum_members_by_domain().get("zone-a"), None);
        assert!(store.local_node_info(&NodeId::from("peer")).is_ok());
    }

    #[test]
    fn test_update_node_status_unknown_node_errors() {
        let mut store = store("self");

        let result = store.update_node_status(&NodeId::from("ghost"), NodeStatus::Up);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ghost"));
    }
}
