use gink_store::{
    Behavior, Bundle, Change, EntryChange, EntryValue, LmdbStore, Muid, RelativeMiddleKey,
    RelativeMuid, ResetChange, StoreOptions,
};

fn open_store() -> (tempfile::TempDir, LmdbStore) {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let store = LmdbStore::open(StoreOptions::new(dir.path().join("store.mdb"))).unwrap();
    (dir, store)
}

fn directory_bundle(
    timestamp: i64,
    medallion: i64,
    chain_start: i64,
    prior_time: i64,
    define_container: bool,
    key: &str,
    value: Option<&str>,
) -> Vec<u8> {
    let mut changes = Vec::new();
    let mut next_offset = 1;
    if define_container {
        changes.push((next_offset, Change::ContainerDef { behavior: Behavior::Directory, definition: vec![] }));
        next_offset += 1;
    }
    let entry_value = match value {
        Some(v) => EntryValue::Value(v.as_bytes().to_vec()),
        None => EntryValue::Tombstone,
    };
    // The directory container was created at offset 1 of the chain's first bundle (timestamp =
    // chain_start). A same-bundle reference inherits via zero fields; a reference from a later
    // bundle must carry the container's real creation timestamp.
    let container_ref = if define_container {
        RelativeMuid::at_offset(1)
    } else {
        RelativeMuid::new(chain_start, medallion, 1)
    };
    changes.push((
        next_offset,
        Change::Entry(EntryChange {
            container: container_ref,
            middle_key: RelativeMiddleKey::Directory(key.as_bytes().to_vec()),
            expiry: 0,
            value: entry_value,
        }),
    ));

    Bundle { timestamp, medallion, chain_start, prior_time, comment: None, changes }.to_bytes()
}

#[test]
fn scenario_1_first_bundle_accepted_and_queryable() {
    let (_dir, store) = open_store();
    let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));

    let (info, accepted) = store.add_bundle(&b1).unwrap();
    assert!(accepted);
    assert_eq!(info.timestamp, 100);

    let container = Muid::new(100, 7, 1);
    let (muid, value) = store.get_entry(container, Some(b"a"), 100).unwrap().unwrap();
    assert_eq!(muid, Muid::new(100, 7, 2));
    assert_eq!(value, EntryValue::Value(b"x".to_vec()));
}

#[test]
fn scenario_2_duplicate_ingestion_is_rejected_and_idempotent() {
    let (_dir, store) = open_store();
    let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));

    let (_, accepted1) = store.add_bundle(&b1).unwrap();
    assert!(accepted1);

    let mut bundle_count_before = 0;
    store.get_bundles(|_, _| bundle_count_before += 1).unwrap();

    let (_, accepted2) = store.add_bundle(&b1).unwrap();
    assert!(!accepted2);

    let mut bundle_count_after = 0;
    store.get_bundles(|_, _| bundle_count_after += 1).unwrap();
    assert_eq!(bundle_count_before, bundle_count_after);
}

#[test]
fn scenario_3_point_in_time_queries_follow_the_chain() {
    let (_dir, store) = open_store();
    let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));
    let b2 = directory_bundle(200, 7, 100, 100, false, "a", Some("y"));

    assert!(store.add_bundle(&b1).unwrap().1);
    assert!(store.add_bundle(&b2).unwrap().1);

    let container = Muid::new(100, 7, 1);
    let (_, early) = store.get_entry(container, Some(b"a"), 150).unwrap().unwrap();
    assert_eq!(early, EntryValue::Value(b"x".to_vec()));

    let (_, late) = store.get_entry(container, Some(b"a"), 250).unwrap().unwrap();
    assert_eq!(late, EntryValue::Value(b"y".to_vec()));
}

#[test]
fn scenario_4_delete_then_reset_diff_recovers_prior_value() {
    let (_dir, store) = open_store();
    let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));
    let b2 = directory_bundle(200, 7, 100, 100, false, "a", Some("y"));
    let b3 = directory_bundle(300, 7, 100, 200, false, "a", None);

    assert!(store.add_bundle(&b1).unwrap().1);
    assert!(store.add_bundle(&b2).unwrap().1);
    assert!(store.add_bundle(&b3).unwrap().1);

    let container = Muid::new(100, 7, 1);
    let (_, tombstoned) = store.get_entry(container, Some(b"a"), 300).unwrap().unwrap();
    assert_eq!(tombstoned, EntryValue::Tombstone);

    // get_keyed_entries surfaces tombstones rather than filtering them, so the caller-side
    // filter belongs here, not in the API.
    let live = store.get_keyed_entries(container, 300).unwrap();
    let non_tombstone_count = live.iter().filter(|(_, v)| !matches!(v, EntryValue::Tombstone)).count();
    assert_eq!(non_tombstone_count, 0, "a live view at t=300 should have no non-tombstone entries for a deleted key");

    let changes = store.get_reset_changes(250, Some(container), None, false).unwrap();
    assert_eq!(
        changes,
        vec![ResetChange::Entry {
            container,
            middle_key: gink_store::MiddleKey::Directory(b"a".to_vec()),
            value: EntryValue::Value(b"y".to_vec()),
        }]
    );
}

#[test]
fn scenario_5_prior_time_mismatch_is_rejected() {
    let (_dir, store) = open_store();
    let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));
    let b2 = directory_bundle(200, 7, 100, 100, false, "a", Some("y"));
    let b3 = directory_bundle(300, 7, 100, 200, false, "a", None);
    let b4 = directory_bundle(400, 7, 100, 250, false, "a", Some("z"));

    assert!(store.add_bundle(&b1).unwrap().1);
    assert!(store.add_bundle(&b2).unwrap().1);
    assert!(store.add_bundle(&b3).unwrap().1);

    let mut count_before = 0;
    store.get_bundles(|_, _| count_before += 1).unwrap();

    let (info, accepted) = store.add_bundle(&b4).unwrap();
    assert!(!accepted);
    assert_eq!(info.timestamp, 400);

    let mut count_after = 0;
    store.get_bundles(|_, _| count_after += 1).unwrap();
    assert_eq!(count_before, count_after);
}

#[test]
fn scenario_6_bundles_replay_in_timestamp_major_order() {
    let (_dir, store) = open_store();
    let chain_a_1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));
    let chain_b_1 = directory_bundle(150, 8, 150, 0, true, "b", Some("y"));
    let chain_a_2 = directory_bundle(200, 7, 100, 100, false, "a", Some("z"));
    let chain_a_3 = directory_bundle(300, 7, 100, 200, false, "a", None);

    assert!(store.add_bundle(&chain_a_1).unwrap().1);
    assert!(store.add_bundle(&chain_b_1).unwrap().1);
    assert!(store.add_bundle(&chain_a_2).unwrap().1);
    assert!(store.add_bundle(&chain_a_3).unwrap().1);

    let mut order = Vec::new();
    store.get_bundles(|_, info| order.push((info.timestamp, info.medallion))).unwrap();
    assert_eq!(order, vec![(100, 7), (150, 8), (200, 7), (300, 7)]);
}

#[test]
fn chain_monotonicity_rejects_out_of_order_ingestion() {
    let (_dir, store) = open_store();
    let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));
    let b2 = directory_bundle(200, 7, 100, 100, false, "a", Some("y"));

    assert!(store.add_bundle(&b1).unwrap().1);
    assert!(store.add_bundle(&b2).unwrap().1);

    // Head is now t=200; a bundle whose `prior_time` points at the stale t=100 head no longer
    // matches and must be rejected, regardless of its own timestamp being in the future.
    let stale = directory_bundle(250, 7, 100, 100, false, "a", Some("stale"));
    assert!(!store.add_bundle(&stale).unwrap().1);
}

#[test]
fn chain_tracker_reflects_ingested_heads() {
    let (_dir, store) = open_store();
    let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));
    let b2 = directory_bundle(200, 7, 100, 100, false, "a", Some("y"));
    store.add_bundle(&b1).unwrap();
    store.add_bundle(&b2).unwrap();

    let tracker = store.get_chain_tracker().unwrap();
    let head = tracker.get(&gink_store::Chain::new(7, 100)).unwrap();
    assert_eq!(head.timestamp, 200);
}

#[test]
fn claimed_chains_round_trip() {
    let (_dir, store) = open_store();
    let chain = gink_store::Chain::new(7, 100);
    store.claim_chain(chain).unwrap();
    let claimed = store.get_claimed_chains().unwrap();
    assert_eq!(claimed, vec![chain]);
}

#[test]
fn reset_changes_requires_container_when_key_given() {
    let (_dir, store) = open_store();
    let err = store.get_reset_changes(100, None, Some(b"a"), false).unwrap_err();
    assert!(matches!(err, gink_store::GinkError::InvalidArgument(_)));
}

#[test]
fn reset_changes_recurse_through_an_unchanged_pointer_into_a_changed_child() {
    let (_dir, store) = open_store();

    // b1 (t=100): defines directory A (offset 1) and directory B (offset 2), sets
    // A["child"] = pointee(B), and B["x"] = "1". Offsets 3 and 4 carry the entries.
    let b1 = Bundle {
        timestamp: 100,
        medallion: 7,
        chain_start: 100,
        prior_time: 0,
        comment: None,
        changes: vec![
            (1, Change::ContainerDef { behavior: Behavior::Directory, definition: vec![] }),
            (2, Change::ContainerDef { behavior: Behavior::Directory, definition: vec![] }),
            (
                3,
                Change::Entry(EntryChange {
                    container: RelativeMuid::at_offset(1),
                    middle_key: RelativeMiddleKey::Directory(b"child".to_vec()),
                    expiry: 0,
                    value: EntryValue::Pointee(RelativeMuid::at_offset(2)),
                }),
            ),
            (
                4,
                Change::Entry(EntryChange {
                    container: RelativeMuid::at_offset(2),
                    middle_key: RelativeMiddleKey::Directory(b"x".to_vec()),
                    expiry: 0,
                    value: EntryValue::Value(b"1".to_vec()),
                }),
            ),
        ],
    }
    .to_bytes();

    // b2 (t=200): B["x"] = "2". A's pointer to B is untouched.
    let container_b = Muid::new(100, 7, 2);
    let b2 = Bundle {
        timestamp: 200,
        medallion: 7,
        chain_start: 100,
        prior_time: 100,
        comment: None,
        changes: vec![(
            1,
            Change::Entry(EntryChange {
                container: RelativeMuid::new(container_b.timestamp, container_b.medallion, container_b.offset),
                middle_key: RelativeMiddleKey::Directory(b"x".to_vec()),
                expiry: 0,
                value: EntryValue::Value(b"2".to_vec()),
            }),
        )],
    }
    .to_bytes();

    assert!(store.add_bundle(&b1).unwrap().1);
    assert!(store.add_bundle(&b2).unwrap().1);

    let container_a = Muid::new(100, 7, 1);

    // At to_time=150, A's own "child" pointer entry hasn't changed (it was written at t=100,
    // before to_time), so a non-recursive reset sees nothing to do for A.
    let non_recursive = store.get_reset_changes(150, Some(container_a), None, false).unwrap();
    assert!(non_recursive.is_empty());

    // But B's "x" entry changed at t=200, after to_time=150 — a recursive reset anchored at A
    // must still find it by following A["child"]'s pointee into B, even though that pointer
    // itself never changed.
    let recursive = store.get_reset_changes(150, Some(container_a), None, true).unwrap();
    assert_eq!(
        recursive,
        vec![ResetChange::Entry {
            container: container_b,
            middle_key: gink_store::MiddleKey::Directory(b"x".to_vec()),
            value: EntryValue::Value(b"1".to_vec()),
        }]
    );
}

#[test]
fn reopening_with_reset_truncates_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.mdb");

    {
        let store = LmdbStore::open(StoreOptions::new(&path)).unwrap();
        let b1 = directory_bundle(100, 7, 100, 0, true, "a", Some("x"));
        assert!(store.add_bundle(&b1).unwrap().1);
        store.close();
    }
    {
        let store = LmdbStore::open(StoreOptions::new(&path).reset(true)).unwrap();
        let mut count = 0;
        store.get_bundles(|_, _| count += 1).unwrap();
        assert_eq!(count, 0);
    }
}
