use orderly_core::storage::models::*;
use orderly_core::storage::Database;
use orderly_core::Classification;

fn make_test_item(plan_id: &str, id: &str, status: ItemStatus) -> PlanItem {
    PlanItem {
        id: id.to_string(),
        plan_id: plan_id.to_string(),
        src_path: format!("/data/{}.txt", id),
        dest_path: format!("/data/Docs/{}.txt", id),
        reasoning: "test".to_string(),
        status,
        error_msg: None,
    }
}

fn make_test_plan(id: &str, items: Vec<PlanItem>) -> Plan {
    Plan {
        id: id.to_string(),
        root_dir: "/data".to_string(),
        status: PlanStatus::Created,
        created_at: "2024-01-01T00:00:00+00:00".to_string(),
        executed_at: None,
        items,
    }
}

#[test]
fn test_cache_put_then_lookup() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.lookup_classification("abc").unwrap().is_none());

    let c = Classification::new("Invoices", 0.9, false);
    db.put_classification("abc", "/data/a.pdf", 100, 1_700_000_000, &c)
        .unwrap();

    assert_eq!(db.lookup_classification("abc").unwrap(), Some(c));
    assert_eq!(db.count_cache_entries().unwrap(), 1);
}

#[test]
fn test_cache_put_overwrites_existing_entry() {
    let db = Database::open_in_memory().unwrap();
    db.put_classification("abc", "/old/a.pdf", 100, 1, &Classification::new("Misc", 0.5, false))
        .unwrap();
    db.put_classification("abc", "/new/a.pdf", 100, 1, &Classification::new("Invoices", 0.8, true))
        .unwrap();

    let entry = db.get_cache_entry("abc").unwrap().unwrap();
    assert_eq!(entry.file_path, "/new/a.pdf");
    assert_eq!(entry.classification.category, "Invoices");
    assert!(entry.classification.requires_deep_scan);
    assert_eq!(db.count_cache_entries().unwrap(), 1);
}

#[test]
fn test_undecodable_cache_entry_is_a_miss() {
    let db = Database::open_in_memory().unwrap();
    db.connection()
        .execute(
            "INSERT INTO file_cache (fingerprint, file_path, size_bytes, mtime, classification, created_at) \
             VALUES ('bad', '/x', 1, 1, '{not json', 'now')",
            [],
        )
        .unwrap();

    assert!(db.lookup_classification("bad").unwrap().is_none());
    assert!(db.get_cache_entry("bad").is_err());
}

#[test]
fn test_clear_cache() {
    let db = Database::open_in_memory().unwrap();
    let c = Classification::new("Images", 0.9, false);
    db.put_classification("a", "/a", 1, 1, &c).unwrap();
    db.put_classification("b", "/b", 1, 1, &c).unwrap();

    assert_eq!(db.clear_cache().unwrap(), 2);
    assert_eq!(db.count_cache_entries().unwrap(), 0);
}

#[test]
fn test_plan_items_keep_insertion_order() {
    let db = Database::open_in_memory().unwrap();
    // Ids chosen so that sorting by id would reverse them.
    let plan = make_test_plan(
        "p1",
        vec![
            make_test_item("p1", "z", ItemStatus::Pending),
            make_test_item("p1", "m", ItemStatus::Skipped),
            make_test_item("p1", "a", ItemStatus::Pending),
        ],
    );
    db.insert_plan(&plan).unwrap();

    let loaded = db.get_plan("p1").unwrap().unwrap();
    let ids: Vec<_> = loaded.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["z", "m", "a"]);
    assert_eq!(loaded.status, PlanStatus::Created);
    assert_eq!(loaded.root_dir, "/data");
    assert!(db.get_plan("missing").unwrap().is_none());
}

#[test]
fn test_failed_plan_insert_leaves_nothing_behind() {
    let db = Database::open_in_memory().unwrap();
    // Duplicate item ids violate the primary key halfway through.
    let plan = make_test_plan(
        "p1",
        vec![
            make_test_item("p1", "dup", ItemStatus::Pending),
            make_test_item("p1", "dup", ItemStatus::Pending),
        ],
    );
    assert!(db.insert_plan(&plan).is_err());
    assert!(db.get_plan("p1").unwrap().is_none());
}

#[test]
fn test_item_transition_is_compare_and_swap() {
    let db = Database::open_in_memory().unwrap();
    db.insert_plan(&make_test_plan(
        "p1",
        vec![make_test_item("p1", "i1", ItemStatus::Pending)],
    ))
    .unwrap();

    assert!(db.transition_item("i1", ItemStatus::Done, None).unwrap());
    // Second writer loses, even with a different target state.
    assert!(!db
        .transition_item("i1", ItemStatus::Error, Some("io: late"))
        .unwrap());

    let item = db.get_item("i1").unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Done);
    assert_eq!(item.error_msg, None);
}

#[test]
fn test_approve_only_from_created() {
    let db = Database::open_in_memory().unwrap();
    db.insert_plan(&make_test_plan("p1", vec![])).unwrap();

    assert!(db.approve_plan("p1").unwrap());
    assert!(!db.approve_plan("p1").unwrap());
    assert!(!db.approve_plan("missing").unwrap());
    assert_eq!(db.get_plan_status("p1").unwrap(), Some(PlanStatus::Approved));
}

#[test]
fn test_finalize_waits_for_pending_items() {
    let db = Database::open_in_memory().unwrap();
    db.insert_plan(&make_test_plan(
        "p1",
        vec![
            make_test_item("p1", "i1", ItemStatus::Pending),
            make_test_item("p1", "i2", ItemStatus::Pending),
        ],
    ))
    .unwrap();

    db.transition_item("i1", ItemStatus::Done, None).unwrap();
    assert_eq!(db.finalize_plan("p1").unwrap(), PlanStatus::Created);
    assert!(db.get_plan("p1").unwrap().unwrap().executed_at.is_none());

    db.transition_item("i2", ItemStatus::Done, None).unwrap();
    assert_eq!(db.finalize_plan("p1").unwrap(), PlanStatus::Executed);
    assert!(db.get_plan("p1").unwrap().unwrap().executed_at.is_some());
}

#[test]
fn test_finalize_with_error_item_fails_plan() {
    let db = Database::open_in_memory().unwrap();
    db.insert_plan(&make_test_plan(
        "p1",
        vec![
            make_test_item("p1", "i1", ItemStatus::Skipped),
            make_test_item("p1", "i2", ItemStatus::Pending),
        ],
    ))
    .unwrap();

    db.transition_item("i2", ItemStatus::Error, Some("io: boom"))
        .unwrap();
    assert_eq!(db.finalize_plan("p1").unwrap(), PlanStatus::Failed);
}

#[test]
fn test_list_plans_with_item_counts() {
    let db = Database::open_in_memory().unwrap();
    db.insert_plan(&make_test_plan(
        "p1",
        vec![
            make_test_item("p1", "i1", ItemStatus::Pending),
            make_test_item("p1", "i2", ItemStatus::Pending),
        ],
    ))
    .unwrap();
    db.insert_plan(&make_test_plan("p2", vec![])).unwrap();

    let plans = db.list_plans(0, 10).unwrap();
    assert_eq!(plans.len(), 2);
    let p1 = plans.iter().find(|p| p.id == "p1").unwrap();
    assert_eq!(p1.item_count, 2);

    assert_eq!(db.list_plans(0, 1).unwrap().len(), 1);
}

#[test]
fn test_open_file_database_twice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let path = path.to_str().unwrap();

    let first = Database::open(path).unwrap();
    first.insert_plan(&make_test_plan("p1", vec![])).unwrap();

    // Reopening must not reset existing data.
    let second = Database::open(path).unwrap();
    assert_eq!(second.get_plan_status("p1").unwrap(), Some(PlanStatus::Created));
}
