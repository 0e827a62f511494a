use std::collections::HashMap;

use rand::{Rng, SeedableRng, rngs::StdRng};
use sequel::{
    storage::{
        catalog::SystemCatalog, config::TableConfig, locator::RecordLocator,
        page_store::MemoryPageStore, table::Table,
    },
    types::{RecordId, error::DatabaseError},
    utils::mock::sample_payload,
};

/// 32-byte slots, 96-byte pages (3 slots each)
fn small_table() -> Table {
    Table::new("small", TableConfig::new(96, 32)).unwrap()
}

fn assert_free_page_list_matches(table: &Table) {
    for page in table.pages() {
        assert_eq!(
            table.catalog().is_free_page(page.page_id),
            page.has_free_capacity(),
            "page {} membership out of sync",
            page.page_id
        );
    }
}

#[test]
fn test_three_slot_scenario() {
    let mut table = small_table();

    let a = table.insert(b"A").unwrap();
    let b = table.insert(b"B").unwrap();
    let c = table.insert(b"C").unwrap();
    assert_eq!((a, b, c), (1, 2, 3));
    assert_eq!(table.page_count(), 1);

    let page = table.page(1).unwrap();
    assert_eq!(page.end_of_page(), 96);
    assert_eq!(page.freelist_head(), None);
    assert!(table.catalog().free_pages().is_empty());

    // remove B (not the tail)
    let offset_b = table.locate(b).unwrap().offset;
    table.remove(b).unwrap();
    assert_eq!(table.page(1).unwrap().freelist_head(), Some(offset_b));
    assert_eq!(table.catalog().free_pages(), &[1]);

    // D reuses B's slot
    let d = table.insert(b"D").unwrap();
    assert_eq!(d, 4);
    assert_eq!(table.locate(d).unwrap().offset, offset_b);
    assert_eq!(table.page(1).unwrap().freelist_head(), None);
    assert!(table.catalog().free_pages().is_empty());

    // remove C (the tail)
    table.remove(c).unwrap();
    assert_eq!(table.page(1).unwrap().end_of_page(), 64);
    assert_eq!(table.catalog().free_pages(), &[1]);

    table.verify().unwrap();
}

#[test]
fn test_first_insert_creates_page() {
    let mut table = small_table();
    assert_eq!(table.page_count(), 0);
    assert_eq!(table.catalog().next_page_id(), 1);

    let id = table.insert(b"hello").unwrap();
    assert_eq!(id, 1);
    assert_eq!(table.page_count(), 1);
    assert_eq!(table.catalog().total_pages(), 1);
    assert_eq!(table.catalog().free_pages(), &[1]);
    assert_eq!(table.lookup(id).unwrap(), b"hello");
}

#[test]
fn test_single_slot_pages_never_enter_free_list_on_insert() {
    let mut table = Table::new("one_slot", TableConfig::new(32, 32)).unwrap();
    for expected_page in 1..=3 {
        let id = table.insert(b"x").unwrap();
        assert_eq!(table.locate(id).unwrap().page_id, expected_page);
        assert!(table.catalog().free_pages().is_empty());
    }
}

#[test]
fn test_ids_strictly_increase_across_pages_and_removals() {
    let mut table = small_table();
    let mut last: Option<RecordId> = None;

    for i in 0..20 {
        let id = table.insert(&sample_payload(i, 10)).unwrap();
        if let Some(previous) = last {
            assert!(id > previous);
        }
        last = Some(id);
        if i % 3 == 0 {
            table.remove(id).unwrap();
        }
    }

    assert_eq!(last, Some(20));
    assert_eq!(table.catalog().next_record_id(), 21);
}

#[test]
fn test_removed_id_is_never_reused() {
    let mut table = small_table();
    let doomed = table.insert(b"doomed").unwrap();
    table.remove(doomed).unwrap();

    for i in 0..50 {
        let id = table.insert(&sample_payload(i, 4)).unwrap();
        assert_ne!(id, doomed);
    }
    assert!(matches!(
        table.lookup(doomed),
        Err(DatabaseError::RecordNotFound { record_id }) if record_id == doomed
    ));
}

#[test]
fn test_round_trip() {
    let mut table = Table::new("round_trip", TableConfig::default()).unwrap();
    let payload = sample_payload(42, 60);

    let id = table.insert(&payload).unwrap();
    assert_eq!(table.lookup(id).unwrap(), payload.as_slice());

    table.remove(id).unwrap();
    assert!(matches!(
        table.lookup(id),
        Err(DatabaseError::RecordNotFound { .. })
    ));
    assert!(matches!(
        table.remove(id),
        Err(DatabaseError::RecordNotFound { .. })
    ));
    assert!(!table.contains(id));
}

#[test]
fn test_oldest_free_page_is_used_first() {
    let mut table = small_table();
    let ids = table.insert_batch((0..6).map(|i| sample_payload(i, 8))).unwrap();
    assert_eq!(table.page_count(), 2);
    assert!(table.catalog().free_pages().is_empty());

    // page 2 regains room first, then page 1
    table.remove(ids[4]).unwrap();
    table.remove(ids[1]).unwrap();
    assert_eq!(table.catalog().free_pages(), &[2, 1]);

    let next = table.insert(b"next").unwrap();
    assert_eq!(table.locate(next).unwrap().page_id, 2);
    assert_eq!(table.catalog().free_pages(), &[1]);

    let after = table.insert(b"after").unwrap();
    assert_eq!(table.locate(after).unwrap().page_id, 1);
    assert!(table.catalog().free_pages().is_empty());

    // everything is full again, so a third page appears
    let overflow = table.insert(b"overflow").unwrap();
    assert_eq!(table.locate(overflow).unwrap().page_id, 3);
    assert_eq!(table.catalog().free_pages(), &[3]);
}

#[test]
fn test_remove_from_page_already_listed_keeps_order() {
    let mut table = small_table();
    let ids = table.insert_batch((0..5).map(|i| sample_payload(i, 8))).unwrap();
    // page 1 full, page 2 holds two records and is listed
    assert_eq!(table.catalog().free_pages(), &[2]);

    table.remove(ids[0]).unwrap();
    assert_eq!(table.catalog().free_pages(), &[2, 1]);
    table.remove(ids[3]).unwrap();
    assert_eq!(table.catalog().free_pages(), &[2, 1]);
    table.verify().unwrap();
}

#[test]
fn test_failed_insert_leaves_table_untouched() {
    let mut table = small_table();
    table.insert(b"keep").unwrap();
    let next_id = table.catalog().next_record_id();

    let result = table.insert(&[0u8; 31]);
    assert!(matches!(
        result,
        Err(DatabaseError::PayloadTooLarge { size: 31, max: 30 })
    ));
    assert_eq!(table.catalog().next_record_id(), next_id);
    assert_eq!(table.record_count(), 1);
    assert_eq!(table.page(1).unwrap().end_of_page(), 32);

    // the next good insert gets the id the failed one would have had
    assert_eq!(table.insert(b"good").unwrap(), next_id);
}

#[test]
fn test_record_id_exhaustion() {
    let mut table = Table::from_parts(
        TableConfig::new(96, 32),
        SystemCatalog::starting_at("nearly_full", RecordId::MAX - 2),
        RecordLocator::new(),
        MemoryPageStore::new(),
    )
    .unwrap();

    assert_eq!(table.insert(b"a").unwrap(), RecordId::MAX - 2);
    assert_eq!(table.insert(b"b").unwrap(), RecordId::MAX - 1);

    let page_before = table.page(1).unwrap().clone();
    assert!(matches!(
        table.insert(b"c"),
        Err(DatabaseError::RecordIdExhausted)
    ));
    assert_eq!(table.record_count(), 2);
    assert_eq!(table.page(1).unwrap(), &page_before);

    // removals still work once the id space is gone
    table.remove(RecordId::MAX - 2).unwrap();
    table.verify().unwrap();
}

#[test]
fn test_inconsistent_catalog_is_rejected() {
    let mut catalog = SystemCatalog::new("broken");
    catalog.add_free_page(7);

    let result = Table::from_parts(
        TableConfig::new(96, 32),
        catalog,
        RecordLocator::new(),
        MemoryPageStore::new(),
    );
    assert!(matches!(
        result,
        Err(DatabaseError::CatalogInconsistency { page_id: Some(7), .. })
    ));
}

#[test]
fn test_update_keeps_id_and_location() {
    let mut table = small_table();
    let id = table.insert(b"before").unwrap();
    let location = table.locate(id).unwrap();

    table.update(id, b"after").unwrap();
    assert_eq!(table.lookup(id).unwrap(), b"after");
    assert_eq!(table.locate(id).unwrap(), location);

    assert!(matches!(
        table.update(99, b"missing"),
        Err(DatabaseError::RecordNotFound { record_id: 99 })
    ));
}

#[test]
fn test_insert_batch_stops_at_first_failure() {
    let mut table = small_table();
    let payloads = vec![b"ok".to_vec(), vec![0u8; 64], b"never".to_vec()];

    let result = table.insert_batch(&payloads);
    assert!(matches!(result, Err(DatabaseError::PayloadTooLarge { .. })));
    assert_eq!(table.record_count(), 1);
    assert_eq!(table.lookup(1).unwrap(), b"ok");
    assert_eq!(table.catalog().next_record_id(), 2);
}

#[test]
fn test_scan_returns_records_in_id_order() {
    let mut table = small_table();
    let ids = table
        .insert_batch((0..8).map(|i| sample_payload(i, 12)))
        .unwrap();
    table.remove(ids[2]).unwrap();
    table.remove(ids[5]).unwrap();
    // page 3 still has tail room and is oldest in the free page list
    let newest = table.insert(b"newest").unwrap();
    assert_eq!(table.locate(newest).unwrap().page_id, 3);

    let scanned = table.scan().unwrap();
    let scanned_ids: Vec<RecordId> = scanned.iter().map(|(id, _)| *id).collect();
    assert_eq!(scanned_ids, vec![1, 2, 4, 5, 7, 8, newest]);
    assert_eq!(scanned[0].1, sample_payload(0, 12));
    assert_eq!(scanned.last().unwrap().1, b"newest".to_vec());

    let mut borrowed = 0;
    for entry in &table {
        let (id, payload) = entry.unwrap();
        assert_eq!(payload, table.lookup(id).unwrap());
        borrowed += 1;
    }
    assert_eq!(borrowed, table.record_count());
}

#[test]
fn test_randomized_operations_keep_bookkeeping_consistent() {
    let mut rng = StdRng::seed_from_u64(0x5EC0E1);
    let mut table = Table::new("random", TableConfig::new(128, 32)).unwrap();
    let mut expected: HashMap<RecordId, Vec<u8>> = HashMap::new();
    let mut live: Vec<RecordId> = Vec::new();
    let mut last_id = 0;

    for step in 0..2_000u32 {
        let insert = live.is_empty() || rng.gen_bool(0.55);
        if insert {
            let len = rng.gen_range(0..=30);
            let payload = sample_payload(step, len);
            let id = table.insert(&payload).unwrap();
            assert!(id > last_id);
            last_id = id;
            expected.insert(id, payload);
            live.push(id);
        } else {
            let index = rng.gen_range(0..live.len());
            let id = live.swap_remove(index);
            table.remove(id).unwrap();
            expected.remove(&id);
        }

        assert_free_page_list_matches(&table);
        if step % 50 == 0 {
            table.verify().unwrap();
        }
    }

    table.verify().unwrap();
    assert_eq!(table.record_count(), expected.len());
    for (id, payload) in &expected {
        assert_eq!(table.lookup(*id).unwrap(), payload.as_slice());
    }
}
