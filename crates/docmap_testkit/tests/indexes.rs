//! Index reconciliation on first collection access.

use docmap_codec::Document;
use docmap_core::{Config, CoreError, Datastore};
use docmap_store::{DocumentStore, IndexInfo, StoreError};
use docmap_testkit::prelude::*;

fn names(indexes: &[IndexInfo]) -> Vec<&str> {
    indexes.iter().map(|i| i.name.as_str()).collect()
}

fn with_email(id: &str, email: Option<&str>) -> Customer {
    let mut customer = Customer::new(id, id);
    customer.email = email.map(str::to_string);
    customer
}

#[test]
fn tagged_fields_become_indexes() {
    let ds = Datastore::memory();
    let handle = ds.collection::<Customer>().unwrap();

    let key = handle.key_index().unwrap();
    assert_eq!(key.name, "__key_");
    assert!(key.unique);
    assert_eq!(key.paths().collect::<Vec<_>>(), vec!["id"]);

    let secondary = handle.secondary_indexes();
    assert_eq!(names(secondary), vec!["__unique_email", "__regular_tier"]);
    assert!(secondary[0].unique);
    assert!(!secondary[1].unique);

    let stored = ds.store().list_indexes("Customer").unwrap();
    assert_eq!(stored.len(), 4);
}

#[test]
fn composite_keys_index_nested_paths() {
    let ds = Datastore::memory();
    let handle = ds.collection::<Shipment>().unwrap();
    let key = handle.key_index().unwrap();
    assert_eq!(
        key.paths().collect::<Vec<_>>(),
        vec!["order.number", "carrier"]
    );

    let keyless = ds.collection::<LogEntry>().unwrap();
    assert!(keyless.key_index().is_none());
    assert!(keyless.secondary_indexes().is_empty());
}

#[test]
fn unique_fields_reject_duplicates() {
    let ds = Datastore::memory();
    ds.save(&mut with_email("a", Some("x@example.com")), false)
        .unwrap();

    let err = ds
        .save(&mut with_email("b", Some("x@example.com")), false)
        .unwrap_err();
    assert!(err.is_store());
    match err {
        CoreError::Store(StoreError::DuplicateKey { collection, index }) => {
            assert_eq!(collection, "Customer");
            assert_eq!(index, "__unique_email");
        }
        other => panic!("unexpected {other:?}"),
    }

    ds.save(&mut with_email("c", None), false).unwrap();
    assert!(ds.save(&mut with_email("d", None), false).is_err());
    assert_eq!(ds.store().count("Customer", &Document::new()).unwrap(), 2);
}

#[test]
fn reconciliation_runs_once_per_kind() {
    let (ds, store) = recorded_datastore();
    ds.collection::<Customer>().unwrap();
    ds.save(&mut with_email("a", Some("a@example.com")), false)
        .unwrap();
    ds.collection::<Customer>().unwrap();

    assert_eq!(store.calls_on("create_collection", "Customer"), 1);
    assert_eq!(store.calls_on("list_indexes", "Customer"), 1);
    assert_eq!(store.calls_on("create_index", "Customer"), 3);
}

#[test]
fn obsolete_managed_indexes_are_dropped() {
    let (ds, store) = recorded_datastore();
    store.create_collection("Customer").unwrap();
    let mut keys = Document::new();
    keys.insert("nickname", 1);
    store
        .create_index("Customer", &IndexInfo::new("__regular_nickname", keys.clone(), false))
        .unwrap();
    store
        .create_index("Customer", &IndexInfo::new("by_nickname", keys, false))
        .unwrap();
    store.reset();

    ds.collection::<Customer>().unwrap();
    assert_eq!(store.calls_of("drop_index"), 1);
    let stored = store.list_indexes("Customer").unwrap();
    assert!(names(&stored).contains(&"by_nickname"));
    assert!(!names(&stored).contains(&"__regular_nickname"));
}

#[test]
fn reconciliation_can_be_turned_off() {
    let (ds, store) = recorded_datastore_with(Config::new().reconcile_indexes(false));
    ds.save(&mut with_email("a", Some("same@example.com")), false)
        .unwrap();
    ds.save(&mut with_email("b", Some("same@example.com")), false)
        .unwrap();

    assert_eq!(store.calls_of("list_indexes"), 0);
    assert_eq!(store.calls_of("create_index"), 0);
    assert!(ds.collection::<Customer>().unwrap().key_index().is_none());
}

#[test]
fn dropping_a_kind_reconciles_again() {
    let (ds, store) = recorded_datastore();
    ds.collection::<LineItem>().unwrap();
    ds.drop_kind("LineItem").unwrap();
    assert!(!ds.collection_names().unwrap().contains(&"LineItem".to_string()));

    ds.collection::<LineItem>().unwrap();
    assert_eq!(store.calls_on("create_collection", "LineItem"), 2);
    assert_eq!(store.calls_on("create_index", "LineItem"), 2);
}

#[test]
fn prefixes_are_configurable() {
    let config = Config::new()
        .key_index_name("pk")
        .unique_index_prefix("u_")
        .regular_index_prefix("r_");
    let ds = Datastore::with_config(std::sync::Arc::new(docmap_store::MemoryStore::new()), config);
    let handle = ds.collection::<Customer>().unwrap();
    assert_eq!(handle.key_index().map(|i| i.name.as_str()), Some("pk"));
    assert_eq!(names(handle.secondary_indexes()), vec!["u_email", "r_tier"]);
}
