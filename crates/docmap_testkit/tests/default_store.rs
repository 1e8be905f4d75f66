//! Entity operations through the process-wide default datastore.
//!
//! Kept to a single test: the default is global to the test binary.

use docmap_core::{CoreError, Datastore, EntityExt};
use docmap_testkit::prelude::*;

#[test]
fn entities_persist_through_the_default() {
    Datastore::clear_default();
    let mut order = sample_order("D-1");
    assert!(matches!(order.save(true), Err(CoreError::NoDefaultStore)));
    assert!(matches!(order.exists(), Err(CoreError::NoDefaultStore)));
    assert_eq!(order.key().unwrap().kind(), "Order");
    assert!(order.to_json(true).unwrap().contains(r#""number":"D-1""#));

    let (ds, store) = recorded_datastore();
    Datastore::set_default(ds.clone());

    assert!(order.save(true).unwrap());
    assert!(order.exists().unwrap());
    assert_eq!(store.calls_on("upsert", "LineItem"), 3);

    let mut loaded = Order::new("D-1");
    assert!(loaded.load(true).unwrap());
    assert_eq!(loaded.items, order.items);

    loaded.notes.push("rush".to_string());
    loaded.replace().unwrap();
    assert!(!loaded.save_with(false, docmap_core::WriteDurability::Journaled).unwrap());

    let mut check = Order::new("D-1");
    ds.load(&mut check, false).unwrap();
    assert_eq!(check.notes, vec!["fragile".to_string(), "rush".to_string()]);

    assert!(order.delete(true).unwrap());
    assert!(!check.exists().unwrap());
    assert_eq!(
        store.calls_on("delete_one", "LineItem"),
        3,
        "owned items go with their order"
    );

    Datastore::clear_default();
    assert!(Datastore::default_store().is_err());
}
