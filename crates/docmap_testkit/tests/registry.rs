//! Type registration as seen through datastore operations.

use docmap_core::{
    describe, is_registered, register, registered_kind, CoreError, Datastore, Entity,
    EntityHeader, Schema,
};
use docmap_testkit::entity_slots;
use docmap_testkit::prelude::*;

#[derive(Debug, Default)]
struct Counterfeit {
    header: EntityHeader,
    number: String,
}

impl Entity for Counterfeit {
    fn schema() -> Schema {
        Schema::new("Order").key::<String>("number")
    }

    entity_slots!("number" => number);
}

#[derive(Debug, Default)]
struct Reserved {
    header: EntityHeader,
    id: String,
}

impl Entity for Reserved {
    fn schema() -> Schema {
        Schema::new("Reserved").key::<String>("_id")
    }

    entity_slots!("_id" => id);
}

#[derive(Debug, Default)]
struct Ghostly {
    header: EntityHeader,
    name: String,
}

impl Entity for Ghostly {
    fn schema() -> Schema {
        Schema::new("Ghostly")
            .key::<String>("name")
            .field::<i32>("ghost")
    }

    entity_slots!("name" => name);
}

#[test]
fn owners_register_their_nested_types() {
    register::<Order>().unwrap();
    for kind in ["Order", "Customer", "LineItem", "Address"] {
        assert!(registered_kind(kind).is_ok(), "{kind} should be registered");
    }
    assert!(is_registered::<Address>());
    assert_eq!(describe::<Order>().unwrap().kind(), "Order");
}

#[test]
fn kinds_bind_to_one_type() {
    register::<Order>().unwrap();
    let ds = Datastore::memory();
    let mut fake = Counterfeit {
        number: "1".to_string(),
        ..Counterfeit::default()
    };
    let err = ds.save(&mut fake, false).unwrap_err();
    assert!(matches!(err, CoreError::KindConflict { ref kind, .. } if kind == "Order"));
    assert!(err.is_configuration());
    assert!(ds.collection_names().unwrap().is_empty());
}

#[test]
fn invalid_schemas_fail_before_io() {
    let (ds, store) = recorded_datastore();

    let err = ds.save(&mut Reserved::default(), false).unwrap_err();
    assert!(matches!(err, CoreError::ReservedField { .. }));

    let mut ghost = Ghostly {
        name: "boo".to_string(),
        ..Ghostly::default()
    };
    let err = ds.save(&mut ghost, false).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err.root_cause(), CoreError::MissingSlot { .. }));

    assert!(matches!(
        registered_kind("Nowhere"),
        Err(CoreError::UnregisteredKind { .. })
    ));
    assert_eq!(store.writes(), 0);
}
