//! Key identity properties.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use docmap_core::{Datastore, EntityExt, Key};
use docmap_testkit::prelude::*;
use proptest::prelude::*;

fn hash_of(key: &Key) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn keys_ignore_non_identity_fields(a in customer_strategy(), b in customer_strategy()) {
        let mut twin = b.clone();
        twin.id = a.id.clone();

        let left = a.key().unwrap();
        let right = twin.key().unwrap();
        prop_assert_eq!(&left, &right);
        prop_assert_eq!(hash_of(&left), hash_of(&right));
        prop_assert_eq!(left.to_string(), right.to_string());
    }

    #[test]
    fn keys_differ_with_identity(a in ident_strategy(), b in ident_strategy()) {
        prop_assume!(a != b);
        prop_assert_ne!(Customer::new(&a, "").key().unwrap(), Customer::new(&b, "").key().unwrap());
    }

    #[test]
    fn nested_keys_flatten_to_paths(number in ident_strategy(), carrier in ident_strategy()) {
        let shipment = Shipment::new(Order::new(&number), &carrier, 1.0);
        let key = shipment.key().unwrap();
        let paths: Vec<&str> = key.filter_document().keys().collect();
        prop_assert_eq!(paths, vec!["order.number", "carrier"]);
        prop_assert_eq!(
            key.data().get_path("order.number").and_then(|v| v.as_text()),
            Some(number.as_str())
        );
    }
}

#[test]
fn keys_are_memoized_until_decode() {
    let ds = Datastore::memory();
    let mut customer = Customer::new("m-1", "Memo");
    let first = customer.key().unwrap();

    customer.id = "m-2".to_string();
    assert_eq!(customer.key().unwrap(), first);

    ds.save(&mut Customer::new("m-3", "Other"), false).unwrap();
    let mut loaded = Customer::new("m-3", "");
    ds.load(&mut loaded, false).unwrap();
    assert_eq!(loaded.key().unwrap().to_filter(), Customer::new("m-3", "").key().unwrap().to_filter());
}

#[test]
fn kinds_separate_equal_data() {
    let item = LineItem::new("same", 1, 1.0);
    let node = Node::leaf("same");
    assert_ne!(item.key().unwrap(), node.key().unwrap());
    assert_eq!(item.key().unwrap().kind(), "LineItem");
}
