//! Property-based test generators using proptest.
//!
//! Strategies produce fixture entities whose values survive a store round
//! trip: floats are finite, timestamps have millisecond precision and
//! identity strings are non-empty.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use crate::fixtures::{Address, Customer, LineItem, Node, Order, Sample, Status};

/// Strategy for identity strings.
pub fn ident_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,11}").expect("Invalid regex")
}

/// Strategy for free text, including non-ASCII characters.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 äöüß€]{0,24}").expect("Invalid regex")
}

/// Strategy for finite floats.
pub fn finite_f64_strategy() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::ZERO
}

/// Strategy for UTC timestamps with millisecond precision.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (-2_000_000_000_000i64..4_000_000_000_000i64).prop_map(|millis| {
        Utc.timestamp_millis_opt(millis)
            .single()
            .expect("timestamp in range")
    })
}

/// Strategy for order states.
pub fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Open),
        Just(Status::Shipped),
        Just(Status::Cancelled),
    ]
}

/// Strategy for line items.
pub fn line_item_strategy() -> impl Strategy<Value = LineItem> {
    (ident_strategy(), any::<i32>(), finite_f64_strategy())
        .prop_map(|(sku, quantity, price)| LineItem::new(&sku, quantity, price))
}

/// Strategy for addresses.
pub fn address_strategy() -> impl Strategy<Value = Address> {
    (text_strategy(), text_strategy()).prop_map(|(street, city)| Address::new(&street, &city))
}

/// Strategy for customers.
pub fn customer_strategy() -> impl Strategy<Value = Customer> {
    (
        ident_strategy(),
        text_strategy(),
        prop::option::of(ident_strategy()),
        any::<i32>(),
    )
        .prop_map(|(id, name, email, tier)| {
            let mut customer = Customer::new(&id, &name);
            customer.email = email;
            customer.tier = tier;
            customer
        })
}

/// Strategy for orders with every field populated at random.
///
/// Line item SKUs are distinct within one order.
pub fn order_strategy() -> impl Strategy<Value = Order> {
    (
        ident_strategy(),
        status_strategy(),
        timestamp_strategy(),
        prop::option::of(customer_strategy()),
        prop::collection::btree_map(ident_strategy(), (any::<i32>(), finite_f64_strategy()), 0..4),
        prop::option::of(address_strategy()),
        prop::collection::vec(text_strategy(), 0..4),
        prop::collection::btree_set(ident_strategy(), 0..4),
        prop::collection::hash_map(ident_strategy(), any::<i64>(), 0..4),
    )
        .prop_map(
            |(number, status, placed, customer, lines, shipping, notes, tags, attributes)| {
                let mut order = Order::new(&number);
                order.status = status;
                order.placed = placed;
                order.customer = customer;
                order.items = lines
                    .into_iter()
                    .map(|(sku, (quantity, price))| LineItem::new(&sku, quantity, price))
                    .collect();
                order.shipping = shipping;
                order.notes = notes;
                order.tags = tags;
                order.attributes = attributes;
                order
            },
        )
}

/// Strategy for scalar samples.
pub fn sample_strategy() -> impl Strategy<Value = Sample> {
    (
        ident_strategy(),
        any::<bool>(),
        any::<i16>(),
        any::<i64>(),
        finite_f64_strategy(),
        any::<char>().prop_filter("nul is the empty default", |c| *c != '\0'),
        prop::option::of(any::<i32>()),
        timestamp_strategy(),
        prop::collection::vec(status_strategy(), 0..4),
    )
        .prop_map(
            |(id, flag, small, wide, ratio, letter, maybe, when, states)| Sample {
                id,
                flag,
                small,
                wide,
                ratio,
                letter,
                maybe,
                when,
                states,
                ..Sample::default()
            },
        )
}

/// Strategy for trees of at most `depth` levels with unique names.
pub fn node_tree_strategy(depth: u32) -> impl Strategy<Value = Node> {
    let leaf = Just(Vec::<Node>::new()).boxed();
    let shape = leaf.prop_recursive(depth, 16, 3, |inner| {
        prop::collection::vec(inner, 0..3).prop_map(|children| {
            children
                .into_iter()
                .map(|grandchildren| Node::with_children("", grandchildren))
                .collect::<Vec<_>>()
        })
    });
    shape.prop_map(|children| {
        let mut root = Node::with_children("", children);
        let mut counter = 0;
        name_nodes(&mut root, &mut counter);
        root
    })
}

fn name_nodes(node: &mut Node, counter: &mut u32) {
    node.name = format!("n{counter}");
    *counter += 1;
    for child in &mut node.children {
        name_nodes(child, counter);
    }
}

/// Counts the nodes of a tree.
pub fn tree_size(node: &Node) -> usize {
    1 + node.children.iter().map(tree_size).sum::<usize>()
}

/// Strategy for gift maps keyed by occasion.
pub fn gifts_strategy() -> impl Strategy<Value = BTreeMap<String, LineItem>> {
    prop::collection::btree_map(ident_strategy(), line_item_strategy(), 0..3)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn idents_are_non_empty(ident in ident_strategy()) {
            prop_assert!(!ident.is_empty());
        }

        #[test]
        fn tree_names_are_unique(root in node_tree_strategy(3)) {
            let mut names = BTreeSet::new();
            let mut stack = vec![&root];
            while let Some(node) = stack.pop() {
                prop_assert!(names.insert(node.name.clone()));
                stack.extend(node.children.iter());
            }
            prop_assert_eq!(names.len(), tree_size(&root));
        }

        #[test]
        fn order_lines_have_distinct_skus(order in order_strategy()) {
            let skus: BTreeSet<&str> = order.items.iter().map(|i| i.sku.as_str()).collect();
            prop_assert_eq!(skus.len(), order.items.len());
        }
    }
}
