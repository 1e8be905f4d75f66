//! Test fixtures and datastore helpers.
//!
//! Provides a small order-processing domain covering every field shape
//! and tag the engine supports, plus constructors for datastores over a
//! [`RecordingStore`].
//!
//! Kinds declared here are registered process-wide; tests must not bind
//! other types to them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use docmap_core::{enum_field, Config, Datastore, Entity, EntityHeader, EnumField, Schema};
use docmap_store::DocumentStore;

use crate::recording::RecordingStore;

/// Implements the header and slot accessors of [`Entity`] for a struct
/// with a `header: EntityHeader` field.
///
/// # Example
///
/// ```rust,ignore
/// impl Entity for Counter {
///     fn schema() -> Schema {
///         Schema::new("Counter").key::<String>("id").field::<i64>("n")
///     }
///
///     entity_slots!("id" => id, "n" => n);
/// }
/// ```
#[macro_export]
macro_rules! entity_slots {
    ($($name:literal => $field:ident),* $(,)?) => {
        fn header(&self) -> &::docmap_core::EntityHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut ::docmap_core::EntityHeader {
            &mut self.header
        }

        fn field(&self, name: &str) -> ::std::option::Option<&dyn ::docmap_core::Slot> {
            match name {
                $($name => ::std::option::Option::Some(&self.$field),)*
                _ => ::std::option::Option::None,
            }
        }

        fn field_mut(&mut self, name: &str) -> ::std::option::Option<&mut dyn ::docmap_core::Slot> {
            match name {
                $($name => ::std::option::Option::Some(&mut self.$field),)*
                _ => ::std::option::Option::None,
            }
        }
    };
}

/// Fixed timestamp used by fixtures, millisecond precision.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_123)
        .single()
        .expect("valid timestamp")
}

/// Creates a datastore over a fresh recording memory store.
pub fn recorded_datastore() -> (Datastore, Arc<RecordingStore>) {
    recorded_datastore_with(Config::default())
}

/// Same as [`recorded_datastore`] with an explicit configuration.
pub fn recorded_datastore_with(config: Config) -> (Datastore, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::memory());
    let shared: Arc<dyn DocumentStore> = Arc::clone(&store) as Arc<dyn DocumentStore>;
    let datastore = Datastore::with_config(shared, config);
    (datastore, store)
}

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Status {
    /// Accepted, not shipped.
    #[default]
    Open,
    /// Handed to a carrier.
    Shipped,
    /// Withdrawn.
    Cancelled,
}

impl EnumField for Status {
    fn name(&self) -> &'static str {
        match self {
            Status::Open => "Open",
            Status::Shipped => "Shipped",
            Status::Cancelled => "Cancelled",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Open" => Some(Status::Open),
            "Shipped" => Some(Status::Shipped),
            "Cancelled" => Some(Status::Cancelled),
            _ => None,
        }
    }
}

enum_field!(Status);

/// A customer, referenced by orders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique when present.
    pub email: Option<String>,
    /// Indexed loyalty tier.
    pub tier: i32,
}

impl Customer {
    /// Creates a customer with the given identity and name.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Customer {
    fn schema() -> Schema {
        Schema::new("Customer")
            .key::<String>("id")
            .field::<String>("name")
            .unique::<Option<String>>("email")
            .indexed::<i32>("tier")
    }

    entity_slots!("id" => id, "name" => name, "email" => email, "tier" => tier);
}

/// One order line, embedded in full in its order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItem {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity.
    pub sku: String,
    /// Units ordered.
    pub quantity: i32,
    /// Unit price.
    pub price: f64,
}

impl LineItem {
    /// Creates a line.
    pub fn new(sku: &str, quantity: i32, price: f64) -> Self {
        Self {
            sku: sku.to_string(),
            quantity,
            price,
            ..Self::default()
        }
    }
}

impl Entity for LineItem {
    fn schema() -> Schema {
        Schema::new("LineItem")
            .key::<String>("sku")
            .field::<i32>("quantity")
            .field::<f64>("price")
    }

    entity_slots!("sku" => sku, "quantity" => quantity, "price" => price);
}

/// Postal address; shallow, so it only exists inside its owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    /// Mapping header.
    pub header: EntityHeader,
    /// Street line.
    pub street: String,
    /// City.
    pub city: String,
}

impl Address {
    /// Creates an address.
    pub fn new(street: &str, city: &str) -> Self {
        Self {
            street: street.to_string(),
            city: city.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Address {
    fn schema() -> Schema {
        Schema::new("Address")
            .shallow()
            .field::<String>("street")
            .field::<String>("city")
    }

    entity_slots!("street" => street, "city" => city);
}

/// An order touching every field shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity.
    pub number: String,
    /// Lifecycle state, indexed.
    pub status: Status,
    /// Placement time.
    pub placed: DateTime<Utc>,
    /// Referenced, stored by key only and never cascaded.
    pub customer: Option<Customer>,
    /// Embedded in full.
    pub items: Vec<LineItem>,
    /// Embedded shallow entity.
    pub shipping: Option<Address>,
    /// Free text.
    pub notes: Vec<String>,
    /// Labels.
    pub tags: BTreeSet<String>,
    /// Arbitrary counters.
    pub attributes: HashMap<String, i64>,
    /// Gift lines stored by key and cascaded.
    pub gifts: BTreeMap<String, LineItem>,
}

impl Order {
    /// Creates an open order placed at [`fixed_time`].
    pub fn new(number: &str) -> Self {
        Self {
            number: number.to_string(),
            placed: fixed_time(),
            ..Self::default()
        }
    }
}

impl Entity for Order {
    fn schema() -> Schema {
        Schema::new("Order")
            .key::<String>("number")
            .indexed::<Status>("status")
            .field::<DateTime<Utc>>("placed")
            .reference::<Option<Customer>>("customer")
            .full_save::<Vec<LineItem>>("items")
            .full_save::<Option<Address>>("shipping")
            .field::<Vec<String>>("notes")
            .field::<BTreeSet<String>>("tags")
            .field::<HashMap<String, i64>>("attributes")
            .field::<BTreeMap<String, LineItem>>("gifts")
    }

    entity_slots!(
        "number" => number,
        "status" => status,
        "placed" => placed,
        "customer" => customer,
        "items" => items,
        "shipping" => shipping,
        "notes" => notes,
        "tags" => tags,
        "attributes" => attributes,
        "gifts" => gifts,
    );
}

/// Shipment keyed by its order and carrier.
///
/// The order contributes its own key, so the composite key flattens to
/// `order.number` and `carrier`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shipment {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity, substituted by the order's key.
    pub order: Order,
    /// Identity.
    pub carrier: String,
    /// Parcel weight.
    pub weight: f64,
}

impl Shipment {
    /// Creates a shipment of `order`.
    pub fn new(order: Order, carrier: &str, weight: f64) -> Self {
        Self {
            order,
            carrier: carrier.to_string(),
            weight,
            ..Self::default()
        }
    }
}

impl Entity for Shipment {
    fn schema() -> Schema {
        Schema::new("Shipment")
            .key::<Order>("order")
            .key::<String>("carrier")
            .field::<f64>("weight")
    }

    entity_slots!("order" => order, "carrier" => carrier, "weight" => weight);
}

/// Keyless entity stored without null fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    /// Mapping header.
    pub header: EntityHeader,
    /// Message.
    pub message: String,
    /// Optional severity.
    pub level: Option<String>,
}

impl LogEntry {
    /// Creates an entry without severity.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for LogEntry {
    fn schema() -> Schema {
        Schema::new("LogEntry")
            .ignore_null()
            .field::<String>("message")
            .field::<Option<String>>("level")
    }

    entity_slots!("message" => message, "level" => level);
}

/// Keyed owner of keyless entries.
///
/// `latest` is stored as the entry's empty key, `history` in full.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Logbook {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity.
    pub name: String,
    /// Most recent entry.
    pub latest: Option<LogEntry>,
    /// Earlier entries.
    pub history: Vec<LogEntry>,
}

impl Logbook {
    /// Creates an empty logbook.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Logbook {
    fn schema() -> Schema {
        Schema::new("Logbook")
            .key::<String>("name")
            .field::<Option<LogEntry>>("latest")
            .full_save::<Vec<LogEntry>>("history")
    }

    entity_slots!("name" => name, "latest" => latest, "history" => history);
}

/// Tree of entities, each child embedded in full.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity.
    pub name: String,
    /// Children.
    pub children: Vec<Node>,
}

impl Node {
    /// Creates a leaf.
    pub fn leaf(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Creates a node with children.
    pub fn with_children(name: &str, children: Vec<Node>) -> Self {
        Self {
            children,
            ..Self::leaf(name)
        }
    }
}

impl Entity for Node {
    fn schema() -> Schema {
        Schema::new("Node")
            .key::<String>("name")
            .full_save::<Vec<Node>>("children")
    }

    entity_slots!("name" => name, "children" => children);
}

/// Keyed entity whose documents may carry fields it does not declare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity.
    pub handle: String,
    /// Optional text.
    pub bio: Option<String>,
}

impl Entity for Profile {
    fn schema() -> Schema {
        Schema::new("Profile")
            .ignore_unknown_properties()
            .key::<String>("handle")
            .field::<Option<String>>("bio")
    }

    entity_slots!("handle" => handle, "bio" => bio);
}

/// Scalar coverage for round trips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    /// Mapping header.
    pub header: EntityHeader,
    /// Identity.
    pub id: String,
    /// Boolean.
    pub flag: bool,
    /// Narrow integer.
    pub small: i16,
    /// Wide integer.
    pub wide: i64,
    /// Float.
    pub ratio: f64,
    /// Single character.
    pub letter: char,
    /// Optional integer.
    pub maybe: Option<i32>,
    /// Timestamp.
    pub when: DateTime<Utc>,
    /// Enum list.
    pub states: Vec<Status>,
}

impl Entity for Sample {
    fn schema() -> Schema {
        Schema::new("Sample")
            .key::<String>("id")
            .field::<bool>("flag")
            .field::<i16>("small")
            .field::<i64>("wide")
            .field::<f64>("ratio")
            .field::<char>("letter")
            .field::<Option<i32>>("maybe")
            .field::<DateTime<Utc>>("when")
            .field::<Vec<Status>>("states")
    }

    entity_slots!(
        "id" => id,
        "flag" => flag,
        "small" => small,
        "wide" => wide,
        "ratio" => ratio,
        "letter" => letter,
        "maybe" => maybe,
        "when" => when,
        "states" => states,
    );
}

/// A fully populated order with a referenced customer, two lines, a
/// shipping address and one gift.
pub fn sample_order(number: &str) -> Order {
    let mut order = Order::new(number);
    order.customer = Some(Customer::new("c-1", "Ada"));
    order.items = vec![LineItem::new("sku-1", 2, 9.5), LineItem::new("sku-2", 1, 20.0)];
    order.shipping = Some(Address::new("1 Main St", "Springfield"));
    order.notes = vec!["fragile".to_string()];
    order.tags = BTreeSet::from(["priority".to_string()]);
    order.attributes = HashMap::from([("retries".to_string(), 0)]);
    order.gifts = BTreeMap::from([("card".to_string(), LineItem::new("gift-card", 1, 5.0))]);
    order
}
