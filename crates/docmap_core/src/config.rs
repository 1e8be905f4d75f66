//! Datastore configuration.

use docmap_store::WriteDurability;

/// Default name of the reserved unique index over a kind's key fields.
pub const DEFAULT_KEY_INDEX_NAME: &str = "__key_";

/// Default prefix of indexes created for unique-tagged fields.
pub const DEFAULT_UNIQUE_INDEX_PREFIX: &str = "__unique_";

/// Default prefix of indexes created for index-tagged fields.
pub const DEFAULT_REGULAR_INDEX_PREFIX: &str = "__regular_";

/// Configuration for a [`crate::Datastore`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Durability requested for writes that do not specify one.
    pub write_durability: WriteDurability,

    /// Number of documents fetched per round trip by new queries.
    pub batch_size: u32,

    /// Name of the reserved key index.
    pub key_index_name: String,

    /// Prefix of unique secondary indexes.
    pub unique_index_prefix: String,

    /// Prefix of non-unique secondary indexes.
    pub regular_index_prefix: String,

    /// Whether first access to a kind reconciles its indexes.
    pub reconcile_indexes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_durability: WriteDurability::Acknowledged,
            batch_size: 1000,
            key_index_name: DEFAULT_KEY_INDEX_NAME.to_string(),
            unique_index_prefix: DEFAULT_UNIQUE_INDEX_PREFIX.to_string(),
            regular_index_prefix: DEFAULT_REGULAR_INDEX_PREFIX.to_string(),
            reconcile_indexes: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default write durability.
    #[must_use]
    pub const fn write_durability(mut self, durability: WriteDurability) -> Self {
        self.write_durability = durability;
        self
    }

    /// Sets the default query batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the name of the reserved key index.
    #[must_use]
    pub fn key_index_name(mut self, name: impl Into<String>) -> Self {
        self.key_index_name = name.into();
        self
    }

    /// Sets the prefix of unique secondary indexes.
    #[must_use]
    pub fn unique_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unique_index_prefix = prefix.into();
        self
    }

    /// Sets the prefix of non-unique secondary indexes.
    #[must_use]
    pub fn regular_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.regular_index_prefix = prefix.into();
        self
    }

    /// Sets whether indexes are reconciled on first access to a kind.
    #[must_use]
    pub const fn reconcile_indexes(mut self, value: bool) -> Self {
        self.reconcile_indexes = value;
        self
    }

    /// Returns true if `name` is an index this library manages.
    pub fn is_managed_index(&self, name: &str) -> bool {
        name == self.key_index_name
            || name.starts_with(&self.unique_index_prefix)
            || name.starts_with(&self.regular_index_prefix)
    }
}
