//! Store configuration.

use serde_json::Value;

/// A field index on one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Collection name.
    pub collection: String,
    /// Top-level field name.
    pub field: String,
}

/// Configuration for a [`crate::Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store name, used in logs and errors.
    pub name: String,
    /// Field indexes maintained on write.
    pub indexes: Vec<IndexSpec>,
    /// Documents present when the store is loaded, as `(collection, document)`.
    pub snapshot: Vec<(String, Value)>,
}

impl StoreConfig {
    /// Creates an empty configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
            snapshot: Vec::new(),
        }
    }

    /// Adds a field index.
    pub fn with_index(mut self, collection: impl Into<String>, field: impl Into<String>) -> Self {
        self.indexes.push(IndexSpec {
            collection: collection.into(),
            field: field.into(),
        });
        self
    }

    /// Adds a document to the snapshot read by `load`.
    ///
    /// The document must be an object with a string `_id`.
    pub fn with_record(mut self, collection: impl Into<String>, document: Value) -> Self {
        self.snapshot.push((collection.into(), document));
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("calendar")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_builder() {
        let config = StoreConfig::new("test")
            .with_index("calendars", "accountId")
            .with_record("accounts", json!({ "_id": "a1" }));
        assert_eq!(config.name, "test");
        assert_eq!(config.indexes.len(), 1);
        assert_eq!(config.indexes[0].field, "accountId");
        assert_eq!(config.snapshot.len(), 1);
        assert_eq!(StoreConfig::default().name, "calendar");
    }
}
