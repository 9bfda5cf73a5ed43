//! Non-unique field index.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Hash index from one top-level field's value to the ids holding it.
///
/// Keys are the canonical JSON text of the field value, so `"1"` and `1`
/// are different keys. Documents without the field are not indexed.
#[derive(Debug)]
pub(crate) struct FieldIndex {
    field: String,
    entries: HashMap<String, BTreeSet<String>>,
}

impl FieldIndex {
    pub(crate) fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            entries: HashMap::new(),
        }
    }

    pub(crate) fn field(&self) -> &str {
        &self.field
    }

    fn key_of(&self, document: &Value) -> Option<String> {
        document.get(&self.field).map(Value::to_string)
    }

    pub(crate) fn insert(&mut self, id: &str, document: &Value) {
        if let Some(key) = self.key_of(document) {
            self.entries.entry(key).or_default().insert(id.to_string());
        }
    }

    pub(crate) fn remove(&mut self, id: &str, document: &Value) {
        let Some(key) = self.key_of(document) else {
            return;
        };
        if let Some(ids) = self.entries.get_mut(&key) {
            ids.remove(id);
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Returns the ids whose field equals `value`, in id order.
    pub(crate) fn lookup(&self, value: &Value) -> Vec<String> {
        self.entries
            .get(&value.to_string())
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_lookup_remove() {
        let mut index = FieldIndex::new("accountId");
        index.insert("c2", &json!({ "accountId": "a1" }));
        index.insert("c1", &json!({ "accountId": "a1" }));
        index.insert("c3", &json!({ "accountId": "a2" }));
        index.insert("c4", &json!({ "name": "unindexed" }));

        assert_eq!(index.lookup(&json!("a1")), vec!["c1", "c2"]);
        index.remove("c1", &json!({ "accountId": "a1" }));
        assert_eq!(index.lookup(&json!("a1")), vec!["c2"]);
        assert!(index.lookup(&json!("missing")).is_empty());
    }

    #[test]
    fn keys_are_typed() {
        let mut index = FieldIndex::new("n");
        index.insert("x", &json!({ "n": 1 }));
        assert!(index.lookup(&json!("1")).is_empty());
        assert_eq!(index.lookup(&json!(1)), vec!["x"]);
    }
}
