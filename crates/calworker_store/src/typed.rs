//! Typed collection view.

use crate::change_feed::ChangeType;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// A collection whose documents decode to `T`.
///
/// Thin wrapper over [`Store`]; it holds no data of its own.
pub struct TypedCollection<T> {
    store: Store,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(store: Store, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
            _marker: PhantomData,
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets a record by id.
    pub fn get(&self, id: &str) -> StoreResult<Option<T>> {
        self.store.get_as(&self.name, id)
    }

    /// Gets a record that must exist.
    pub fn require(&self, id: &str) -> StoreResult<T> {
        self.get(id)?.ok_or_else(|| StoreError::NotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        })
    }

    /// Returns every record, in id order.
    pub fn all(&self) -> StoreResult<Vec<T>> {
        decode_all(self.store.all(&self.name)?)
    }

    /// Returns the records whose `field` equals `value`.
    pub fn find_by<V: Serialize + ?Sized>(&self, field: &str, value: &V) -> StoreResult<Vec<T>> {
        let value = serde_json::to_value(value)?;
        decode_all(self.store.find_by(&self.name, field, &value)?)
    }

    /// Writes a record under `id`.
    pub fn put(&self, id: &str, record: &T) -> StoreResult<ChangeType> {
        self.store.put_as(&self.name, id, record)
    }

    /// Removes a record. Returns false if it did not exist.
    pub fn remove(&self, id: &str) -> StoreResult<bool> {
        Ok(self.store.remove(&self.name, id)?.is_some())
    }
}

fn decode_all<T: DeserializeOwned>(docs: Vec<serde_json::Value>) -> StoreResult<Vec<T>> {
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}

impl<T> Clone for TypedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCollection")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Store, StoreConfig, StoreError};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(rename = "_id", default)]
        id: String,
        owner: String,
    }

    fn note(owner: &str) -> Note {
        Note {
            id: String::new(),
            owner: owner.to_string(),
        }
    }

    #[tokio::test]
    async fn typed_round_trip() {
        let store = Store::new(StoreConfig::new("test").with_index("notes", "owner"));
        store.load().await.unwrap();
        let notes = store.collection::<Note>("notes");

        notes.put("n1", &note("a1")).unwrap();
        notes.put("n2", &note("a2")).unwrap();

        let n1 = notes.require("n1").unwrap();
        assert_eq!(n1.id, "n1");
        assert_eq!(notes.find_by("owner", "a2").unwrap().len(), 1);
        assert_eq!(notes.all().unwrap().len(), 2);

        assert!(notes.remove("n1").unwrap());
        assert!(matches!(notes.require("n1"), Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn wrong_shape_is_a_codec_error() {
        let store = Store::in_memory();
        store.load().await.unwrap();
        store.put("notes", "n1", serde_json::json!({ "owner": 5 })).unwrap();
        let notes = store.collection::<Note>("notes");
        assert!(matches!(notes.get("n1"), Err(StoreError::Codec(_))));
    }
}
