//! The document store.

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeType, FeedListenerId};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::index::FieldIndex;
use crate::typed::TypedCollection;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Field holding a document's id.
pub const ID_FIELD: &str = "_id";

#[derive(Default)]
struct Tables {
    collections: HashMap<String, BTreeMap<String, Value>>,
    indexes: HashMap<String, Vec<FieldIndex>>,
}

impl Tables {
    fn with_indexes(config: &StoreConfig) -> Self {
        let mut tables = Tables::default();
        for spec in &config.indexes {
            tables
                .indexes
                .entry(spec.collection.clone())
                .or_default()
                .push(FieldIndex::new(spec.field.clone()));
        }
        tables
    }

    fn insert(&mut self, collection: &str, id: &str, document: Value) -> Option<Value> {
        let previous = self
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        if let Some(indexes) = self.indexes.get_mut(collection) {
            for index in indexes {
                if let Some(previous) = &previous {
                    index.remove(id, previous);
                }
                index.insert(id, &document);
            }
        }
        previous
    }

    fn remove(&mut self, collection: &str, id: &str) -> Option<Value> {
        let removed = self.collections.get_mut(collection)?.remove(id)?;
        if let Some(indexes) = self.indexes.get_mut(collection) {
            for index in indexes {
                index.remove(id, &removed);
            }
        }
        Some(removed)
    }
}

struct StoreInner {
    config: StoreConfig,
    loaded: AtomicBool,
    loads: AtomicUsize,
    load_lock: tokio::sync::Mutex<()>,
    tables: RwLock<Tables>,
    sequence: AtomicU64,
    feed: ChangeFeed,
}

/// Named collections of JSON documents.
///
/// Documents are JSON objects keyed by their `_id`. Cloning a `Store` yields
/// another handle to the same data.
///
/// Writes are visible to readers as soon as they return. Change events are
/// delivered after the write, outside the store's lock.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates an unloaded store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tables: RwLock::new(Tables::with_indexes(&config)),
                config,
                loaded: AtomicBool::new(false),
                loads: AtomicUsize::new(0),
                load_lock: tokio::sync::Mutex::new(()),
                sequence: AtomicU64::new(0),
                feed: ChangeFeed::new(),
            }),
        }
    }

    /// Creates an unloaded store with the default configuration.
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::default())
    }

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Opens the store, reading the configured snapshot.
    ///
    /// Idempotent: once loaded, later calls return immediately. A failed load
    /// leaves the store unloaded and may be retried.
    pub async fn load(&self) -> StoreResult<()> {
        let _guard = self.inner.load_lock.lock().await;
        if self.is_loaded() {
            return Ok(());
        }
        self.inner.loads.fetch_add(1, Ordering::SeqCst);

        let mut tables = Tables::with_indexes(&self.inner.config);
        for (collection, document) in &self.inner.config.snapshot {
            let id = document_id(collection, document)?;
            tables.insert(collection, &id, document.clone());
        }
        *self.inner.tables.write() = tables;
        self.inner.loaded.store(true, Ordering::SeqCst);

        tracing::info!(
            store = %self.inner.config.name,
            records = self.inner.config.snapshot.len(),
            "store loaded"
        );
        Ok(())
    }

    /// Returns true once `load` succeeded.
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::SeqCst)
    }

    /// Returns how many times loading was attempted.
    pub fn load_count(&self) -> usize {
        self.inner.loads.load(Ordering::SeqCst)
    }

    fn ensure_loaded(&self) -> StoreResult<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(StoreError::NotLoaded {
                store: self.inner.config.name.clone(),
            })
        }
    }

    /// Gets a document by id.
    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.ensure_loaded()?;
        Ok(self
            .inner
            .tables
            .read()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    /// Returns every document of a collection, in id order.
    pub fn all(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.ensure_loaded()?;
        Ok(self
            .inner
            .tables
            .read()
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns the number of documents in a collection.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        self.ensure_loaded()?;
        Ok(self
            .inner
            .tables
            .read()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len))
    }

    /// Returns the documents whose top-level `field` equals `value`, in id
    /// order. Uses the field index when one is configured, otherwise scans.
    pub fn find_by(&self, collection: &str, field: &str, value: &Value) -> StoreResult<Vec<Value>> {
        self.ensure_loaded()?;
        let tables = self.inner.tables.read();
        let Some(docs) = tables.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let index = tables
            .indexes
            .get(collection)
            .and_then(|indexes| indexes.iter().find(|i| i.field() == field));
        let found = match index {
            Some(index) => index
                .lookup(value)
                .iter()
                .filter_map(|id| docs.get(id).cloned())
                .collect(),
            None => docs
                .values()
                .filter(|doc| doc.get(field) == Some(value))
                .cloned()
                .collect(),
        };
        Ok(found)
    }

    /// Writes a document.
    ///
    /// `document` must be a JSON object; its `_id` is set to `id`.
    pub fn put(&self, collection: &str, id: &str, document: Value) -> StoreResult<ChangeType> {
        self.ensure_loaded()?;
        let Value::Object(mut fields) = document else {
            return Err(StoreError::InvalidRecord {
                collection: collection.to_string(),
                reason: format!("document {id} is not an object"),
            });
        };
        fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        let document = Value::Object(fields);

        let event = {
            let mut tables = self.inner.tables.write();
            let previous = tables.insert(collection, id, document.clone());
            let sequence = self.next_sequence();
            if previous.is_some() {
                ChangeEvent::update(sequence, collection, id, document)
            } else {
                ChangeEvent::insert(sequence, collection, id, document)
            }
        };
        let change_type = event.change_type;
        self.inner.feed.emit(event);
        Ok(change_type)
    }

    /// Removes a document and returns it, or `None` if it did not exist.
    pub fn remove(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.ensure_loaded()?;
        let event = {
            let mut tables = self.inner.tables.write();
            let Some(removed) = tables.remove(collection, id) else {
                return Ok(None);
            };
            ChangeEvent::delete(self.next_sequence(), collection, id, removed)
        };
        let removed = event.document.clone();
        self.inner.feed.emit(event);
        Ok(Some(removed))
    }

    fn next_sequence(&self) -> u64 {
        self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Gets and decodes a document.
    pub fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> StoreResult<Option<T>> {
        self.get(collection, id)?
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .transpose()
    }

    /// Encodes and writes a document.
    pub fn put_as<T: Serialize>(&self, collection: &str, id: &str, record: &T) -> StoreResult<ChangeType> {
        self.put(collection, id, serde_json::to_value(record)?)
    }

    /// Returns a typed view of a collection.
    pub fn collection<T>(&self, name: &str) -> TypedCollection<T>
    where
        T: Serialize + DeserializeOwned,
    {
        TypedCollection::new(self.clone(), name)
    }

    /// Returns the change feed.
    pub fn feed(&self) -> &ChangeFeed {
        &self.inner.feed
    }

    /// Registers a change listener for one collection.
    pub fn listen<F>(&self, collection: &str, listener: F) -> FeedListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.feed.listen(Some(collection), listener)
    }

    /// Removes a change listener.
    pub fn unlisten(&self, id: FeedListenerId) -> bool {
        self.inner.feed.unlisten(id)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.config.name)
            .field("loaded", &self.is_loaded())
            .field("feed", &self.inner.feed)
            .finish()
    }
}

fn document_id(collection: &str, document: &Value) -> StoreResult<String> {
    match document.get(ID_FIELD) {
        Some(Value::String(id)) if document.is_object() => Ok(id.clone()),
        _ => Err(StoreError::InvalidRecord {
            collection: collection.to_string(),
            reason: format!("document without a string {ID_FIELD}: {document}"),
        }),
    }
}
