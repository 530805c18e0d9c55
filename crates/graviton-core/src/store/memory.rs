//! In-memory document store.
//!
//! Canonical store for tests and embedding: deterministic id order, atomic
//! single-document writes, and an in-process writer lock.

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Collection, DocumentStore, Filter, StoreError, document_id};
use crate::id::EntityId;

type Documents = BTreeMap<String, Value>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<Collection, Documents>>,
    writer: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw documents.
    ///
    /// Duplicate ids resolve with last-write-wins, matching append/overlay
    /// loading of JSONL collections.
    pub fn from_documents(
        documents: impl IntoIterator<Item = (Collection, Value)>,
    ) -> Result<Self, StoreError> {
        let mut collections: BTreeMap<Collection, Documents> = BTreeMap::new();
        for (collection, document) in documents {
            let id = document_id(collection, &document)?;
            collections.entry(collection).or_default().insert(id, document);
        }
        Ok(Self {
            collections: RwLock::new(collections),
            writer: Mutex::new(()),
        })
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.read().values().all(BTreeMap::is_empty)
    }

    /// All documents of `collection` in id order.
    pub fn documents(&self, collection: Collection) -> Vec<Value> {
        self.collections
            .read()
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl DocumentStore for MemoryStore {
    type WriteGuard<'a> = MutexGuard<'a, ()>;

    fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn upsert(
        &self,
        collection: Collection,
        id: &EntityId,
        document: Value,
    ) -> Result<(), StoreError> {
        let key = id.to_string();
        if document_id(collection, &document)? != key {
            return Err(StoreError::Malformed {
                collection: collection.as_str(),
                message: format!("document id does not match upsert key {key}"),
            });
        }
        self.collections
            .write()
            .entry(collection)
            .or_default()
            .insert(key, document);
        Ok(())
    }

    fn remove(&self, collection: Collection, id: &EntityId) -> Result<bool, StoreError> {
        Ok(self
            .collections
            .write()
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id.to_string()))
            .is_some())
    }

    fn lock_writes(&self) -> Result<Self::WriteGuard<'_>, StoreError> {
        Ok(self.writer.lock())
    }
}
