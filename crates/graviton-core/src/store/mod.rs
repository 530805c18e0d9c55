//! Entity store adapter: per-collection find/upsert/remove.
//!
//! The core assumes only that single-document writes are atomic. Adapters
//! additionally provide a writer lock so that a check-then-write sequence
//! (exclusivity check followed by the batch and hydrometer writes) is not
//! interleaved with another writer on the same store.
//!
//! ```text
//! Registry / engine (typed entities)
//!     ↕  serde_json::Value documents
//! DocumentStore (MemoryStore | JsonlStore)
//! ```

pub mod jsonl;
pub mod lock;
pub mod memory;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::id::EntityId;

pub use jsonl::{JsonlError, JsonlStore};
pub use lock::{FileLockGuard, lock_path_for};
pub use memory::MemoryStore;

/// A named group of documents of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Hydrometers,
    Batches,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Hydrometers, Collection::Batches];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Hydrometers => "hydrometers",
            Collection::Batches => "batches",
        }
    }
}

/// Field-equality filter over a document's serialized form.
///
/// An absent field compares equal to `null`, so `eq("hydrometer", Value::Null)`
/// matches unassigned references regardless of how they were written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the document identity.
    pub fn by_id(id: &EntityId) -> Self {
        Self::new().eq("id", id.to_string())
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|(field, expected)| {
            let actual = document.get(field).unwrap_or(&Value::Null);
            actual == expected
        })
    }

    /// Render the clauses for error messages.
    pub fn describe(&self) -> String {
        if self.clauses.is_empty() {
            return "{}".to_string();
        }
        let parts: Vec<String> = self
            .clauses
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect();
        parts.join(",")
    }
}

/// Errors raised by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("store lock busy: {lock_path} (held by {holder})")]
    LockBusy { lock_path: String, holder: String },

    #[error("failed to acquire store lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    #[error("document in {collection} is malformed: {message}")]
    Malformed {
        collection: &'static str,
        message: String,
    },

    #[error("{0}")]
    Backend(String),
}

/// Persistence adapter consumed by the registries.
pub trait DocumentStore: Send + Sync {
    /// Held for the duration of one serialized mutation sequence.
    type WriteGuard<'a>
    where
        Self: 'a;

    /// All documents of `collection` matching `filter`, in deterministic id order.
    fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    /// Insert or replace one document atomically.
    fn upsert(
        &self,
        collection: Collection,
        id: &EntityId,
        document: Value,
    ) -> Result<(), StoreError>;

    /// Remove one document. Returns whether it existed.
    fn remove(&self, collection: Collection, id: &EntityId) -> Result<bool, StoreError>;

    /// Serialize writers. Not reentrant: callers must not nest acquisitions.
    fn lock_writes(&self) -> Result<Self::WriteGuard<'_>, StoreError>;
}

/// Deterministic digest of every collection's contents.
pub fn snapshot_ref<S: DocumentStore>(store: &S) -> Result<String, StoreError> {
    let mut hasher = Sha256::new();
    for collection in Collection::ALL {
        hasher.update(collection.as_str().as_bytes());
        hasher.update([0u8]);
        for document in store.find(collection, &Filter::new())? {
            let line = serde_json::to_string(&document).map_err(|e| StoreError::Malformed {
                collection: collection.as_str(),
                message: e.to_string(),
            })?;
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!("store1_sha256_{hex}"))
}

/// Extract the `id` of a raw document.
pub(crate) fn document_id(collection: Collection, document: &Value) -> Result<String, StoreError> {
    document
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Malformed {
            collection: collection.as_str(),
            message: "missing string `id` field".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_all_clauses() {
        let doc = json!({"id": "a", "active": true, "hydrometer": "h1"});
        assert!(Filter::new().matches(&doc));
        assert!(Filter::new().eq("active", true).matches(&doc));
        assert!(
            Filter::new()
                .eq("active", true)
                .eq("hydrometer", "h1")
                .matches(&doc)
        );
        assert!(
            !Filter::new()
                .eq("active", true)
                .eq("hydrometer", "h2")
                .matches(&doc)
        );
    }

    #[test]
    fn absent_field_matches_null() {
        let doc = json!({"id": "a"});
        assert!(Filter::new().eq("batch", Value::Null).matches(&doc));
        assert!(!Filter::new().eq("batch", "b").matches(&doc));
    }

    #[test]
    fn snapshot_ref_changes_with_contents() {
        let store = MemoryStore::new();
        let empty = snapshot_ref(&store).expect("snapshot should compute");
        let id = EntityId::new();
        store
            .upsert(
                Collection::Hydrometers,
                &id,
                json!({"id": id.to_string(), "name": "Blue Hydrometer"}),
            )
            .expect("upsert should succeed");
        let filled = snapshot_ref(&store).expect("snapshot should compute");
        assert_ne!(empty, filled);
        assert!(filled.starts_with("store1_sha256_"));
        assert_eq!(filled, snapshot_ref(&store).expect("snapshot is stable"));
    }
}
