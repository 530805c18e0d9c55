//! Typed registries over the document store.
//!
//! Registries own the save path: every write goes through validation
//! (uniqueness, reference consistency, exclusivity) before it reaches the
//! store. Public mutating methods take the store's writer lock; the
//! crate-private `*_locked` variants assume the caller already holds it.

pub mod batches;
pub mod hydrometers;

pub use batches::{BatchQuery, BatchRegistry, NewBatch};
pub use hydrometers::{HydrometerQuery, HydrometerRegistry};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::batch::Batch;
use crate::error::{GravitonError, Result};
use crate::hydrometer::Hydrometer;
use crate::id::EntityId;
use crate::store::{Collection, DocumentStore, Filter, StoreError};

/// A persisted entity type bound to one collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
    const NAME: &'static str;

    fn id(&self) -> &EntityId;
}

impl Entity for Hydrometer {
    const COLLECTION: Collection = Collection::Hydrometers;
    const NAME: &'static str = "hydrometer";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl Entity for Batch {
    const COLLECTION: Collection = Collection::Batches;
    const NAME: &'static str = "batch";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// All entities of type `T` matching `filter`.
pub fn find<T: Entity, S: DocumentStore>(store: &S, filter: &Filter) -> Result<Vec<T>> {
    store
        .find(T::COLLECTION, filter)?
        .into_iter()
        .map(decode::<T>)
        .collect()
}

/// Exactly one entity matching `filter`.
pub fn single<T: Entity, S: DocumentStore>(store: &S, filter: &Filter) -> Result<T> {
    let mut found = find::<T, S>(store, filter)?;
    match found.len() {
        0 => Err(GravitonError::not_found(T::NAME, filter.describe())),
        1 => Ok(found.remove(0)),
        count => Err(GravitonError::MultipleFound {
            entity: T::NAME,
            key: filter.describe(),
            count,
        }),
    }
}

/// Lookup by identity; `None` when absent.
pub fn get<T: Entity, S: DocumentStore>(store: &S, id: &EntityId) -> Result<Option<T>> {
    match single::<T, S>(store, &Filter::by_id(id)) {
        Ok(entity) => Ok(Some(entity)),
        Err(GravitonError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

pub(crate) fn persist<T: Entity, S: DocumentStore>(store: &S, entity: &T) -> Result<()> {
    let document = serde_json::to_value(entity).map_err(|e| StoreError::Malformed {
        collection: T::COLLECTION.as_str(),
        message: e.to_string(),
    })?;
    store.upsert(T::COLLECTION, entity.id(), document)?;
    Ok(())
}

fn decode<T: Entity>(document: serde_json::Value) -> Result<T> {
    serde_json::from_value(document).map_err(|e| {
        GravitonError::Persistence(StoreError::Malformed {
            collection: T::COLLECTION.as_str(),
            message: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn single_distinguishes_none_from_many() {
        let store = MemoryStore::new();
        let err = single::<Hydrometer, _>(&store, &Filter::new().eq("name", "Blue"))
            .expect_err("empty store has no match");
        assert!(matches!(err, GravitonError::NotFound { entity: "hydrometer", .. }));

        for name in ["Blue", "Green"] {
            persist(&store, &Hydrometer::new(name, "")).expect("persist");
        }
        let err = single::<Hydrometer, _>(&store, &Filter::new().eq("archived", false))
            .expect_err("two matches");
        assert!(matches!(err, GravitonError::MultipleFound { count: 2, .. }));

        let green = single::<Hydrometer, _>(&store, &Filter::new().eq("name", "Green"))
            .expect("one match");
        assert_eq!(green.name, "Green");
    }

    #[test]
    fn get_returns_none_for_unknown_id() {
        let store = MemoryStore::new();
        assert!(
            get::<Batch, _>(&store, &EntityId::new())
                .expect("lookup should succeed")
                .is_none()
        );
    }

    #[test]
    fn malformed_documents_surface_as_persistence_errors() {
        let store = MemoryStore::new();
        let id = EntityId::new();
        store
            .upsert(
                Collection::Hydrometers,
                &id,
                json!({"id": id.to_string(), "name": 42}),
            )
            .expect("raw upsert");
        let err = find::<Hydrometer, _>(&store, &Filter::new()).expect_err("must not decode");
        assert!(matches!(err, GravitonError::Persistence(StoreError::Malformed { .. })));
    }
}
