//! Hydrometer registry: CRUD and archival state.

use serde_json::Value;

use super::{find, get, persist, single};
use crate::batch::Batch;
use crate::error::{GravitonError, Result};
use crate::hydrometer::Hydrometer;
use crate::id::EntityId;
use crate::store::{DocumentStore, Filter};

/// Listing options for hydrometers.
#[derive(Debug, Clone, Default)]
pub struct HydrometerQuery {
    pub name: Option<String>,
    pub include_archived: bool,
}

pub struct HydrometerRegistry<'a, S> {
    store: &'a S,
}

impl<'a, S: DocumentStore> HydrometerRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Register a new, unassigned hydrometer.
    pub fn create(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Hydrometer> {
        let _writer = self.store.lock_writes()?;
        let hydrometer = Hydrometer::new(name.into().trim(), description);
        self.save_locked(&hydrometer)?;
        Ok(hydrometer)
    }

    pub fn get(&self, id: &EntityId) -> Result<Option<Hydrometer>> {
        get(self.store, id)
    }

    /// Lookup by identity; `NotFound` when absent.
    pub fn require(&self, id: &EntityId) -> Result<Hydrometer> {
        self.get(id)?
            .ok_or_else(|| GravitonError::not_found("hydrometer", id.to_string()))
    }

    pub fn by_name(&self, name: &str) -> Result<Hydrometer> {
        single(self.store, &Filter::new().eq("name", name))
    }

    pub fn find(&self, filter: &Filter) -> Result<Vec<Hydrometer>> {
        find(self.store, filter)
    }

    pub fn query(&self, query: &HydrometerQuery) -> Result<Vec<Hydrometer>> {
        let mut filter = Filter::new();
        if let Some(name) = query.name.as_deref() {
            filter = filter.eq("name", name);
        }
        if !query.include_archived {
            filter = filter.eq("archived", false);
        }
        self.find(&filter)
    }

    /// Unassigned, unarchived hydrometers.
    pub fn available(&self) -> Result<Vec<Hydrometer>> {
        self.find(
            &Filter::new()
                .eq("batch", Value::Null)
                .eq("archived", false),
        )
    }

    /// Validate and persist direct field edits (name, description).
    ///
    /// `current_batch` and `archived` belong to assignment and archival; a
    /// copy whose values differ from the stored ones is stale or is trying
    /// to bypass those paths, and is refused with `Conflict`.
    pub fn save(&self, hydrometer: &Hydrometer) -> Result<()> {
        let _writer = self.store.lock_writes()?;
        let stored = self.require(&hydrometer.id)?;
        if stored.current_batch != hydrometer.current_batch || stored.archived != hydrometer.archived
        {
            return Err(GravitonError::conflict(format!(
                "hydrometer {} changed since it was read; assignment and archival have their own operations",
                stored.name
            )));
        }
        self.save_locked(hydrometer)
    }

    /// Archive a hydrometer. Refused while an active batch holds it.
    pub fn archive(&self, id: &EntityId) -> Result<Hydrometer> {
        let _writer = self.store.lock_writes()?;
        let mut hydrometer = self.require(id)?;
        if let Some(batch_id) = hydrometer.current_batch {
            let holder: Option<Batch> = get(self.store, &batch_id)?;
            if holder.is_some_and(|batch| batch.holds_hydrometer(&hydrometer.id)) {
                return Err(GravitonError::conflict(format!(
                    "hydrometer {} is assigned to active batch {batch_id}",
                    hydrometer.name
                )));
            }
            hydrometer.release();
        }
        hydrometer.archived = true;
        self.save_locked(&hydrometer)?;
        Ok(hydrometer)
    }

    pub(crate) fn save_locked(&self, hydrometer: &Hydrometer) -> Result<()> {
        self.validate(hydrometer)?;
        persist(self.store, hydrometer)
    }

    /// Field, uniqueness and back-reference checks run before every save.
    pub fn validate(&self, hydrometer: &Hydrometer) -> Result<()> {
        if hydrometer.name.trim().is_empty() {
            return Err(GravitonError::validation("name", "must not be empty"));
        }

        let same_name = self.find(&Filter::new().eq("name", hydrometer.name.as_str()))?;
        if same_name.iter().any(|other| other.id != hydrometer.id) {
            return Err(GravitonError::conflict(format!(
                "hydrometer name already in use: {}",
                hydrometer.name
            )));
        }

        if let Some(batch_id) = hydrometer.current_batch {
            let batch: Batch = get(self.store, &batch_id)?
                .ok_or_else(|| GravitonError::not_found("batch", batch_id.to_string()))?;
            if batch.hydrometer != Some(hydrometer.id) {
                return Err(GravitonError::conflict(format!(
                    "batch {batch_id} does not reference hydrometer {}",
                    hydrometer.name
                )));
            }
        }
        Ok(())
    }
}
