//! Batch registry: CRUD, ordered reading mutation, and the exclusivity
//! guard that runs before every batch write.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{find, get, persist, single};
use crate::batch::{Batch, GravityReading, NewReading};
use crate::clock::Clock;
use crate::error::{GravitonError, Result};
use crate::id::EntityId;
use crate::store::{DocumentStore, Filter};

/// Input for creating a batch. New batches are always active and unarchived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    pub recipe: String,
    #[serde(rename = "stringId")]
    pub unique_id: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

impl NewBatch {
    pub fn new(recipe: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            recipe: recipe.into(),
            unique_id: unique_id.into(),
            start_date: None,
        }
    }
}

/// Listing options for batches.
#[derive(Debug, Clone, Default)]
pub struct BatchQuery {
    pub recipe: Option<String>,
    pub active: Option<bool>,
    pub archived: Option<bool>,
}

pub struct BatchRegistry<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: DocumentStore> BatchRegistry<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn create(&self, new: NewBatch) -> Result<Batch> {
        let _writer = self.store.lock_writes()?;
        self.create_locked(new)
    }

    pub(crate) fn create_locked(&self, new: NewBatch) -> Result<Batch> {
        let now = self.clock.now();
        let mut batch = Batch::new(
            new.recipe.trim(),
            new.unique_id.trim(),
            new.start_date.unwrap_or(now),
        );
        batch.last_update = now;
        self.save_locked(&batch)?;
        Ok(batch)
    }

    pub fn get(&self, id: &EntityId) -> Result<Option<Batch>> {
        get(self.store, id)
    }

    pub fn require(&self, id: &EntityId) -> Result<Batch> {
        self.get(id)?
            .ok_or_else(|| GravitonError::not_found("batch", id.to_string()))
    }

    pub fn by_unique_id(&self, unique_id: &str) -> Result<Batch> {
        single(self.store, &Filter::new().eq("stringId", unique_id))
    }

    pub fn find(&self, filter: &Filter) -> Result<Vec<Batch>> {
        find(self.store, filter)
    }

    pub fn query(&self, query: &BatchQuery) -> Result<Vec<Batch>> {
        let mut filter = Filter::new();
        if let Some(recipe) = query.recipe.as_deref() {
            filter = filter.eq("recipe", recipe);
        }
        if let Some(active) = query.active {
            filter = filter.eq("active", active);
        }
        if let Some(archived) = query.archived {
            filter = filter.eq("archived", archived);
        }
        self.find(&filter)
    }

    /// Active batches holding `hydrometer_id`.
    pub fn holders_of(&self, hydrometer_id: &EntityId) -> Result<Vec<Batch>> {
        self.find(
            &Filter::new()
                .eq("active", true)
                .eq("hydrometer", hydrometer_id.to_string()),
        )
    }

    /// Validate and persist direct field edits.
    ///
    /// `last_update` doubles as a staleness token: the save is refused with
    /// `Conflict` when the stored batch changed after `batch` was read. On
    /// success `last_update` is stamped and `batch` reflects what was written.
    pub fn save(&self, batch: &mut Batch) -> Result<()> {
        let _writer = self.store.lock_writes()?;
        let stored = self.require(&batch.id)?;
        if stored.last_update != batch.last_update {
            return Err(GravitonError::conflict(format!(
                "batch {} changed since it was read (stored {}, read {})",
                batch.unique_id,
                stored.last_update.to_rfc3339(),
                batch.last_update.to_rfc3339()
            )));
        }
        let mut updated = batch.clone();
        updated.last_update = self.clock.now();
        self.save_locked(&updated)?;
        *batch = updated;
        Ok(())
    }

    pub(crate) fn save_locked(&self, batch: &Batch) -> Result<()> {
        self.validate(batch)?;
        persist(self.store, batch)
    }

    /// Field, uniqueness, ordering and exclusivity checks run before every save.
    pub fn validate(&self, batch: &Batch) -> Result<()> {
        if batch.recipe.trim().is_empty() {
            return Err(GravitonError::validation("recipe", "must not be empty"));
        }
        if !unique_id_re().is_match(&batch.unique_id) {
            return Err(GravitonError::validation(
                "stringId",
                format!(
                    "`{}` must start with a letter or digit and contain only letters, digits, `.`, `_` or `-`",
                    batch.unique_id
                ),
            ));
        }
        if batch.archived && batch.active {
            return Err(GravitonError::validation(
                "archived",
                "an archived batch cannot be active",
            ));
        }
        if !batch.readings_are_ordered() {
            return Err(GravitonError::validation(
                "readings",
                "readings must be sorted by date",
            ));
        }
        for reading in &batch.readings {
            validate_measurements(
                reading.gravity,
                reading.temperature,
                reading.battery_voltage,
            )?;
        }

        let same_unique_id = self.find(&Filter::new().eq("stringId", batch.unique_id.as_str()))?;
        if same_unique_id.iter().any(|other| other.id != batch.id) {
            return Err(GravitonError::conflict(format!(
                "batch string id already in use: {}",
                batch.unique_id
            )));
        }

        self.validate_exclusivity(batch)
    }

    /// Fail with `Conflict` when another active batch holds this batch's
    /// hydrometer.
    pub fn validate_exclusivity(&self, batch: &Batch) -> Result<()> {
        if !batch.active {
            return Ok(());
        }
        let Some(hydrometer_id) = batch.hydrometer else {
            return Ok(());
        };
        if let Some(other) = self
            .holders_of(&hydrometer_id)?
            .into_iter()
            .find(|other| other.id != batch.id)
        {
            return Err(GravitonError::conflict(format!(
                "hydrometer {hydrometer_id} already assigned to a different active batch ({})",
                other.unique_id
            )));
        }
        Ok(())
    }

    /// Record a reading at its ordered position and persist the batch.
    ///
    /// The reading is applied to the stored batch, not to the caller's copy;
    /// `batch` is replaced with the written state once the write succeeds.
    pub fn add_reading(&self, batch: &mut Batch, reading: NewReading) -> Result<GravityReading> {
        let _writer = self.store.lock_writes()?;
        self.add_reading_locked(batch, reading)
    }

    pub(crate) fn add_reading_locked(
        &self,
        batch: &mut Batch,
        reading: NewReading,
    ) -> Result<GravityReading> {
        validate_measurements(reading.gravity, reading.temperature, reading.battery_voltage)?;
        let mut updated = self.require(&batch.id)?;
        let reading = reading.into_reading();
        if updated.reading(&reading.id).is_some() {
            return Err(GravitonError::conflict(format!(
                "batch {} already has a reading {}",
                updated.unique_id, reading.id
            )));
        }

        updated.insert_reading(reading.clone());
        updated.last_update = self.clock.now();
        self.save_locked(&updated)?;

        *batch = updated;
        Ok(reading)
    }

    /// Soft-delete a reading: it stays in place, flagged hidden.
    pub fn hide_reading(&self, batch: &mut Batch, reading_id: &EntityId) -> Result<()> {
        let _writer = self.store.lock_writes()?;
        let mut updated = self.require(&batch.id)?;
        if !updated.hide_reading(reading_id) {
            return Err(GravitonError::not_found("reading", reading_id.to_string()));
        }
        updated.last_update = self.clock.now();
        self.save_locked(&updated)?;
        *batch = updated;
        Ok(())
    }
}

fn unique_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("batch string id regex must compile")
    })
}

fn validate_measurements(gravity: f64, temperature: f64, battery: f64) -> Result<()> {
    if !gravity.is_finite() || gravity <= 0.0 {
        return Err(GravitonError::validation(
            "gravity",
            format!("{gravity} is not a positive specific gravity"),
        ));
    }
    if !temperature.is_finite() {
        return Err(GravitonError::validation(
            "temperature",
            "must be a finite number",
        ));
    }
    if !battery.is_finite() {
        return Err(GravitonError::validation("battery", "must be a finite number"));
    }
    Ok(())
}
