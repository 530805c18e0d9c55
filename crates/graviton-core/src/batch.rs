//! Batch and gravity-reading types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// One timestamped sample posted by a hydrometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityReading {
    pub id: EntityId,
    pub date: DateTime<Utc>,
    pub gravity: f64,
    pub temperature: f64,
    #[serde(rename = "battery")]
    pub battery_voltage: f64,
    #[serde(default)]
    pub hidden: bool,
}

/// Input for recording a reading. Identity is issued when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub date: DateTime<Utc>,
    pub gravity: f64,
    pub temperature: f64,
    #[serde(rename = "battery")]
    pub battery_voltage: f64,
}

impl NewReading {
    pub fn new(date: DateTime<Utc>, gravity: f64, temperature: f64, battery_voltage: f64) -> Self {
        Self {
            id: None,
            date,
            gravity,
            temperature,
            battery_voltage,
        }
    }

    /// Materialize the stored reading; new readings are never hidden.
    pub fn into_reading(self) -> GravityReading {
        GravityReading {
            id: self.id.unwrap_or_default(),
            date: self.date,
            gravity: self.gravity,
            temperature: self.temperature,
            battery_voltage: self.battery_voltage,
            hidden: false,
        }
    }
}

/// A single brewing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: EntityId,
    pub recipe: String,
    #[serde(rename = "stringId")]
    pub unique_id: String,
    /// Hydrometer that measures (or last measured) this batch. Kept after
    /// release as provenance.
    #[serde(default)]
    pub hydrometer: Option<EntityId>,
    #[serde(default)]
    pub readings: Vec<GravityReading>,
    pub start_date: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub archived: bool,
}

/// Lifecycle position derived from the `active` / `archived` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Active,
    Finished,
    Archived,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Active => "active",
            BatchState::Finished => "finished",
            BatchState::Archived => "archived",
        }
    }
}

impl Batch {
    /// Build an active batch with no hydrometer and no readings.
    pub fn new(
        recipe: impl Into<String>,
        unique_id: impl Into<String>,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            recipe: recipe.into(),
            unique_id: unique_id.into(),
            hydrometer: None,
            readings: Vec::new(),
            start_date,
            last_update: start_date,
            active: true,
            archived: false,
        }
    }

    pub fn state(&self) -> BatchState {
        if self.archived {
            BatchState::Archived
        } else if self.active {
            BatchState::Active
        } else {
            BatchState::Finished
        }
    }

    pub fn has_hydrometer(&self) -> bool {
        self.hydrometer.is_some()
    }

    /// Whether this batch currently claims `hydrometer_id` for exclusive use.
    pub fn holds_hydrometer(&self, hydrometer_id: &EntityId) -> bool {
        self.active && self.hydrometer.as_ref() == Some(hydrometer_id)
    }

    /// Insert a reading at its ordered position.
    ///
    /// The reading lands after every existing reading whose timestamp is
    /// equal or earlier, so ties keep insertion order. Returns the index.
    pub fn insert_reading(&mut self, reading: GravityReading) -> usize {
        let position = self.readings.partition_point(|r| r.date <= reading.date);
        self.readings.insert(position, reading);
        position
    }

    pub fn reading(&self, reading_id: &EntityId) -> Option<&GravityReading> {
        self.readings.iter().find(|r| r.id == *reading_id)
    }

    /// Mark a reading hidden in place. Returns `false` when no reading has
    /// that identity.
    pub fn hide_reading(&mut self, reading_id: &EntityId) -> bool {
        match self.readings.iter_mut().find(|r| r.id == *reading_id) {
            Some(reading) => {
                reading.hidden = true;
                true
            }
            None => false,
        }
    }

    /// Readings that participate in derived metrics.
    pub fn visible_readings(&self) -> impl Iterator<Item = &GravityReading> {
        self.readings.iter().filter(|r| !r.hidden)
    }

    pub fn readings_are_ordered(&self) -> bool {
        self.readings.windows(2).all(|w| w[0].date <= w[1].date)
    }
}
