//! Derived batch metrics and the response views built on them.
//!
//! Metrics are pure functions of a batch's visible readings: `og` is the
//! first visible gravity, `cg` the latest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::{Batch, BatchState, GravityReading};
use crate::hydrometer::Hydrometer;
use crate::id::EntityId;

/// Apparent attenuation. Zero when `og` carries no sugar (`og <= 1.0`).
pub fn attenuation(original_gravity: f64, current_gravity: f64) -> f64 {
    let sugar = original_gravity - 1.0;
    if sugar <= 0.0 {
        return 0.0;
    }
    1.0 - (sugar - (original_gravity - current_gravity)) / sugar
}

/// Alcohol by volume (as a fraction of 100).
pub fn abv(original_gravity: f64, current_gravity: f64) -> f64 {
    (76.08 * (original_gravity - current_gravity) / (1.775 - original_gravity))
        * (current_gravity / 0.794)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetrics {
    pub latest_reading: Option<GravityReading>,
    pub original_gravity: Option<f64>,
    pub current_gravity: Option<f64>,
    pub attenuation: f64,
    pub abv: f64,
}

impl BatchMetrics {
    pub fn for_batch(batch: &Batch) -> Self {
        Self::from_readings(batch.visible_readings())
    }

    pub fn from_readings<'a>(readings: impl IntoIterator<Item = &'a GravityReading>) -> Self {
        let mut readings = readings.into_iter();
        let Some(first) = readings.next() else {
            return Self {
                latest_reading: None,
                original_gravity: None,
                current_gravity: None,
                attenuation: 0.0,
                abv: 0.0,
            };
        };
        let latest = readings.last().unwrap_or(first);
        let (og, cg) = (first.gravity, latest.gravity);
        Self {
            latest_reading: Some(latest.clone()),
            original_gravity: Some(og),
            current_gravity: Some(cg),
            attenuation: attenuation(og, cg),
            abv: abv(og, cg),
        }
    }
}

/// Which batch representation to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewDetail {
    /// Readings omitted; used for listings.
    #[default]
    Lightweight,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrometerSummary {
    pub id: EntityId,
    pub name: String,
    pub archived: bool,
}

impl From<&Hydrometer> for HydrometerSummary {
    fn from(hydrometer: &Hydrometer) -> Self {
        Self {
            id: hydrometer.id,
            name: hydrometer.name.clone(),
            archived: hydrometer.archived,
        }
    }
}

/// A batch as presented to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub id: EntityId,
    pub recipe: String,
    #[serde(rename = "stringId")]
    pub unique_id: String,
    pub state: BatchState,
    pub active: bool,
    pub archived: bool,
    pub start_date: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub hydrometer: Option<HydrometerSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readings: Option<Vec<GravityReading>>,
    pub reading_count: usize,
    #[serde(flatten)]
    pub metrics: BatchMetrics,
}

impl BatchView {
    /// Build a view. `hydrometer` is the entity `batch.hydrometer` resolves
    /// to, if it still exists.
    pub fn assemble(batch: &Batch, hydrometer: Option<&Hydrometer>, detail: ViewDetail) -> Self {
        let readings = match detail {
            ViewDetail::Full => Some(batch.readings.clone()),
            ViewDetail::Lightweight => None,
        };
        Self {
            id: batch.id,
            recipe: batch.recipe.clone(),
            unique_id: batch.unique_id.clone(),
            state: batch.state(),
            active: batch.active,
            archived: batch.archived,
            start_date: batch.start_date,
            last_update: batch.last_update,
            hydrometer: hydrometer.map(HydrometerSummary::from),
            readings,
            reading_count: batch.visible_readings().count(),
            metrics: BatchMetrics::for_batch(batch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::NewReading;
    use chrono::{Duration, TimeZone};

    fn sample_batch() -> Batch {
        let t0 = Utc
            .with_ymd_and_hms(2017, 11, 1, 12, 0, 0)
            .single()
            .expect("fixed time");
        let mut batch = Batch::new("Flue Season", "20171101-flueseason", t0);
        for (minutes, gravity) in [(0, 1.077), (30, 1.075), (60, 1.074), (90, 1.071)] {
            batch.insert_reading(
                NewReading::new(t0 + Duration::minutes(minutes), gravity, 68.8, 3.7).into_reading(),
            );
        }
        batch
    }

    #[test]
    fn attenuation_matches_formula() {
        let og = 1.077;
        let cg = 1.071;
        let expected = 1.0 - ((og - 1.0) - (og - cg)) / (og - 1.0);
        assert!((attenuation(og, cg) - expected).abs() < 1e-12);
        assert!((attenuation(og, cg) - 0.0779).abs() < 1e-3);
    }

    #[test]
    fn attenuation_is_zero_without_sugar() {
        assert_eq!(attenuation(1.0, 0.998), 0.0);
        assert_eq!(attenuation(0.995, 0.990), 0.0);
    }

    #[test]
    fn abv_matches_formula() {
        let expected = (76.08 * (1.077 - 1.071) / (1.775 - 1.077)) * (1.071 / 0.794);
        assert!((abv(1.077, 1.071) - expected).abs() < 1e-12);
        assert_eq!(abv(1.05, 1.05), 0.0);
    }

    #[test]
    fn empty_batch_has_zero_metrics() {
        let batch = Batch::new("Hop Forward", "20171101-hopforward", Utc::now());
        let metrics = BatchMetrics::for_batch(&batch);
        assert!(metrics.latest_reading.is_none());
        assert_eq!(metrics.attenuation, 0.0);
        assert_eq!(metrics.abv, 0.0);
    }

    #[test]
    fn single_reading_is_both_og_and_cg() {
        let mut batch = Batch::new("Hop Forward", "20171101-hopforward", Utc::now());
        batch.insert_reading(NewReading::new(Utc::now(), 1.060, 66.0, 3.7).into_reading());
        let metrics = BatchMetrics::for_batch(&batch);
        assert_eq!(metrics.original_gravity, Some(1.060));
        assert_eq!(metrics.current_gravity, Some(1.060));
        assert_eq!(metrics.attenuation, 0.0);
    }

    #[test]
    fn hidden_readings_are_ignored() {
        let mut batch = sample_batch();
        let last = batch.readings[3].id;
        assert!(batch.hide_reading(&last));

        let metrics = BatchMetrics::for_batch(&batch);
        let latest = metrics.latest_reading.expect("latest visible");
        assert_eq!(latest.gravity, 1.074);
        assert_eq!(metrics.current_gravity, Some(1.074));
    }

    #[test]
    fn lightweight_view_omits_readings() {
        let batch = sample_batch();
        let hydrometer = Hydrometer::new("Green Hydrometer", "");

        let light = BatchView::assemble(&batch, Some(&hydrometer), ViewDetail::Lightweight);
        assert!(light.readings.is_none());
        assert_eq!(light.reading_count, 4);
        assert_eq!(
            light.hydrometer.as_ref().map(|h| h.name.as_str()),
            Some("Green Hydrometer")
        );
        let json = serde_json::to_value(&light).expect("serialize");
        assert!(json.get("readings").is_none());
        assert_eq!(json["stringId"], "20171101-flueseason");
        assert!(json["attenuation"].as_f64().is_some());

        let full = BatchView::assemble(&batch, None, ViewDetail::Full);
        assert_eq!(full.readings.as_ref().map(Vec::len), Some(4));
        assert!(full.hydrometer.is_none());
    }
}
