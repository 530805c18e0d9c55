//! Demo fixtures: two hydrometers, two batches, four readings.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::batch::NewReading;
use crate::error::{GravitonError, Result};
use crate::hydrometer::Hydrometer;
use crate::registry::NewBatch;
use crate::service::Graviton;
use crate::store::DocumentStore;

pub const BLUE_HYDROMETER: &str = "Blue Hydrometer";
pub const GREEN_HYDROMETER: &str = "Green Hydrometer";
pub const FLUE_SEASON: &str = "20171101-flueseason";
pub const HOP_FORWARD: &str = "20171101-hopforward";

/// (minutes after start, gravity, temperature, battery)
const FLUE_SEASON_READINGS: [(i64, f64, f64, f64); 4] = [
    (0, 1.077, 68.8, 3.7),
    (30, 1.075, 68.1, 3.69),
    (60, 1.074, 69.5, 3.68),
    (90, 1.071, 71.1, 3.67),
];

/// What `ensure_demo_data` had to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoReport {
    pub hydrometers_created: Vec<String>,
    pub batches_created: Vec<String>,
    pub readings_created: usize,
}

impl DemoReport {
    pub fn is_noop(&self) -> bool {
        self.hydrometers_created.is_empty() && self.batches_created.is_empty()
    }
}

/// Create whatever part of the demo data set is missing. Entries that
/// already exist are left untouched.
pub fn ensure_demo_data<S: DocumentStore>(graviton: &Graviton<S>) -> Result<DemoReport> {
    let mut report = DemoReport::default();

    let _blue = ensure_hydrometer(
        graviton,
        BLUE_HYDROMETER,
        "A fake hydrometer with blue plastic.",
        &mut report,
    )?;
    let green = ensure_hydrometer(
        graviton,
        GREEN_HYDROMETER,
        "A fake hydrometer with green plastic.",
        &mut report,
    )?;

    if absent(graviton.batches().by_unique_id(FLUE_SEASON))? {
        let mut flue = graviton.start_batch(
            NewBatch::new("Flue Season", FLUE_SEASON),
            green.is_available().then_some(&green.id),
        )?;
        report.batches_created.push(FLUE_SEASON.to_string());

        let start = flue.start_date;
        for (minutes, gravity, temperature, battery) in FLUE_SEASON_READINGS {
            graviton.batches().add_reading(
                &mut flue,
                NewReading::new(start + Duration::minutes(minutes), gravity, temperature, battery),
            )?;
            report.readings_created += 1;
        }
    }

    if absent(graviton.batches().by_unique_id(HOP_FORWARD))? {
        graviton.start_batch(NewBatch::new("Hop Forward", HOP_FORWARD), None)?;
        report.batches_created.push(HOP_FORWARD.to_string());
    }

    Ok(report)
}

fn ensure_hydrometer<S: DocumentStore>(
    graviton: &Graviton<S>,
    name: &str,
    description: &str,
    report: &mut DemoReport,
) -> Result<Hydrometer> {
    match graviton.hydrometers().by_name(name) {
        Ok(existing) => Ok(existing),
        Err(GravitonError::NotFound { .. }) => {
            let created = graviton.hydrometers().create(name, description)?;
            report.hydrometers_created.push(name.to_string());
            Ok(created)
        }
        Err(err) => Err(err),
    }
}

fn absent<T>(lookup: Result<T>) -> Result<bool> {
    match lookup {
        Ok(_) => Ok(false),
        Err(GravitonError::NotFound { .. }) => Ok(true),
        Err(err) => Err(err),
    }
}
