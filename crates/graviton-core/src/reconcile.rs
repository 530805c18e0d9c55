//! Reference reconciliation.
//!
//! Assignment writes two documents without a transaction. A crash between
//! them (or an external edit) can leave a hydrometer pointing at a batch
//! that does not point back, or an active batch whose hydrometer lost its
//! back-reference. `reconcile` finds those states and, unless asked for a
//! dry run, repairs them under the writer lock.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::batch::Batch;
use crate::error::Result;
use crate::hydrometer::Hydrometer;
use crate::id::EntityId;
use crate::registry::{self, persist};
use crate::store::{DocumentStore, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Hydrometer points at a batch that does not exist.
    MissingBatch,
    /// Hydrometer points at a batch that is no longer active.
    InactiveBatch,
    /// Hydrometer points at a batch that references another hydrometer.
    ForeignBatch,
    /// Active batch whose hydrometer does not point back at it.
    MissingBackReference,
    /// Active batch referencing a hydrometer that does not exist.
    MissingHydrometer,
    /// Several active batches hold the same hydrometer.
    SharedHydrometer,
}

impl FindingKind {
    /// Whether `reconcile` can fix this kind of finding on its own.
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            FindingKind::MissingBatch
                | FindingKind::InactiveBatch
                | FindingKind::ForeignBatch
                | FindingKind::MissingBackReference
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub kind: FindingKind,
    pub hydrometer: EntityId,
    pub batch: Option<EntityId>,
    pub repaired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub findings: Vec<Finding>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn repaired(&self) -> usize {
        self.findings.iter().filter(|f| f.repaired).count()
    }

    /// Findings that need a human decision.
    pub fn unresolved(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.repaired)
    }
}

/// Scan both collections for broken references; repair unless `dry_run`.
pub fn reconcile<S: DocumentStore>(store: &S, dry_run: bool) -> Result<ReconcileReport> {
    let _writer = store.lock_writes()?;
    let mut report = ReconcileReport {
        dry_run,
        findings: Vec::new(),
    };

    let batches: BTreeMap<EntityId, Batch> = registry::find::<Batch, S>(store, &Filter::new())?
        .into_iter()
        .map(|batch| (batch.id, batch))
        .collect();
    let mut hydrometers: BTreeMap<EntityId, Hydrometer> =
        registry::find::<Hydrometer, S>(store, &Filter::new())?
            .into_iter()
            .map(|hydrometer| (hydrometer.id, hydrometer))
            .collect();

    // Stale back-references: reset to unassigned.
    for hydrometer in hydrometers.values_mut() {
        let Some(batch_id) = hydrometer.current_batch else {
            continue;
        };
        let kind = match batches.get(&batch_id) {
            None => FindingKind::MissingBatch,
            Some(batch) if batch.hydrometer != Some(hydrometer.id) => FindingKind::ForeignBatch,
            Some(batch) if !batch.active => FindingKind::InactiveBatch,
            Some(_) => continue,
        };
        let repair = !dry_run && kind.is_repairable();
        if repair {
            hydrometer.release();
            persist(store, &*hydrometer)?;
        }
        report.findings.push(Finding {
            kind,
            hydrometer: hydrometer.id,
            batch: Some(batch_id),
            repaired: repair,
        });
    }

    // Active holders, grouped by hydrometer.
    let mut holders: BTreeMap<EntityId, Vec<&Batch>> = BTreeMap::new();
    for batch in batches.values().filter(|b| b.active) {
        if let Some(hydrometer_id) = batch.hydrometer {
            holders.entry(hydrometer_id).or_default().push(batch);
        }
    }

    for (hydrometer_id, holding) in holders {
        if holding.len() > 1 {
            for batch in holding {
                report.findings.push(Finding {
                    kind: FindingKind::SharedHydrometer,
                    hydrometer: hydrometer_id,
                    batch: Some(batch.id),
                    repaired: false,
                });
            }
            continue;
        }
        let batch = holding[0];
        let Some(hydrometer) = hydrometers.get_mut(&hydrometer_id) else {
            report.findings.push(Finding {
                kind: FindingKind::MissingHydrometer,
                hydrometer: hydrometer_id,
                batch: Some(batch.id),
                repaired: false,
            });
            continue;
        };
        if hydrometer.is_assigned_to(&batch.id) {
            continue;
        }
        // After the first pass a dangling pointer has been cleared, so a
        // hydrometer still pointing elsewhere only happens in a dry run.
        let kind = FindingKind::MissingBackReference;
        let repair = !dry_run && kind.is_repairable();
        if repair {
            hydrometer.current_batch = Some(batch.id);
            persist(store, &*hydrometer)?;
        }
        report.findings.push(Finding {
            kind,
            hydrometer: hydrometer_id,
            batch: Some(batch.id),
            repaired: repair,
        });
    }

    Ok(report)
}
