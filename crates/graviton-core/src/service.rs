//! `Graviton`: one store handle and one clock, wired into every component.
//!
//! Single-step operations live on the component types reachable from here;
//! the facade adds the composite operations that must run under one writer
//! lock (create-and-assign, device reading ingestion) and view assembly.

use std::sync::Arc;

use crate::assignment::AssignmentEngine;
use crate::batch::{Batch, GravityReading, NewReading};
use crate::clock::{Clock, SystemClock};
use crate::error::{GravitonError, Result};
use crate::id::EntityId;
use crate::lifecycle::Lifecycle;
use crate::metrics::{BatchView, ViewDetail};
use crate::reconcile::{self, ReconcileReport};
use crate::registry::{BatchQuery, BatchRegistry, HydrometerRegistry, NewBatch};
use crate::store::DocumentStore;

pub struct Graviton<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> Graviton<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn hydrometers(&self) -> HydrometerRegistry<'_, S> {
        HydrometerRegistry::new(&self.store)
    }

    pub fn batches(&self) -> BatchRegistry<'_, S> {
        BatchRegistry::new(&self.store, self.clock.as_ref())
    }

    pub fn assignments(&self) -> AssignmentEngine<'_, S> {
        AssignmentEngine::new(&self.store, self.clock.as_ref())
    }

    pub fn lifecycle(&self) -> Lifecycle<'_, S> {
        Lifecycle::new(&self.store, self.clock.as_ref())
    }

    /// Create an active batch and, when `hydrometer_id` resolves, attach it.
    ///
    /// Exclusivity is checked before the batch is written, so a `Conflict`
    /// leaves no half-created batch behind.
    pub fn start_batch(&self, new: NewBatch, hydrometer_id: Option<&EntityId>) -> Result<Batch> {
        let _writer = self.store.lock_writes()?;
        let hydrometers = self.hydrometers();
        let batches = self.batches();

        let hydrometer = match hydrometer_id {
            Some(id) => hydrometers.get(id)?,
            None => None,
        };
        if let Some(hydrometer) = &hydrometer {
            if hydrometer.archived {
                return Err(GravitonError::validation(
                    "hydrometer",
                    format!("hydrometer {} is archived", hydrometer.name),
                ));
            }
            if let Some(holder) = batches.holders_of(&hydrometer.id)?.first() {
                return Err(GravitonError::conflict(format!(
                    "hydrometer {} already assigned to a different active batch ({})",
                    hydrometer.name, holder.unique_id
                )));
            }
        }

        let mut batch = batches.create_locked(new)?;
        if let Some(mut hydrometer) = hydrometer {
            self.assignments()
                .assign_locked(&mut batch, Some(&mut hydrometer))?;
        }
        Ok(batch)
    }

    /// Device ingestion path: record a reading on whatever batch the named
    /// hydrometer is attached to.
    pub fn record_reading_for(
        &self,
        hydrometer_name: &str,
        reading: NewReading,
    ) -> Result<(Batch, GravityReading)> {
        let _writer = self.store.lock_writes()?;
        let hydrometer = self.hydrometers().by_name(hydrometer_name)?;
        let Some(batch_id) = hydrometer.current_batch else {
            return Err(GravitonError::conflict(format!(
                "hydrometer {hydrometer_name} is not attached to a batch"
            )));
        };
        let batches = self.batches();
        let mut batch = batches.require(&batch_id)?;
        if !batch.holds_hydrometer(&hydrometer.id) {
            return Err(GravitonError::conflict(format!(
                "hydrometer {hydrometer_name} is not attached to an active batch"
            )));
        }
        let recorded = batches.add_reading_locked(&mut batch, reading)?;
        Ok((batch, recorded))
    }

    pub fn batch_view(&self, batch: &Batch, detail: ViewDetail) -> Result<BatchView> {
        let hydrometer = match batch.hydrometer {
            Some(id) => self.hydrometers().get(&id)?,
            None => None,
        };
        Ok(BatchView::assemble(batch, hydrometer.as_ref(), detail))
    }

    pub fn batch_views(&self, query: &BatchQuery, detail: ViewDetail) -> Result<Vec<BatchView>> {
        self.batches()
            .query(query)?
            .iter()
            .map(|batch| self.batch_view(batch, detail))
            .collect()
    }

    pub fn reconcile(&self, dry_run: bool) -> Result<ReconcileReport> {
        reconcile::reconcile(&self.store, dry_run)
    }
}
