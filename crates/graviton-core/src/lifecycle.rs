//! Batch lifecycle: `Active → Finished → Archived`.

use crate::assignment::AssignmentEngine;
use crate::batch::{Batch, BatchState};
use crate::clock::Clock;
use crate::error::{GravitonError, Result};
use crate::registry::{BatchRegistry, HydrometerRegistry};
use crate::store::DocumentStore;

impl BatchState {
    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// Finishing or archiving twice is tolerated; nothing leaves `Archived`
    /// except a repeated archive.
    pub fn can_transition_to(self, next: BatchState) -> bool {
        matches!(
            (self, next),
            (BatchState::Active, BatchState::Finished)
                | (BatchState::Active, BatchState::Archived)
                | (BatchState::Finished, BatchState::Finished)
                | (BatchState::Finished, BatchState::Archived)
                | (BatchState::Archived, BatchState::Archived)
        )
    }
}

pub struct Lifecycle<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: DocumentStore> Lifecycle<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    fn batches(&self) -> BatchRegistry<'a, S> {
        BatchRegistry::new(self.store, self.clock)
    }

    /// End active monitoring and release the hydrometer.
    ///
    /// The batch keeps its `hydrometer` reference as provenance. Fails with
    /// `NotFound` when the referenced hydrometer no longer exists and with
    /// `Conflict` when the batch is already archived. The transition is
    /// applied to the stored batch; `batch` is replaced with the result.
    pub fn finish(&self, batch: &mut Batch) -> Result<()> {
        let _writer = self.store.lock_writes()?;
        self.finish_locked(batch)
    }

    /// Archive a batch, finishing it first if it is still active.
    ///
    /// Archiving an archived batch changes nothing.
    pub fn archive(&self, batch: &mut Batch) -> Result<()> {
        let _writer = self.store.lock_writes()?;
        let batches = self.batches();
        let mut updated = batches.require(&batch.id)?;
        ensure_transition(&updated, BatchState::Archived)?;
        match updated.state() {
            BatchState::Archived => {
                *batch = updated;
                return Ok(());
            }
            BatchState::Active => {
                self.finish_locked(batch)?;
                updated = batch.clone();
            }
            BatchState::Finished => {}
        }

        updated.archived = true;
        updated.last_update = self.clock.now();
        batches.save_locked(&updated)?;
        *batch = updated;
        Ok(())
    }

    fn finish_locked(&self, batch: &mut Batch) -> Result<()> {
        let batches = self.batches();
        let mut updated = batches.require(&batch.id)?;
        ensure_transition(&updated, BatchState::Finished)?;

        if let Some(hydrometer_id) = updated.hydrometer {
            if HydrometerRegistry::new(self.store).get(&hydrometer_id)?.is_none() {
                return Err(GravitonError::not_found("hydrometer", hydrometer_id.to_string()));
            }
            AssignmentEngine::new(self.store, self.clock).release_locked(&hydrometer_id, &updated.id)?;
        }

        updated.active = false;
        updated.last_update = self.clock.now();
        batches.save_locked(&updated)?;
        *batch = updated;
        Ok(())
    }
}

fn ensure_transition(batch: &Batch, next: BatchState) -> Result<()> {
    let current = batch.state();
    if current.can_transition_to(next) {
        return Ok(());
    }
    Err(GravitonError::conflict(format!(
        "batch {} is {} and cannot become {}",
        batch.unique_id,
        current.as_str(),
        next.as_str()
    )))
}
