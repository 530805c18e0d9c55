//! Assignment engine: keeps a hydrometer attached to at most one active
//! batch and maintains the batch ↔ hydrometer references.
//!
//! Write order for an assignment of batch `B` to hydrometer `H`:
//! 1. exclusivity check (no other active batch holds `H`),
//! 2. release the hydrometer `B` previously held, if any,
//! 3. write `B` (`hydrometer = H`),
//! 4. write `H` (`batch = B`).
//!
//! The whole sequence runs under the store's writer lock. There is no
//! multi-document transaction: a failure at step 4 leaves `B` pointing at
//! `H` without the back-reference; `reconcile` repairs that state.

use crate::batch::Batch;
use crate::clock::Clock;
use crate::error::{GravitonError, Result};
use crate::hydrometer::Hydrometer;
use crate::id::EntityId;
use crate::registry::{BatchRegistry, HydrometerRegistry};
use crate::store::DocumentStore;

pub struct AssignmentEngine<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: DocumentStore> AssignmentEngine<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    fn hydrometers(&self) -> HydrometerRegistry<'a, S> {
        HydrometerRegistry::new(self.store)
    }

    fn batches(&self) -> BatchRegistry<'a, S> {
        BatchRegistry::new(self.store, self.clock)
    }

    /// Attach `hydrometer` to `batch`.
    ///
    /// Fails with `Conflict` (leaving both entities untouched) when another
    /// active batch already holds the hydrometer.
    pub fn assign_hydrometer(&self, batch: &mut Batch, hydrometer: &mut Hydrometer) -> Result<()> {
        let _writer = self.store.lock_writes()?;
        self.assign_locked(batch, Some(hydrometer))
    }

    /// Detach whatever hydrometer `batch` holds, releasing it.
    pub fn unassign_hydrometer(&self, batch: &mut Batch) -> Result<()> {
        let _writer = self.store.lock_writes()?;
        self.assign_locked(batch, None)
    }

    /// Resolve `hydrometer_id` and assign it.
    ///
    /// An unknown id (or `None`) means "no hydrometer" rather than an error.
    /// Returns the hydrometer as persisted, if one was resolved.
    pub fn assign_hydrometer_by_id(
        &self,
        batch: &mut Batch,
        hydrometer_id: Option<&EntityId>,
    ) -> Result<Option<Hydrometer>> {
        let _writer = self.store.lock_writes()?;
        self.assign_by_id_locked(batch, hydrometer_id)
    }

    pub(crate) fn assign_by_id_locked(
        &self,
        batch: &mut Batch,
        hydrometer_id: Option<&EntityId>,
    ) -> Result<Option<Hydrometer>> {
        let mut resolved = match hydrometer_id {
            Some(id) => self.hydrometers().get(id)?,
            None => None,
        };
        self.assign_locked(batch, resolved.as_mut())?;
        Ok(resolved)
    }

    /// Both entities are reloaded from the store before anything is checked,
    /// so a caller holding an outdated copy cannot undo a newer finish,
    /// archive or assignment. On success the caller's values are replaced
    /// with what was written.
    pub(crate) fn assign_locked(
        &self,
        batch: &mut Batch,
        hydrometer: Option<&mut Hydrometer>,
    ) -> Result<()> {
        let hydrometers = self.hydrometers();
        let batches = self.batches();

        let mut updated = batches.require(&batch.id)?;
        let current = match hydrometer.as_deref() {
            Some(h) => Some(hydrometers.require(&h.id)?),
            None => None,
        };
        let target = current.as_ref().map(|h| h.id);

        if let Some(h) = &current {
            if !updated.active {
                return Err(GravitonError::conflict(format!(
                    "batch {} is {}; only active batches take a hydrometer",
                    updated.unique_id,
                    updated.state().as_str()
                )));
            }
            if h.archived {
                return Err(GravitonError::validation(
                    "hydrometer",
                    format!("hydrometer {} is archived", h.name),
                ));
            }
            if let Some(other) = batches
                .holders_of(&h.id)?
                .into_iter()
                .find(|other| other.id != batch.id)
            {
                return Err(GravitonError::conflict(format!(
                    "hydrometer {} already assigned to a different active batch ({})",
                    h.name, other.unique_id
                )));
            }
        }

        let previous = updated.hydrometer;
        updated.hydrometer = target;
        updated.last_update = self.clock.now();
        batches.validate(&updated)?;

        if let Some(previous) = previous
            && Some(previous) != target
        {
            self.release_locked(&previous, &updated.id)?;
        }

        batches.save_locked(&updated)?;
        *batch = updated;

        if let (Some(mut attached), Some(h)) = (current, hydrometer) {
            attached.current_batch = Some(batch.id);
            hydrometers.save_locked(&attached)?;
            *h = attached;
        }
        Ok(())
    }

    /// Reset `hydrometer_id`'s back-reference if it still points at `batch_id`.
    ///
    /// Returns whether a write happened. A hydrometer that has since moved on
    /// to another batch is left alone.
    pub(crate) fn release_locked(&self, hydrometer_id: &EntityId, batch_id: &EntityId) -> Result<bool> {
        let hydrometers = self.hydrometers();
        let Some(mut previous) = hydrometers.get(hydrometer_id)? else {
            return Ok(false);
        };
        if !previous.is_assigned_to(batch_id) {
            return Ok(false);
        }
        previous.release();
        hydrometers.save_locked(&previous)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ErrorKind;
    use crate::reconcile::{FindingKind, reconcile};
    use crate::registry::NewBatch;
    use crate::store::{Collection, Filter, MemoryStore, StoreError};
    use chrono::{TimeZone, Utc};
    use parking_lot::MutexGuard;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        store: MemoryStore,
        clock: FixedClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                clock: FixedClock::new(
                    Utc.with_ymd_and_hms(2017, 11, 1, 12, 0, 0)
                        .single()
                        .expect("fixed time"),
                ),
            }
        }

        fn engine(&self) -> AssignmentEngine<'_, MemoryStore> {
            AssignmentEngine::new(&self.store, &self.clock)
        }

        fn hydrometers(&self) -> HydrometerRegistry<'_, MemoryStore> {
            HydrometerRegistry::new(&self.store)
        }

        fn batches(&self) -> BatchRegistry<'_, MemoryStore> {
            BatchRegistry::new(&self.store, &self.clock)
        }

        fn hydrometer(&self, name: &str) -> Hydrometer {
            self.hydrometers().create(name, "").expect("create hydrometer")
        }

        fn batch(&self, recipe: &str, unique_id: &str) -> Batch {
            self.batches()
                .create(NewBatch::new(recipe, unique_id))
                .expect("create batch")
        }
    }

    #[test]
    fn assignment_sets_both_references() {
        let fx = Fixture::new();
        let mut green = fx.hydrometer("Green Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");

        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign");

        assert_eq!(flue.hydrometer, Some(green.id));
        assert_eq!(green.current_batch, Some(flue.id));
        let stored_batch = fx.batches().require(&flue.id).expect("stored batch");
        let stored_green = fx.hydrometers().require(&green.id).expect("stored hydrometer");
        assert_eq!(stored_batch.hydrometer, Some(green.id));
        assert_eq!(stored_green.current_batch, Some(flue.id));
    }

    #[test]
    fn second_active_batch_cannot_take_hydrometer() {
        let fx = Fixture::new();
        let mut green = fx.hydrometer("Green Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");
        let mut hop = fx.batch("Hop Forward", "20171101-hopforward");
        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign");

        let hop_before = hop.clone();
        let green_before = green.clone();
        let err = fx
            .engine()
            .assign_hydrometer(&mut hop, &mut green)
            .expect_err("stole another batch's hydrometer");
        assert!(matches!(err, GravitonError::Conflict(_)));
        assert_eq!(hop, hop_before);
        assert_eq!(green, green_before);
        assert_eq!(
            fx.batches().require(&hop.id).expect("stored").hydrometer,
            None
        );
    }

    #[test]
    fn reassignment_releases_previous_hydrometer() {
        let fx = Fixture::new();
        let mut blue = fx.hydrometer("Blue Hydrometer");
        let mut green = fx.hydrometer("Green Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");

        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign green");
        fx.engine()
            .assign_hydrometer(&mut flue, &mut blue)
            .expect("assign blue");

        let stored_green = fx.hydrometers().require(&green.id).expect("stored");
        assert!(stored_green.is_unassigned());
        assert_eq!(blue.current_batch, Some(flue.id));
        assert_eq!(flue.hydrometer, Some(blue.id));
    }

    #[test]
    fn reassigning_same_hydrometer_is_idempotent() {
        let fx = Fixture::new();
        let mut green = fx.hydrometer("Green Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");
        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign");
        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign again");
        assert_eq!(green.current_batch, Some(flue.id));
    }

    #[test]
    fn unknown_id_unassigns() {
        let fx = Fixture::new();
        let mut green = fx.hydrometer("Green Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");
        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign");

        let resolved = fx
            .engine()
            .assign_hydrometer_by_id(&mut flue, Some(&EntityId::new()))
            .expect("unknown id is the sentinel");
        assert!(resolved.is_none());
        assert!(!flue.has_hydrometer());
        assert!(
            fx.hydrometers()
                .require(&green.id)
                .expect("stored")
                .is_unassigned()
        );
    }

    #[test]
    fn assign_by_id_resolves_known_hydrometer() {
        let fx = Fixture::new();
        let blue = fx.hydrometer("Blue Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");

        let resolved = fx
            .engine()
            .assign_hydrometer_by_id(&mut flue, Some(&blue.id))
            .expect("assign by id")
            .expect("hydrometer resolved");
        assert_eq!(resolved.current_batch, Some(flue.id));
        assert_eq!(flue.hydrometer, Some(blue.id));
    }

    #[test]
    fn finished_batch_no_longer_blocks_hydrometer() {
        let fx = Fixture::new();
        let mut green = fx.hydrometer("Green Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");
        let mut hop = fx.batch("Hop Forward", "20171101-hopforward");
        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign");

        flue.active = false;
        fx.batches().save(&mut flue).expect("finish by hand");
        fx.engine()
            .assign_hydrometer(&mut hop, &mut green)
            .expect("hydrometer is free again");
        assert_eq!(green.current_batch, Some(hop.id));
    }

    #[test]
    fn archived_hydrometer_cannot_be_assigned() {
        let fx = Fixture::new();
        let green = fx.hydrometer("Green Hydrometer");
        let mut green = fx.hydrometers().archive(&green.id).expect("archive");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");
        let err = fx
            .engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect_err("archived");
        assert!(matches!(err, GravitonError::Validation { field: "hydrometer", .. }));
    }

    #[test]
    fn assignment_uses_stored_batch_state() {
        let fx = Fixture::new();
        let mut green = fx.hydrometer("Green Hydrometer");
        let mut flue = fx.batch("Flue Season", "20171101-flueseason");
        let mut outdated = flue.clone();
        fx.engine()
            .assign_hydrometer(&mut flue, &mut green)
            .expect("assign");
        crate::lifecycle::Lifecycle::new(&fx.store, &fx.clock)
            .finish(&mut flue)
            .expect("finish");

        let mut green = fx.hydrometers().require(&green.id).expect("stored");
        let err = fx
            .engine()
            .assign_hydrometer(&mut outdated, &mut green)
            .expect_err("copy still looks active");
        assert!(matches!(err, GravitonError::Conflict(_)));
        assert!(green.is_unassigned());
        assert!(
            fx.hydrometers()
                .require(&green.id)
                .expect("stored")
                .is_unassigned()
        );
    }

    /// Memory store whose hydrometer writes fail while `broken` is set.
    struct BrokenHydrometerWrites {
        inner: MemoryStore,
        broken: AtomicBool,
    }

    impl DocumentStore for BrokenHydrometerWrites {
        type WriteGuard<'a> = MutexGuard<'a, ()>;

        fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, StoreError> {
            self.inner.find(collection, filter)
        }

        fn upsert(
            &self,
            collection: Collection,
            id: &EntityId,
            document: Value,
        ) -> Result<(), StoreError> {
            if collection == Collection::Hydrometers && self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("hydrometers: disk full".to_string()));
            }
            self.inner.upsert(collection, id, document)
        }

        fn remove(&self, collection: Collection, id: &EntityId) -> Result<bool, StoreError> {
            self.inner.remove(collection, id)
        }

        fn lock_writes(&self) -> Result<Self::WriteGuard<'_>, StoreError> {
            self.inner.lock_writes()
        }
    }

    #[test]
    fn failed_back_reference_write_is_reported_and_repairable() {
        let store = BrokenHydrometerWrites {
            inner: MemoryStore::new(),
            broken: AtomicBool::new(false),
        };
        let clock = FixedClock::new(
            Utc.with_ymd_and_hms(2017, 11, 1, 12, 0, 0)
                .single()
                .expect("fixed time"),
        );
        let mut green = HydrometerRegistry::new(&store)
            .create("Green Hydrometer", "")
            .expect("create hydrometer");
        let mut flue = BatchRegistry::new(&store, &clock)
            .create(NewBatch::new("Flue Season", "20171101-flueseason"))
            .expect("create batch");

        store.broken.store(true, Ordering::SeqCst);
        let err = AssignmentEngine::new(&store, &clock)
            .assign_hydrometer(&mut flue, &mut green)
            .expect_err("hydrometer write fails");
        assert_eq!(err.kind(), ErrorKind::Persistence);

        // The batch write is not rolled back.
        assert_eq!(flue.hydrometer, Some(green.id));
        assert!(green.is_unassigned());
        let stored_batch = BatchRegistry::new(&store, &clock)
            .require(&flue.id)
            .expect("stored batch");
        assert_eq!(stored_batch.hydrometer, Some(green.id));
        assert!(
            HydrometerRegistry::new(&store)
                .require(&green.id)
                .expect("stored hydrometer")
                .is_unassigned()
        );

        store.broken.store(false, Ordering::SeqCst);
        let report = reconcile(&store, false).expect("reconcile");
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::MissingBackReference);
        assert!(report.findings[0].repaired);
        assert_eq!(
            HydrometerRegistry::new(&store)
                .require(&green.id)
                .expect("stored hydrometer")
                .current_batch,
            Some(flue.id)
        );
    }
}
