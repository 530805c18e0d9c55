//! # graviton-core
//!
//! Consistency and lifecycle engine for brewing batches, the hydrometers
//! that measure them, and their gravity readings.
//!
//! This crate provides:
//! - `Hydrometer`, `Batch` and `GravityReading` (the entities)
//! - a `DocumentStore` seam with in-memory and JSONL adapters
//! - registries that validate every save (uniqueness, ordering, exclusivity)
//! - the assignment engine (one hydrometer per active batch)
//! - the batch lifecycle (`Active → Finished → Archived`)
//! - derived metrics (attenuation, ABV) and response views
//! - reference reconciliation and a demo data set
//!
//! It does not load configuration or log. Those concerns live in
//! `graviton-cli`.
//!
//! ## Layering
//!
//! ```text
//! Graviton (service facade)
//!     ↓
//! AssignmentEngine / Lifecycle / reconcile
//!     ↓
//! HydrometerRegistry / BatchRegistry   (validated save path)
//!     ↓
//! DocumentStore (MemoryStore | JsonlStore)
//! ```

pub mod assignment;
pub mod batch;
pub mod clock;
pub mod demo;
pub mod error;
pub mod hydrometer;
pub mod id;
pub mod lifecycle;
pub mod metrics;
pub mod reconcile;
pub mod registry;
pub mod service;
pub mod store;

pub use assignment::AssignmentEngine;
pub use batch::{Batch, BatchState, GravityReading, NewReading};
pub use clock::{Clock, FixedClock, SystemClock};
pub use demo::{DemoReport, ensure_demo_data};
pub use error::{ErrorKind, GravitonError, Result};
pub use hydrometer::Hydrometer;
pub use id::EntityId;
pub use lifecycle::Lifecycle;
pub use metrics::{BatchMetrics, BatchView, HydrometerSummary, ViewDetail, abv, attenuation};
pub use reconcile::{Finding, FindingKind, ReconcileReport, reconcile};
pub use registry::{
    BatchQuery, BatchRegistry, HydrometerQuery, HydrometerRegistry, NewBatch,
};
pub use service::Graviton;
pub use store::{
    Collection, DocumentStore, Filter, JsonlError, JsonlStore, MemoryStore, StoreError,
    snapshot_ref,
};
