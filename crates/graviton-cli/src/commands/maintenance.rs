//! Store-level commands: reconcile, demo, status.

use crate::support::{Context, or_exit, print_json, to_value_or_exit, yes_no};
use graviton_core::{Collection, DocumentStore, Filter, ensure_demo_data, snapshot_ref};
use serde_json::json;
use tracing::{info, warn};

pub fn run_reconcile(ctx: &Context, dry_run: bool) {
    let report = or_exit(ctx, ctx.graviton.reconcile(dry_run));
    for finding in &report.findings {
        if finding.repaired {
            info!(kind = ?finding.kind, hydrometer = %finding.hydrometer, "repaired reference");
        } else {
            warn!(kind = ?finding.kind, hydrometer = %finding.hydrometer, "unresolved reference");
        }
    }

    if ctx.json {
        let mut payload = to_value_or_exit(&report);
        payload["action"] = json!("reconcile");
        payload["clean"] = json!(report.is_clean());
        print_json(&payload);
        return;
    }
    println!("graviton reconcile{}", if dry_run { " (dry run)" } else { "" });
    if report.is_clean() {
        println!("  No broken references.");
        return;
    }
    for finding in &report.findings {
        let batch = finding
            .batch
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:?}: hydrometer {} batch {} (repaired: {})",
            finding.kind,
            finding.hydrometer,
            batch,
            yes_no(finding.repaired)
        );
    }
}

pub fn run_demo(ctx: &Context) {
    let report = or_exit(ctx, ensure_demo_data(&ctx.graviton));
    if !report.is_noop() {
        info!(
            hydrometers = report.hydrometers_created.len(),
            batches = report.batches_created.len(),
            "created demo data"
        );
    }
    if ctx.json {
        let mut payload = to_value_or_exit(&report);
        payload["action"] = json!("demo");
        print_json(&payload);
    } else if report.is_noop() {
        println!("graviton demo\n  Demo data already present.");
    } else {
        println!(
            "graviton demo\n  Hydrometers: {}\n  Batches: {}\n  Readings: {}",
            report.hydrometers_created.join(", "),
            report.batches_created.join(", "),
            report.readings_created
        );
    }
}

pub fn run_status(ctx: &Context) {
    let store = ctx.graviton.store();
    let count = |collection: Collection| {
        store
            .find(collection, &Filter::new())
            .map(|docs| docs.len())
            .map_err(graviton_core::GravitonError::from)
    };
    let hydrometers = or_exit(ctx, count(Collection::Hydrometers));
    let batches = or_exit(ctx, count(Collection::Batches));
    let snapshot = or_exit(ctx, snapshot_ref(store).map_err(Into::into));

    if ctx.json {
        print_json(&json!({
            "action": "status",
            "storePath": ctx.store_path().display().to_string(),
            "dbName": ctx.config.effective_db_name(),
            "testMode": ctx.config.test_mode,
            "hydrometers": hydrometers,
            "batches": batches,
            "snapshotRef": snapshot,
        }));
    } else {
        println!(
            "graviton status\n  Store: {}\n  Database: {}\n  Test mode: {}\n  Hydrometers: {}\n  Batches: {}\n  Snapshot: {}",
            ctx.store_path().display(),
            ctx.config.effective_db_name(),
            yes_no(ctx.config.test_mode),
            hydrometers,
            batches,
            snapshot
        );
    }
}
