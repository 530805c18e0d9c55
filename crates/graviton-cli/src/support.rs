use chrono::{DateTime, Utc};
use graviton_core::{
    Batch, EntityId, ErrorKind, Graviton, GravitonError, Hydrometer, JsonlStore, ensure_demo_data,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::GlobalArgs;
use crate::config::{DEFAULT_CONFIG_PATH, GravitonConfig};

/// Everything a command needs: the opened engine and output mode.
pub struct Context {
    pub graviton: Graviton<JsonlStore>,
    pub config: GravitonConfig,
    pub json: bool,
}

impl Context {
    pub fn store_path(&self) -> &Path {
        self.graviton.store().root()
    }
}

pub fn load_config_or_exit(global: &GlobalArgs) -> GravitonConfig {
    let (path, explicit) = match &global.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let mut config = GravitonConfig::load(&path, explicit).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(2);
    });
    if let Some(store) = &global.store {
        config.store_dir = store.clone();
    }
    if global.test_mode {
        config.test_mode = true;
    }
    config
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn open_or_exit(config: GravitonConfig, json: bool) -> Context {
    let path = config.store_path();
    let store = JsonlStore::open(&path).unwrap_or_else(|e| {
        eprintln!("error: failed to open store {}: {e}", path.display());
        std::process::exit(2);
    });
    debug!(store = %path.display(), "opened store");

    let graviton = Graviton::new(store);
    if config.demo_data {
        let report = ensure_demo_data(&graviton).unwrap_or_else(|e| fail(json, &e));
        if !report.is_noop() {
            info!(
                hydrometers = report.hydrometers_created.len(),
                batches = report.batches_created.len(),
                "created demo data"
            );
        }
    }

    Context {
        graviton,
        config,
        json,
    }
}

/// Exit code for a failed core operation.
pub fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation => 2,
        ErrorKind::NotFound | ErrorKind::MultipleFound => 3,
        ErrorKind::Conflict => 4,
        ErrorKind::Persistence => 5,
    }
}

/// Report `err` and exit. With `--json` the error is a payload on stdout.
pub fn fail(json_output: bool, err: &GravitonError) -> ! {
    let kind = err.kind();
    if json_output {
        print_json(&json!({
            "error": {
                "kind": kind,
                "message": err.to_string(),
            }
        }));
    } else {
        eprintln!("error: {err}");
    }
    std::process::exit(exit_code(kind));
}

pub fn or_exit<T>(ctx: &Context, result: graviton_core::Result<T>) -> T {
    result.unwrap_or_else(|e| fail(ctx.json, &e))
}

pub fn print_json(payload: &impl Serialize) {
    let rendered = serde_json::to_string_pretty(payload).unwrap_or_else(|err| {
        eprintln!("error: failed to render JSON payload: {err}");
        std::process::exit(2);
    });
    println!("{rendered}");
}

pub fn to_value_or_exit(payload: &impl Serialize) -> Value {
    serde_json::to_value(payload).unwrap_or_else(|err| {
        eprintln!("error: failed to render JSON payload: {err}");
        std::process::exit(2);
    })
}

pub fn parse_id_or_exit(raw: &str, label: &str) -> EntityId {
    raw.trim().parse().unwrap_or_else(|e| {
        eprintln!("error: invalid {label} id `{raw}`: {e}");
        std::process::exit(2);
    })
}

pub fn parse_time_or_exit(raw: &str, label: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            eprintln!("error: invalid {label} `{raw}` (expected RFC 3339): {e}");
            std::process::exit(2);
        })
}

/// Resolve a batch by entity ID, falling back to its string ID.
pub fn batch_or_exit(ctx: &Context, key: &str) -> Batch {
    let batches = ctx.graviton.batches();
    let result = match key.trim().parse::<EntityId>() {
        Ok(id) => batches.require(&id),
        Err(_) => batches.by_unique_id(key.trim()),
    };
    or_exit(ctx, result)
}

pub fn hydrometer_or_exit(ctx: &Context, raw_id: &str) -> Hydrometer {
    let id = parse_id_or_exit(raw_id, "hydrometer");
    or_exit(ctx, ctx.graviton.hydrometers().require(&id))
}

pub fn yes_no(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}
