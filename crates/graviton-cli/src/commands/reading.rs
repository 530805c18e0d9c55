use crate::cli::ReadingCommands;
use crate::support::{Context, batch_or_exit, or_exit, parse_time_or_exit, print_json};
use graviton_core::{Batch, Clock, GravityReading, NewReading};
use serde_json::json;
use tracing::{info, warn};

pub fn run(ctx: &Context, command: ReadingCommands) {
    match command {
        ReadingCommands::Add {
            hydrometer_name,
            batch,
            gravity,
            temperature,
            battery,
            date,
        } => {
            let date = match date {
                Some(raw) => parse_time_or_exit(&raw, "date"),
                None => ctx.graviton.clock().now(),
            };
            let reading = NewReading::new(date, gravity, temperature, battery);
            let (batch, recorded) = match (hydrometer_name, batch) {
                (Some(name), _) => or_exit(ctx, ctx.graviton.record_reading_for(&name, reading)),
                (None, Some(key)) => {
                    let mut batch = batch_or_exit(ctx, &key);
                    if !batch.active {
                        warn!(batch = %batch.unique_id, "recording a reading on an inactive batch");
                    }
                    let recorded = or_exit(
                        ctx,
                        ctx.graviton.batches().add_reading(&mut batch, reading),
                    );
                    (batch, recorded)
                }
                (None, None) => {
                    eprintln!("error: one of --hydrometer-name or --batch is required");
                    std::process::exit(2);
                }
            };
            info!(
                batch = %batch.unique_id,
                gravity = recorded.gravity,
                "recorded reading"
            );
            emit(ctx, &batch, &recorded);
        }
    }
}

fn emit(ctx: &Context, batch: &Batch, reading: &GravityReading) {
    let position = batch
        .readings
        .iter()
        .position(|r| r.id == reading.id)
        .unwrap_or_default();
    if ctx.json {
        print_json(&json!({
            "action": "reading.add",
            "batchId": batch.id,
            "stringId": batch.unique_id,
            "position": position,
            "reading": reading,
        }));
    } else {
        println!(
            "graviton reading add\n  Recorded: {} gravity={:.3} on {} (position {} of {})",
            reading.id,
            reading.gravity,
            batch.unique_id,
            position + 1,
            batch.readings.len()
        );
    }
}
