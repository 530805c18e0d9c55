use crate::cli::BatchCommands;
use crate::support::{
    Context, batch_or_exit, or_exit, parse_id_or_exit, parse_time_or_exit, print_json,
};
use graviton_core::{Batch, BatchQuery, BatchView, NewBatch, ViewDetail};
use serde_json::json;
use tracing::info;

pub fn run(ctx: &Context, command: BatchCommands) {
    match command {
        BatchCommands::Add {
            recipe,
            unique_id,
            start,
            hydrometer,
        } => run_add(ctx, recipe, unique_id, start, hydrometer),

        BatchCommands::List {
            recipe,
            active,
            inactive,
            archived,
        } => {
            let query = BatchQuery {
                recipe,
                active: if active {
                    Some(true)
                } else if inactive {
                    Some(false)
                } else {
                    None
                },
                archived: (!archived).then_some(false),
            };
            let views = or_exit(
                ctx,
                ctx.graviton.batch_views(&query, ViewDetail::Lightweight),
            );
            emit_list(ctx, &views);
        }

        BatchCommands::Show { batch } => {
            let batch = batch_or_exit(ctx, &batch);
            emit_view(ctx, "batch.show", &batch, ViewDetail::Full);
        }

        BatchCommands::Edit {
            batch,
            recipe,
            unique_id,
            start,
        } => run_edit(ctx, batch, recipe, unique_id, start),

        BatchCommands::Assign {
            batch,
            hydrometer,
            none,
        } => run_assign(ctx, batch, hydrometer, none),

        BatchCommands::Finish { batch } => {
            let mut batch = batch_or_exit(ctx, &batch);
            or_exit(ctx, ctx.graviton.lifecycle().finish(&mut batch));
            info!(batch = %batch.unique_id, "finished batch");
            emit_view(ctx, "batch.finish", &batch, ViewDetail::Lightweight);
        }

        BatchCommands::Archive { batch } => {
            let mut batch = batch_or_exit(ctx, &batch);
            or_exit(ctx, ctx.graviton.lifecycle().archive(&mut batch));
            info!(batch = %batch.unique_id, "archived batch");
            emit_view(ctx, "batch.archive", &batch, ViewDetail::Lightweight);
        }

        BatchCommands::HideReading { batch, reading } => {
            let mut batch = batch_or_exit(ctx, &batch);
            let reading_id = parse_id_or_exit(&reading, "reading");
            or_exit(
                ctx,
                ctx.graviton.batches().hide_reading(&mut batch, &reading_id),
            );
            emit_view(ctx, "batch.hide-reading", &batch, ViewDetail::Full);
        }
    }
}

fn run_add(
    ctx: &Context,
    recipe: String,
    unique_id: String,
    start: Option<String>,
    hydrometer: Option<String>,
) {
    let new = NewBatch {
        recipe,
        unique_id,
        start_date: start.map(|raw| parse_time_or_exit(&raw, "start date")),
    };
    let hydrometer_id = hydrometer.map(|raw| parse_id_or_exit(&raw, "hydrometer"));
    let batch = or_exit(
        ctx,
        ctx.graviton.start_batch(new, hydrometer_id.as_ref()),
    );
    info!(batch = %batch.unique_id, id = %batch.id, "started batch");
    emit_view(ctx, "batch.add", &batch, ViewDetail::Lightweight);
}

fn run_edit(
    ctx: &Context,
    key: String,
    recipe: Option<String>,
    unique_id: Option<String>,
    start: Option<String>,
) {
    let mut batch = batch_or_exit(ctx, &key);
    if let Some(recipe) = recipe {
        batch.recipe = recipe.trim().to_string();
    }
    if let Some(unique_id) = unique_id {
        batch.unique_id = unique_id.trim().to_string();
    }
    if let Some(start) = start {
        batch.start_date = parse_time_or_exit(&start, "start date");
    }
    or_exit(ctx, ctx.graviton.batches().save(&mut batch));
    emit_view(ctx, "batch.edit", &batch, ViewDetail::Lightweight);
}

fn run_assign(ctx: &Context, key: String, hydrometer: Option<String>, none: bool) {
    let mut batch = batch_or_exit(ctx, &key);
    let hydrometer_id = if none {
        None
    } else {
        hydrometer.map(|raw| parse_id_or_exit(&raw, "hydrometer"))
    };
    let assigned = or_exit(
        ctx,
        ctx.graviton
            .assignments()
            .assign_hydrometer_by_id(&mut batch, hydrometer_id.as_ref()),
    );
    match &assigned {
        Some(hydrometer) => info!(
            batch = %batch.unique_id,
            hydrometer = %hydrometer.name,
            "assigned hydrometer"
        ),
        None => info!(batch = %batch.unique_id, "batch has no hydrometer"),
    }
    emit_view(ctx, "batch.assign", &batch, ViewDetail::Lightweight);
}

fn emit_view(ctx: &Context, action: &str, batch: &Batch, detail: ViewDetail) {
    let view = or_exit(ctx, ctx.graviton.batch_view(batch, detail));
    if ctx.json {
        print_json(&json!({
            "action": action,
            "batch": view,
        }));
        return;
    }
    println!("graviton {}", action.replace('.', " "));
    print_view(&view);
    if let Some(readings) = &view.readings {
        for reading in readings {
            println!(
                "    {} {} gravity={:.3} temp={:.1} battery={:.2}{}",
                reading.id,
                reading.date.to_rfc3339(),
                reading.gravity,
                reading.temperature,
                reading.battery_voltage,
                if reading.hidden { " (hidden)" } else { "" }
            );
        }
    }
}

fn emit_list(ctx: &Context, views: &[BatchView]) {
    if ctx.json {
        print_json(&json!({
            "action": "batch.list",
            "count": views.len(),
            "batches": views,
        }));
        return;
    }
    println!("graviton batch list");
    if views.is_empty() {
        println!("  (none)");
    }
    for view in views {
        print_view(view);
    }
}

fn print_view(view: &BatchView) {
    let hydrometer = view
        .hydrometer
        .as_ref()
        .map(|h| h.name.as_str())
        .unwrap_or("-");
    println!(
        "  {} {} [{}] {} (hydrometer: {})",
        view.id,
        view.unique_id,
        view.state.as_str(),
        view.recipe,
        hydrometer
    );
    match &view.metrics.latest_reading {
        Some(latest) => println!(
            "    readings: {}, latest: {:.3} at {}, attenuation: {:.1}%, abv: {:.2}%",
            view.reading_count,
            latest.gravity,
            latest.date.to_rfc3339(),
            view.metrics.attenuation * 100.0,
            view.metrics.abv
        ),
        None => println!("    readings: 0"),
    }
}
