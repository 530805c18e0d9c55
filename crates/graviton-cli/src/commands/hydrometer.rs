use crate::cli::HydrometerCommands;
use crate::support::{Context, hydrometer_or_exit, or_exit, print_json, yes_no};
use graviton_core::{Hydrometer, HydrometerQuery};
use serde_json::json;
use tracing::info;

pub fn run(ctx: &Context, command: HydrometerCommands) {
    match command {
        HydrometerCommands::Add { name, description } => run_add(ctx, name, description),
        HydrometerCommands::List { name, archived } => run_list(
            ctx,
            HydrometerQuery {
                name,
                include_archived: archived,
            },
        ),
        HydrometerCommands::Available => {
            let rows = or_exit(ctx, ctx.graviton.hydrometers().available());
            emit_list(ctx, "hydrometer.available", &rows);
        }
        HydrometerCommands::Show { id } => {
            let hydrometer = hydrometer_or_exit(ctx, &id);
            emit_one(ctx, "hydrometer.show", &hydrometer);
        }
        HydrometerCommands::Edit {
            id,
            name,
            description,
        } => run_edit(ctx, id, name, description),
        HydrometerCommands::Archive { id } => {
            let hydrometer = hydrometer_or_exit(ctx, &id);
            let archived = or_exit(ctx, ctx.graviton.hydrometers().archive(&hydrometer.id));
            info!(hydrometer = %archived.name, "archived hydrometer");
            emit_one(ctx, "hydrometer.archive", &archived);
        }
    }
}

fn run_add(ctx: &Context, name: String, description: String) {
    let hydrometer = or_exit(ctx, ctx.graviton.hydrometers().create(name, description));
    info!(hydrometer = %hydrometer.name, id = %hydrometer.id, "registered hydrometer");
    emit_one(ctx, "hydrometer.add", &hydrometer);
}

fn run_list(ctx: &Context, query: HydrometerQuery) {
    let rows = or_exit(ctx, ctx.graviton.hydrometers().query(&query));
    emit_list(ctx, "hydrometer.list", &rows);
}

fn run_edit(ctx: &Context, id: String, name: Option<String>, description: Option<String>) {
    let mut hydrometer = hydrometer_or_exit(ctx, &id);
    if let Some(name) = name {
        hydrometer.name = name.trim().to_string();
    }
    if let Some(description) = description {
        hydrometer.description = description;
    }
    or_exit(ctx, ctx.graviton.hydrometers().save(&hydrometer));
    emit_one(ctx, "hydrometer.edit", &hydrometer);
}

fn emit_one(ctx: &Context, action: &str, hydrometer: &Hydrometer) {
    if ctx.json {
        print_json(&json!({
            "action": action,
            "hydrometer": hydrometer,
        }));
    } else {
        println!("graviton {}", action.replace('.', " "));
        print_row(hydrometer);
    }
}

fn emit_list(ctx: &Context, action: &str, rows: &[Hydrometer]) {
    if ctx.json {
        print_json(&json!({
            "action": action,
            "count": rows.len(),
            "hydrometers": rows,
        }));
        return;
    }
    println!("graviton {}", action.replace('.', " "));
    if rows.is_empty() {
        println!("  (none)");
    }
    for hydrometer in rows {
        print_row(hydrometer);
    }
}

fn print_row(hydrometer: &Hydrometer) {
    let batch = hydrometer
        .current_batch
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {} (batch: {}, archived: {})",
        hydrometer.id,
        hydrometer.name,
        batch,
        yes_no(hydrometer.archived)
    );
    if !hydrometer.description.is_empty() {
        println!("    {}", hydrometer.description);
    }
}
