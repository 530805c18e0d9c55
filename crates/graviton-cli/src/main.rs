//! Graviton CLI: the `graviton` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let config = support::load_config_or_exit(&cli.global);
    support::init_tracing(&config.log_filter);
    let ctx = support::open_or_exit(config, cli.global.json);

    match cli.command {
        Commands::Hydrometer { command } => commands::hydrometer::run(&ctx, command),

        Commands::Batch { command } => commands::batch::run(&ctx, command),

        Commands::Reading { command } => commands::reading::run(&ctx, command),

        Commands::Reconcile { dry_run } => commands::maintenance::run_reconcile(&ctx, dry_run),

        Commands::Demo => commands::maintenance::run_demo(&ctx),

        Commands::Status => commands::maintenance::run_status(&ctx),
    }
}
