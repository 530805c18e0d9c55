use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "graviton",
    about = "Graviton: brewing batches, hydrometers and gravity readings",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Path to graviton.toml (defaults apply when the default file is absent)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root directory, overriding `store_dir` from the config
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Use the `-test` database
    #[arg(long, global = true)]
    pub test_mode: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage hydrometers
    Hydrometer {
        #[command(subcommand)]
        command: HydrometerCommands,
    },

    /// Manage batches and their lifecycle
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },

    /// Record gravity readings
    Reading {
        #[command(subcommand)]
        command: ReadingCommands,
    },

    /// Detect (and repair) broken batch/hydrometer references
    Reconcile {
        /// Report findings without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Ensure the demo data set exists
    Demo,

    /// Show store location, counts and snapshot digest
    Status,
}

#[derive(Subcommand, Clone, Debug)]
pub enum HydrometerCommands {
    /// Register a new hydrometer
    Add {
        /// Unique hydrometer name
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List hydrometers
    List {
        /// Filter by exact name
        #[arg(long)]
        name: Option<String>,

        /// Include archived hydrometers
        #[arg(long)]
        archived: bool,
    },

    /// List hydrometers free for assignment
    Available,

    /// Show one hydrometer
    Show {
        /// Hydrometer ID
        id: String,
    },

    /// Rename or re-describe a hydrometer
    Edit {
        /// Hydrometer ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Archive a hydrometer that no active batch holds
    Archive {
        /// Hydrometer ID
        id: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum BatchCommands {
    /// Start a new active batch
    Add {
        /// Recipe name
        recipe: String,

        /// Unique string ID (e.g. 20171101-flueseason)
        #[arg(long = "string-id")]
        unique_id: String,

        /// Start date (RFC 3339), defaults to now
        #[arg(long)]
        start: Option<String>,

        /// Hydrometer ID to attach
        #[arg(long)]
        hydrometer: Option<String>,
    },

    /// List batches (lightweight views)
    List {
        /// Filter by recipe
        #[arg(long)]
        recipe: Option<String>,

        /// Only active batches
        #[arg(long, conflicts_with = "inactive")]
        active: bool,

        /// Only finished or archived batches
        #[arg(long)]
        inactive: bool,

        /// Include archived batches
        #[arg(long)]
        archived: bool,
    },

    /// Show one batch with all readings
    Show {
        /// Batch ID or string ID
        batch: String,
    },

    /// Edit recipe, string ID or start date
    Edit {
        /// Batch ID or string ID
        batch: String,

        #[arg(long)]
        recipe: Option<String>,

        #[arg(long = "string-id")]
        unique_id: Option<String>,

        /// Start date (RFC 3339)
        #[arg(long)]
        start: Option<String>,
    },

    /// Attach a hydrometer, or detach with --none
    Assign {
        /// Batch ID or string ID
        batch: String,

        /// Hydrometer ID
        #[arg(required_unless_present = "none")]
        hydrometer: Option<String>,

        /// Detach the current hydrometer
        #[arg(long, conflicts_with = "hydrometer")]
        none: bool,
    },

    /// Finish a batch, releasing its hydrometer
    Finish {
        /// Batch ID or string ID
        batch: String,
    },

    /// Archive a batch (finishing it first if active)
    Archive {
        /// Batch ID or string ID
        batch: String,
    },

    /// Hide a reading without removing it
    HideReading {
        /// Batch ID or string ID
        batch: String,

        /// Reading ID
        reading: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ReadingCommands {
    /// Record one reading
    Add {
        /// Target the batch this hydrometer is attached to
        #[arg(long, conflicts_with = "batch", required_unless_present = "batch")]
        hydrometer_name: Option<String>,

        /// Target a batch directly (ID or string ID)
        #[arg(long)]
        batch: Option<String>,

        #[arg(long)]
        gravity: f64,

        #[arg(long)]
        temperature: f64,

        /// Battery voltage
        #[arg(long)]
        battery: f64,

        /// Sample time (RFC 3339), defaults to now
        #[arg(long)]
        date: Option<String>,
    },
}
