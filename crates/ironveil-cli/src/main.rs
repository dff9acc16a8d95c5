//! CLI for ironveil: multi-source randomness and tamper-evident values.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ironveil")]
#[command(about = "ironveil: multi-source randomness and tamper-evident values")]
#[command(version = ironveil_core::VERSION)]
struct Cli {
    /// JSON configuration file (reseed thresholds, protection defaults, entropy pool)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entropy sources feeding the slow generator
    Sources {
        /// Print machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write random bytes to stdout
    Bytes {
        /// Number of bytes to produce
        #[arg(short = 'n', long, default_value = "32")]
        count: usize,

        /// Generator: fast (reseeding PRNG, default) or slow (direct multi-source)
        #[arg(long, default_value = "fast", value_parser = ["fast", "slow"])]
        generator: String,

        /// Output format
        #[arg(long, default_value = "hex", value_parser = ["hex", "raw"])]
        format: String,
    },

    /// Measure generator throughput and output quality
    Bench {
        /// Bytes drawn from the fast generator (the slow one gets 1/16th)
        #[arg(long, default_value = "1048576")]
        bytes: usize,

        /// Write the results as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Manage a persisted entropy pool file
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Subcommand)]
enum PoolAction {
    /// Create a fresh pool file from OS entropy
    Init {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Verify a pool file's integrity and sample its output
    Inspect { path: PathBuf },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Sources { json } => commands::sources::run(config, json),
        Commands::Bytes {
            count,
            generator,
            format,
        } => commands::bytes::run(config, count, &generator, &format),
        Commands::Bench { bytes, output } => {
            commands::bench::run(config, bytes, output.as_deref())
        }
        Commands::Pool { action } => match action {
            PoolAction::Init { path, force } => commands::pool::init(&path, force),
            PoolAction::Inspect { path } => commands::pool::inspect(&path),
        },
        Commands::Config => commands::show_config(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
