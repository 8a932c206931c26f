// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod error;
mod monitor;
mod parse;
mod scan;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;
use utils::ConfigArgs;

/// extcam CLI - External camera discovery and hotplug monitoring tool
#[derive(Parser)]
#[command(name = "extcam")]
#[command(version)]
#[command(about = "extcam CLI - External camera discovery and hotplug monitoring tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=debug for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every device node once and print the result
    Scan(scan::Args),

    /// Watch for external cameras being attached and removed
    Monitor(monitor::Args),

    /// Validate a logical device id and show the node it maps to
    Parse(parse::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Scan(args) => scan::execute(args, &cli.config, cli.json),
        Commands::Monitor(args) => monitor::execute(args, &cli.config, cli.json),
        Commands::Parse(args) => parse::execute(args, &cli.config, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
