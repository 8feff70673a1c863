mod args;
mod demo;

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use crate::args::{Args, DemoConfig};

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    // The effective mask is the union of the boolean flags and --trace-mask;
    // both forms are accepted for illustration.
    let mask = args.trace.to_config();
    println!("Short form of mask: {{{}}}", mask.short_form());
    println!("Long form of mask (separate flags): {{{}}}", mask.long_flags());
    println!("Numeric mask: 0x{:x}", mask.event_mask());

    let config = match DemoConfig::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            println!("{err}");
            return ExitCode::from(err.exit_code());
        }
    };

    let config_json = serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string());
    tracing::info!("config: {}", config_json);

    match demo::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("database error: {err}");
            ExitCode::FAILURE
        }
    }
}
