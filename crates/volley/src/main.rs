// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Volley — campaign dispatch engine for rate-limited, ban-sensitive
//! messaging channels.
//!
//! This is the binary entry point.

use clap::{Parser, Subcommand};

mod serve;
mod status;

/// Volley — campaign dispatch engine.
#[derive(Parser, Debug)]
#[command(name = "volley", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the dispatch workers, housekeeping, and status gateway.
    Serve,
    /// Print today's quota snapshot from the durable stats store.
    Status,
    /// Load and validate the configuration, then exit.
    ConfigCheck,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match volley_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            volley_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status) => status::run_status(config).await,
        Some(Commands::ConfigCheck) => {
            println!(
                "config ok: daily_limit={} rate_per_minute={} workers={}",
                config.dispatch.daily_limit,
                config.dispatch.rate_per_minute,
                config.dispatch.workers
            );
            Ok(())
        }
        None => {
            println!("volley: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Config loads with defaults (no config file needed).
        let config = volley_config::load_and_validate()
            .expect("default config should be valid");
        assert_eq!(config.dispatch.daily_limit, 1000);
        assert_eq!(config.engine.name, "volley");
    }
}
