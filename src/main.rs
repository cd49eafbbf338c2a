// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "bookscan")]
#[command(about = "Scan book barcodes from a camera")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available capture devices
    List,

    /// Scan until interrupted, printing each detected identifier
    Scan {
        /// Device node to capture from
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,

        /// Suppression window for repeated reads of the same value, in ms
        #[arg(short, long, default_value = "2000")]
        throttle_ms: u64,

        /// Also print candidates that failed checksum validation
        #[arg(long)]
        advisory: bool,

        /// Disable the software image-analysis strategy
        #[arg(long)]
        no_visual: bool,

        /// Emit one JSON object per detection instead of plain text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=bookscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();

    match args.command {
        Some(Commands::List) => cli::list_devices(),
        Some(Commands::Scan {
            device,
            throttle_ms,
            advisory,
            no_visual,
            json,
        }) => cli::scan(&device, throttle_ms, advisory, no_visual, json),
        None => cli::scan("/dev/video0", 2000, false, false, false),
    }
}
