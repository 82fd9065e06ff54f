//! wgwarden - WireGuard administration and new-peer alerts over Telegram.

use clap::Parser;
use std::process::ExitCode;

use wgwarden::{logging, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Commands::parse();

    // Held until exit so the file writer flushes.
    let _log_guard = match logging::init(&args.log_options()) {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
