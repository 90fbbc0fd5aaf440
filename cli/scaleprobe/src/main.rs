//! scaleprobe - scale a workload and measure pod readiness.

use anyhow::Result;
use clap::Parser;
use scaleprobe::commands::Cli;
use scaleprobe::error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Run the command
    if let Err(e) = cli.run().await {
        // Print error in a user-friendly way
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
