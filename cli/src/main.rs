// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nim client - plays one game against a UDP peer
//!
//! Exits 0 once the game ends (including an abandoned game), 1 on any
//! startup or runtime failure and 2 on a usage error.

use clap::Parser;
use nim_cli::{init_logging, run, Args};
use nim_network::GameOutcome;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit here with status 2
    let args = Args::parse();
    init_logging(args.debug);

    // Panics are logged before the default hook prints them
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("PANIC: {}", panic_info);
        default_hook(panic_info);
    }));

    match run(&args).await {
        Ok(report) => {
            match report.outcome {
                GameOutcome::Finished(winner) => {
                    println!("Game over after {} turns: {} wins", report.turns, winner);
                }
                GameOutcome::Abandoned { turn, lost_turns } => {
                    println!(
                        "Game abandoned at turn {} after {} lost turns",
                        turn, lost_turns
                    );
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
