// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup wiring for the Nim client: arguments, logging, configuration,
//! trace plumbing and the UDP channel.

use anyhow::{Context, Result};
use clap::Parser;
use nim_network::config::{
    load_client_config, load_tracing_server_config, DEFAULT_CLIENT_CONFIG,
    DEFAULT_TRACING_SERVER_CONFIG,
};
use nim_network::{
    ClientConfig, GameLoop, GameReport, LogTracer, RemoteTracer, TraceServer, Tracer, UdpChannel,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(
    name = "nim-client",
    about = "Play one game of Nim against a UDP peer",
    version
)]
pub struct Args {
    /// Seed carried by the opening message
    #[clap(allow_negative_numbers = true)]
    pub seed: i8,

    /// Client configuration file
    #[clap(long, default_value = DEFAULT_CLIENT_CONFIG)]
    pub config: PathBuf,

    /// Embedded trace server configuration file
    #[clap(long, default_value = DEFAULT_TRACING_SERVER_CONFIG)]
    pub tracing_server_config: PathBuf,

    /// Do not start the embedded trace server
    #[clap(long)]
    pub no_trace_server: bool,

    /// Enable debug logging
    #[clap(long)]
    pub debug: bool,
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `debug`.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
    {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
}

/// Start everything the game needs and play it to the end
pub async fn run(args: &Args) -> Result<GameReport> {
    let trace_server = if args.no_trace_server {
        None
    } else {
        let config = load_tracing_server_config(&args.tracing_server_config)
            .context("Failed to load trace server config")?;
        let server = TraceServer::open(&config)
            .await
            .context("Failed to open trace server")?;
        Some(server.spawn())
    };

    let config = load_client_config(&args.config).context("Failed to load client config")?;
    let tracer = connect_tracer(&config).await;

    let channel = UdpChannel::connect(&config.client_address, &config.nim_server_address)
        .await
        .context("Failed to set up UDP channel")?;

    let result = GameLoop::new(channel, tracer, args.seed, config.loop_options())
        .run()
        .await
        .context("Game loop failed");

    if let Some(handle) = trace_server {
        handle.abort();
    }

    let report = result?;
    info!(
        outcome = ?report.outcome,
        turns = report.turns,
        violations = report.stats.violations.len(),
        timeouts = report.stats.timeouts,
        "Session finished"
    );
    Ok(report)
}

/// Remote tracer if the trace server answers, diagnostic log otherwise
async fn connect_tracer(config: &ClientConfig) -> Arc<dyn Tracer> {
    match RemoteTracer::connect(
        &config.tracing_server_address,
        &config.tracing_identity,
        &config.secret,
    )
    .await
    {
        Ok(tracer) => Arc::new(tracer),
        Err(e) => {
            warn!(
                addr = %config.tracing_server_address,
                "Trace server unavailable, logging game events instead: {}",
                e
            );
            Arc::new(LogTracer)
        }
    }
}
