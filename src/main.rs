//! # SMPP Stress - Main Entry Point
//!
//! Runs one end of a stress session over TCP.
//!
//! - **server** (default): listen, accept a single connection, complete the
//!   receiver bind, then flood the peer with `--msg-count` deliveries while
//!   draining its responses.
//! - **client**: connect, bind as a receiver and acknowledge every delivery.
//!
//! Either role can write a JSON report with `--output-file`.

use anyhow::{Context, Result};
use clap::Parser;
use smpp_stress::{
    cli::{Args, Role},
    client::{ClientConfig, StressClient},
    logging, net,
    results::{ResultsManager, SessionReport},
    session::{accept_bind, SessionConfig, SessionCoordinator},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);
    args.validate()?;

    info!("Starting SMPP stress {} v{}", args.role, smpp_stress::VERSION);
    info!("Configuration: {:?}", args);

    let report = match args.role {
        Role::Server => run_server(&args).await?,
        Role::Client => run_client(&args).await?,
    };
    report.log_summary();

    if let Some(ref path) = args.output_file {
        let mut results_manager = ResultsManager::new(path);
        results_manager.add_report(report);
        results_manager.finalize()?;
    }

    Ok(())
}

/// Accept one peer, bind it and run the delivery flood
async fn run_server(args: &Args) -> Result<SessionReport> {
    let config = SessionConfig::from(args);
    let addr = args.address();

    let (mut stream, _peer) = net::accept_one(&addr, args.socket_buffer_size)
        .await
        .with_context(|| format!("Failed to accept a connection on {}", addr))?;

    accept_bind(&mut stream, &config)
        .await
        .context("Bind handshake failed")?;

    let summary = SessionCoordinator::new(config)
        .execute(stream, args.msg_count)
        .await
        .context("Session failed")?;

    Ok(SessionReport::from_summary(&summary, args.msg_count))
}

/// Connect to a server and acknowledge its deliveries
async fn run_client(args: &Args) -> Result<SessionReport> {
    let addr = args.address();
    let stream = net::connect(&addr, args.socket_buffer_size)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;

    let report = StressClient::new(ClientConfig::from(args))
        .run(stream)
        .await
        .context("Client session failed")?;

    Ok(SessionReport::from_client(&report))
}
