//! task-stream-tail - follow a task's event feed from the terminal.
//!
//! Delivered events go to stdout as JSON lines; state changes and errors are
//! logged to stderr.
//!
//! ```bash
//! task-stream-tail task-42 --base-url http://localhost:8080/api
//! RUST_LOG=task_stream=debug task-stream-tail task-42 --since-seq 120 --stats
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use task_stream::{ConnectionState, StreamClient};
use task_stream_http::HttpEventSource;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.stream_config()?;
    let source = HttpEventSource::new(cli.http_config(&config))
        .context("failed to build HTTP client")?;

    let mut client = StreamClient::new(
        cli.task_id.clone(),
        config,
        Arc::new(source.clone()),
        Arc::new(source),
    );
    client.on_event(|event| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(error) => warn!(seq = event.seq, %error, "failed to encode event"),
    });
    client.on_state_change(|current, previous| {
        info!(%previous, %current, "connection state changed");
    });
    client.on_error(|error| warn!(%error, "stream error"));

    let mut states = client.subscribe_state();
    client.start()?;

    let failed = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            false
        }
        gave_up = states.wait_for(|state| *state == ConnectionState::Error) => gave_up.is_ok(),
    };

    client.stop().await;

    if cli.stats {
        let stats = client.stats();
        info!(
            events_received = stats.events_received,
            reconnects = stats.reconnects,
            errors = stats.errors,
            gaps_detected = stats.gaps_detected,
            gaps_recovered = stats.gaps_recovered,
            events_recovered = stats.events_recovered,
            duplicates_dropped = stats.duplicates_dropped,
            "stream stats"
        );
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
