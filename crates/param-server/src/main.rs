//! Parameter server entry point.
//!
//! Loads a hierarchical parameter file and serves it on a NATS bus:
//!
//! ```text
//! <prefix>PARAM_REQUEST --\
//!                          >--> ParameterServer --> <prefix>PARAM_UPDATE
//! <prefix>PARAM_SET ------/          ^
//!                         5 s timer -/
//! ```
//!
//! The full parameter set is republished every five seconds, whenever a
//! request arrives, and after every accepted set entry. A snapshot from a
//! different server on the update subject is reported as a warning.
//!
//! Exit status is 1 on a usage error or any fatal load/publish error, and 0
//! after a clean shutdown on Ctrl-C or SIGTERM.

mod cli;
mod error;
mod nats_bus;

use std::process::ExitCode;

use clap::Parser as _;
use param_core::{DEFAULT_PUBLISH_PERIOD, ParameterServer, run_event_loop};
use param_types::ChannelNames;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, FAILURE_EXIT};
use crate::error::AppError;
use crate::nats_bus::NatsBus;

/// Application entry point.
///
/// Parses arguments, initializes logging and runs the server until shutdown.
/// This is the only place that decides the process exit status.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help output included: every early exit from parsing is a usage exit.
            eprint!("{}", e.render());
            return ExitCode::from(FAILURE_EXIT);
        }
    };

    init_tracing(cli.log_json);
    info!("param-server starting");

    match run(cli).await {
        Ok(()) => {
            info!("param-server shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "param-server failed");
            ExitCode::from(FAILURE_EXIT)
        }
    }
}

/// Initialize structured logging on stderr.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load parameters, connect to the bus and run the event loop.
async fn run(cli: Cli) -> Result<(), AppError> {
    let channels = ChannelNames::with_prefix(cli.channel_prefix());
    info!(
        param_file = %cli.param_file.display(),
        bus_url = cli.bus_url,
        update_channel = channels.update,
        "configuration loaded"
    );

    let mut server = ParameterServer::load(&cli.param_file, channels)?;
    info!(server_id = %server.id(), "server identity assigned");

    let bus = NatsBus::connect(&cli.bus_url).await?;
    let events = bus.subscribe_events(server.channels()).await?;
    let mut publisher = bus.publisher();

    let stats = run_event_loop(
        &mut server,
        events,
        &mut publisher,
        DEFAULT_PUBLISH_PERIOD,
        shutdown_signal(),
    )
    .await?;

    if let Err(e) = bus.flush().await {
        warn!(error = %e, "failed to flush pending messages on shutdown");
    }
    info!(
        publishes = stats.publishes,
        sets = stats.sets,
        requests = stats.requests,
        conflicts = stats.conflicts,
        final_sequence = %server.sequence(),
        "event loop finished"
    );
    Ok(())
}

/// Resolve on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                let _ = signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}
