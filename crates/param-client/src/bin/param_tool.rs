//! Operator tool for a running parameter server.
//!
//! ```text
//! param-tool dump                    print the whole parameter document
//! param-tool get drivetrain.gain     print one entry or subtree
//! param-tool set a.b=1 c=[1, 2]      ask the server to change entries
//! param-tool watch                   follow snapshots until Ctrl-C
//! ```
//!
//! Results go to stdout and logs to stderr. Exit status is 1 on any failure.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt as _;
use param_client::{ClientError, ParamCache, ParamClient};
use param_store::{ParamStore, StoreError};
use param_types::SetEntry;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const FAILURE_EXIT: u8 = 1;

/// Query and change the parameters held by a parameter server.
#[derive(Debug, Parser)]
#[command(name = "param-tool", disable_version_flag = true)]
struct Cli {
    /// Talk to the server publishing under this name.
    #[arg(short = 's', long = "server-name", env = "BOT_PARAM_SERVER_NAME", global = true)]
    server_name: Option<String>,

    /// NATS URL of the bus.
    #[arg(
        short = 'l',
        long = "bus-url",
        env = "NATS_URL",
        default_value = "nats://localhost:4222",
        global = true
    )]
    bus_url: String,

    /// How long to wait for a snapshot, in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 2000, global = true)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the full parameter document.
    Dump,
    /// Print the value at a dotted key.
    Get {
        /// Dotted key, e.g. `drivetrain.left.gain`.
        key: String,
    },
    /// Change one or more entries, applied in order.
    Set {
        /// Assignments of the form `key=value`.
        #[arg(required = true, value_parser = parse_assignment)]
        entries: Vec<SetEntry>,
    },
    /// Print every new snapshot until interrupted.
    Watch,
}

#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("unreadable snapshot: {0}")]
    Snapshot(#[from] StoreError),

    #[error("no such key: {key}")]
    MissingKey { key: String },

    #[error("could not render {key}: {source}")]
    Render {
        key: String,
        source: serde_yml::Error,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprint!("{}", e.render());
            return ExitCode::from(FAILURE_EXIT);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "param-tool failed");
            ExitCode::from(FAILURE_EXIT)
        }
    }
}

async fn run(cli: Cli) -> Result<(), ToolError> {
    let prefix = cli.server_name.as_deref().unwrap_or_default();
    let client = ParamClient::connect(&cli.bus_url, prefix).await?;
    let timeout = Duration::from_millis(cli.timeout_ms);

    match cli.command {
        Command::Dump => {
            let snapshot = client.fetch(timeout).await?;
            print!("{}", snapshot.params);
        }
        Command::Get { key } => {
            let snapshot = client.fetch(timeout).await?;
            let store = ParamStore::parse(&snapshot.params)?;
            println!("{}", render(&store, &key)?);
        }
        Command::Set { entries } => {
            let count = entries.len();
            client.set(entries).await?;
            client.flush().await?;
            info!(entries = count, "set request sent");
        }
        Command::Watch => watch(&client).await?,
    }
    Ok(())
}

/// Render the entry at `key`: leaves as plain text, blocks and lists as YAML.
fn render(store: &ParamStore, key: &str) -> Result<String, ToolError> {
    if let Some(text) = store.get_str(key) {
        return Ok(text);
    }
    let node = store.get(key).ok_or_else(|| ToolError::MissingKey {
        key: key.to_owned(),
    })?;
    let text = serde_yml::to_string(node).map_err(|source| ToolError::Render {
        key: key.to_owned(),
        source,
    })?;
    Ok(text.trim_end().to_owned())
}

async fn watch(client: &ParamClient) -> Result<(), ToolError> {
    let mut updates = client.subscribe_updates().await?;
    client.request().await?;
    let mut cache = ParamCache::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => return Ok(()),
            next = updates.next() => {
                let Some(update) = next else { return Ok(()) };
                match cache.apply(&update) {
                    Ok(outcome) if outcome.adopted() => {
                        println!(
                            "# server {} seq {} at {}",
                            update.server_id,
                            update.sequence_number,
                            update.captured_at.to_rfc3339()
                        );
                        print!("{}", update.params);
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "ignoring unreadable snapshot"),
                }
            }
        }
    }
}

/// Split `key=value` at the first `=`.
fn parse_assignment(arg: &str) -> Result<SetEntry, String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(SetEntry::new(key, value)),
        _ => Err(format!("expected key=value, got `{arg}`")),
    }
}
