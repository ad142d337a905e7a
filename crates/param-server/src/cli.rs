//! Command-line arguments for the parameter server.
//!
//! Flags fall back to environment variables so a launcher can configure a
//! whole fleet of processes through the environment.

use std::path::PathBuf;

use clap::Parser;

/// Environment variable naming the server when `--server-name` is absent.
pub const SERVER_NAME_ENV: &str = "BOT_PARAM_SERVER_NAME";

/// Bus used when neither `--bus-url` nor `NATS_URL` is given.
pub const DEFAULT_BUS_URL: &str = "nats://localhost:4222";

/// Exit status for usage errors and fatal startup/runtime errors.
pub const FAILURE_EXIT: u8 = 1;

/// Parameter Server: maintains and publishes params initially read from a
/// parameter file.
#[derive(Debug, Clone, Parser)]
#[command(name = "param-server", disable_version_flag = true)]
pub struct Cli {
    /// YAML parameter file to load at startup.
    pub param_file: PathBuf,

    /// Publish params under this server name (prepended to every channel).
    #[arg(short = 's', long = "server-name", env = SERVER_NAME_ENV)]
    pub server_name: Option<String>,

    /// NATS URL of the bus.
    #[arg(short = 'l', long = "bus-url", env = "NATS_URL", default_value = DEFAULT_BUS_URL)]
    pub bus_url: String,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long = "log-json", env = "PARAM_SERVER_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    /// The channel prefix: the server name if one was given, else empty.
    pub fn channel_prefix(&self) -> &str {
        self.server_name.as_deref().unwrap_or_default()
    }
}
