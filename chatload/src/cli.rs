use chatload_core::{Config, ConfigError};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Concurrent load test for a real-time chat service.
///
/// Settings come from the built-in defaults, then `--config`, then the flags below.
#[derive(Parser, Debug, Default)]
#[command(name = "chatload", version)]
pub struct Cli {
    /// JSON file holding any subset of the run configuration.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the target HTTP API.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Realtime endpoint (`ws://` or `wss://`).
    #[arg(long)]
    pub ws_url: Option<String>,

    #[arg(short, long)]
    pub users: Option<usize>,

    /// Max in-flight registrations and concurrently open sessions.
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Chat messages each user sends.
    #[arg(short, long)]
    pub messages: Option<usize>,

    /// Pause between chat messages, e.g. `100ms`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub message_interval: Option<Duration>,

    #[arg(long, value_parser = humantime::parse_duration)]
    pub heartbeat_interval: Option<Duration>,

    /// Minimum time each session stays connected, e.g. `5m`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub session_hold: Option<Duration>,

    #[arg(long, value_parser = humantime::parse_duration)]
    pub ack_timeout: Option<Duration>,

    /// Give up on a WebSocket handshake after this long.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Give up on a registration request after this long.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub registration_timeout: Option<Duration>,

    #[arg(long)]
    pub typing_cycles: Option<usize>,

    #[arg(long, value_parser = humantime::parse_duration)]
    pub typing_unit: Option<Duration>,

    #[arg(long, value_parser = humantime::parse_duration)]
    pub drain_poll_interval: Option<Duration>,

    #[arg(long)]
    pub conversation_id: Option<i64>,

    #[arg(long)]
    pub password: Option<String>,

    /// Where to write the JSON report.
    #[arg(short = 'o', long)]
    pub report: Option<PathBuf>,

    /// Serve Prometheus metrics on this address while the test runs.
    #[arg(long)]
    pub metrics_listener: Option<SocketAddr>,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config, CliError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        fn set<T: Clone>(field: &mut T, flag: &Option<T>) {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }

        set(&mut config.target_base_url, &self.base_url);
        set(&mut config.ws_url, &self.ws_url);
        set(&mut config.total_users, &self.users);
        set(&mut config.batch_size, &self.batch_size);
        set(&mut config.messages_per_user, &self.messages);
        set(&mut config.message_interval, &self.message_interval);
        set(&mut config.heartbeat_interval, &self.heartbeat_interval);
        set(&mut config.session_hold, &self.session_hold);
        set(&mut config.ack_timeout, &self.ack_timeout);
        set(&mut config.connect_timeout, &self.connect_timeout);
        set(&mut config.registration_timeout, &self.registration_timeout);
        set(&mut config.typing_cycles, &self.typing_cycles);
        set(&mut config.typing_unit, &self.typing_unit);
        set(&mut config.drain_poll_interval, &self.drain_poll_interval);
        set(&mut config.conversation_id, &self.conversation_id);
        set(&mut config.password, &self.password);
        set(&mut config.report_path, &self.report);
    }
}

fn read_config(path: &Path) -> Result<Config, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
