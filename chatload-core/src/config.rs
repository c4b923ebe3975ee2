use crate::constants::*;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Parameters for a single load test run.
///
/// Built once before the run starts (defaults, then an optional JSON file, then command line
/// flags) and shared read-only with every component afterwards.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target_base_url: String,
    pub ws_url: String,
    pub total_users: usize,
    /// Ceiling on in-flight registrations and on concurrently open sessions.
    pub batch_size: usize,
    pub messages_per_user: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "message_interval_ms")]
    pub message_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "heartbeat_interval_ms")]
    pub heartbeat_interval: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "session_hold_seconds")]
    pub session_hold: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "ack_timeout_ms")]
    pub ack_timeout: Duration,
    /// Deadline for opening a realtime connection, handshake included.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "connect_timeout_ms")]
    pub connect_timeout: Duration,
    /// Deadline for a whole registration request.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "registration_timeout_ms")]
    pub registration_timeout: Duration,
    pub typing_cycles: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "typing_unit_ms")]
    pub typing_unit: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "drain_poll_interval_ms")]
    pub drain_poll_interval: Duration,
    pub conversation_id: i64,
    pub password: String,
    pub report_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            total_users: DEFAULT_TOTAL_USERS,
            batch_size: DEFAULT_BATCH_SIZE,
            messages_per_user: DEFAULT_MESSAGES_PER_USER,
            message_interval: DEFAULT_MESSAGE_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            session_hold: DEFAULT_SESSION_HOLD,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            registration_timeout: DEFAULT_REGISTRATION_TIMEOUT,
            typing_cycles: DEFAULT_TYPING_CYCLES,
            typing_unit: DEFAULT_TYPING_UNIT,
            drain_poll_interval: DEFAULT_DRAIN_POLL_INTERVAL,
            conversation_id: DEFAULT_CONVERSATION_ID,
            password: DEFAULT_PASSWORD.to_string(),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("total_users must be at least 1")]
    ZeroUsers,

    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("Invalid URL in `{field}`: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },

    #[error("Unsupported scheme `{scheme}` in `{field}`, expected one of {expected:?}")]
    UnsupportedScheme {
        field: &'static str,
        scheme: String,
        expected: &'static [&'static str],
    },
}

impl Config {
    /// Checks the parameters that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_users == 0 {
            return Err(ConfigError::ZeroUsers);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }

        check_scheme("target_base_url", &self.target_base_url, &["http", "https"])?;
        check_scheme("ws_url", &self.ws_url, &["ws", "wss"])?;
        Ok(())
    }

    pub fn registration_url(&self) -> Result<Url, ConfigError> {
        let raw = format!(
            "{}{}",
            self.target_base_url.trim_end_matches('/'),
            REGISTER_PATH
        );
        Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            field: "target_base_url",
            source,
        })
    }

    /// Realtime endpoint for one user, authenticated through the `token` query parameter.
    pub fn session_url(&self, auth_token: &str) -> Result<Url, ConfigError> {
        let mut url = parse_url("ws_url", &self.ws_url)?;
        url.query_pairs_mut().append_pair("token", auth_token);
        Ok(url)
    }

    /// Number of batches the given amount of work splits into.
    pub fn batch_count(&self, items: usize) -> usize {
        items.div_ceil(self.batch_size.max(1))
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn check_scheme(
    field: &'static str,
    raw: &str,
    expected: &'static [&'static str],
) -> Result<(), ConfigError> {
    let url = parse_url(field, raw)?;
    if expected.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
            expected,
        })
    }
}
