use chatload_core::{ConfigError, ErrorCategory};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Registration failed: {0}")]
    Status(reqwest::StatusCode),

    #[error("Registration error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Registration response carried no token")]
    MissingToken,
}

/// Failures while wiring up a run, before any traffic is sent.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failures on a realtime connection.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Error in Tungstenite: {0}")]
    Tungstenite(#[from] tungstenite::Error),

    #[error("Error encoding frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Connection closed")]
    Closed,

    #[error("No response within {0:?}")]
    TimedOut(Duration),
}

impl WireError {
    /// Whether the connection is unusable after this error. Undecodable frames are not.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Encode(_) | Self::Tungstenite(tungstenite::Error::Utf8)
        )
    }
}

/// Anything that ends a session early. Each variant maps onto the category it is recorded as.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session URL: {0}")]
    Url(#[from] ConfigError),

    #[error("Connection failed: {0}")]
    Connect(#[source] WireError),

    #[error("Connection lost while awaiting ack for message {sequence}: {source}")]
    AckLost {
        sequence: usize,
        #[source]
        source: WireError,
    },

    #[error("Send failed: {0}")]
    Send(#[source] WireError),

    #[error("Session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Url(_) | Self::Connect(_) => ErrorCategory::ConnectionFailure,
            Self::AckLost { .. } => ErrorCategory::ProtocolError,
            Self::Send(_) | Self::Task(_) => ErrorCategory::SessionFailure,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("No users created, aborting test ({requested} requested)")]
    NoUsersProvisioned { requested: usize },

    #[error("Test interrupted by user")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Error serializing report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Error writing report: {0}")]
    Io(#[from] std::io::Error),
}

/// Message recorded when an ack does not arrive in time.
pub(crate) fn ack_timeout_detail(username: &str, sequence: usize, timeout: Duration) -> String {
    format!(
        "Message timeout: {username} message {sequence} after {}",
        humantime::format_duration(timeout)
    )
}
