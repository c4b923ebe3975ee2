use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/api/ws";

/// Path (relative to the base URL) of the registration endpoint.
pub const REGISTER_PATH: &str = "/api/auth/register";

pub const DEFAULT_TOTAL_USERS: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MESSAGES_PER_USER: usize = 10;

pub const DEFAULT_MESSAGE_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_SESSION_HOLD: Duration = Duration::from_secs(300);
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_TYPING_UNIT: Duration = Duration::from_secs(1);
pub const DEFAULT_DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const DEFAULT_TYPING_CYCLES: usize = 5;

/// Every simulated user talks in the same conversation.
pub const DEFAULT_CONVERSATION_ID: i64 = 1;

pub const DEFAULT_PASSWORD: &str = "testpass123";
pub const DEFAULT_REPORT_PATH: &str = "load_test_report.json";

/// Mean latency bounds (exclusive) for the report assessment, in milliseconds.
pub const EXCELLENT_LATENCY_MS: f64 = 100.;
pub const GOOD_LATENCY_MS: f64 = 200.;
pub const ACCEPTABLE_LATENCY_MS: f64 = 500.;
