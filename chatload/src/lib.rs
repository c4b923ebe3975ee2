//! Concurrent load-test harness for real-time chat services.
//!
//! A run provisions synthetic accounts over HTTP, opens one WebSocket session per account in
//! bounded batches, measures chat acknowledgement latency, and summarizes everything into a
//! [`Report`](chatload_core::Report).
pub mod cli;
pub mod error;
pub mod heartbeat;
pub mod orchestrator;
pub mod provisioner;
pub mod report;
pub mod session;
pub mod wire;

use chatload_core::Config;
use error::SetupError;
use orchestrator::Orchestrator;
use provisioner::HttpRegistrar;
use wire::WsConnector;

/// Orchestrator wired to the real target service: HTTP registration and WebSocket sessions.
pub fn orchestrator(
    config: Config,
) -> Result<Orchestrator<HttpRegistrar, WsConnector>, SetupError> {
    let registrar = HttpRegistrar::new(&config)?;
    Ok(Orchestrator::new(config, registrar, WsConnector)?)
}

pub mod prelude {
    pub use crate::orchestrator::{Orchestrator, RunRecord};
    pub use crate::provisioner::{HttpRegistrar, Identity, Registrar};
    pub use crate::session::{SessionOutcome, SessionState};
    pub use crate::wire::{ChatSink, ChatSource, Connector, WsConnector};
    pub use chatload_core::{Assessment, Config, ErrorCategory, Report, RunStatus};
}
