//! Top-level run driver: provision, run sessions batch by batch, drain, hand back a record.
use crate::error::{RunError, SessionError};
use crate::provisioner::{Provisioner, Registrar};
use crate::session::{SessionOutcome, SessionSimulator, SessionState};
use crate::wire::Connector;
use chatload_core::{
    Config, ConfigError, MetricsSink, MetricsSnapshot, Report, RunStatus, UserCredential,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Everything a finished (or abandoned) run leaves behind.
#[derive(Debug)]
pub struct RunRecord {
    /// Successfully provisioned users.
    pub total_users: usize,
    pub batches: usize,
    pub elapsed: Duration,
    pub snapshot: MetricsSnapshot,
    pub sessions: Vec<SessionOutcome>,
    /// Set when the run stopped before every session finished.
    pub aborted: Option<RunError>,
}

impl RunRecord {
    pub fn status(&self) -> RunStatus {
        match &self.aborted {
            None => RunStatus::Completed,
            Some(err) => RunStatus::Aborted {
                reason: err.to_string(),
            },
        }
    }

    pub fn report(&self, config: &Config) -> Report {
        Report::new(
            config,
            self.total_users,
            self.elapsed,
            &self.snapshot,
            self.status(),
        )
    }
}

pub struct Orchestrator<R, C> {
    config: Arc<Config>,
    registrar: Arc<R>,
    connector: Arc<C>,
    metrics: Arc<MetricsSink>,
    provisioned: AtomicUsize,
    started: OnceLock<Instant>,
}

impl<R, C> Orchestrator<R, C>
where
    R: Registrar + Send + Sync + 'static,
    C: Connector + Send + Sync + 'static,
{
    pub fn new(config: Config, registrar: R, connector: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            registrar: Arc::new(registrar),
            connector: Arc::new(connector),
            metrics: MetricsSink::new(),
            provisioned: AtomicUsize::new(0),
            started: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsSink> {
        &self.metrics
    }

    #[instrument(
        name = "run",
        skip_all,
        fields(users = self.config.total_users, batch_size = self.config.batch_size)
    )]
    pub async fn run(&self) -> RunRecord {
        info!("Starting chat application load test...");
        let start = *self.started.get_or_init(Instant::now);

        let users = Provisioner::new(
            self.config.clone(),
            self.registrar.clone(),
            self.metrics.clone(),
        )
        .provision()
        .await;
        self.provisioned.store(users.len(), Ordering::SeqCst);

        if users.is_empty() {
            let err = RunError::NoUsersProvisioned {
                requested: self.config.total_users,
            };
            error!("{err}");
            return self.record(start.elapsed(), 0, vec![], Some(err));
        }

        info!("Starting load test with {} users...", users.len());
        let batches = self.config.batch_count(users.len());
        let mut sessions = Vec::with_capacity(users.len());

        for (idx, batch) in users.chunks(self.config.batch_size).enumerate() {
            sessions.extend(self.run_batch(batch).await);
            info!("Completed batch {}/{batches}", idx + 1);
        }

        self.drain().await;

        let elapsed = start.elapsed();
        info!(
            "Load test finished in {}",
            humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64))
        );
        self.record(elapsed, batches, sessions, None)
    }

    /// Record for a run whose `run()` future was dropped before finishing, e.g. on Ctrl-C.
    /// Session tasks of the interrupted batch are aborted along with that future.
    pub fn interrupted(&self) -> RunRecord {
        let elapsed = self
            .started
            .get()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        let users = self.provisioned.load(Ordering::SeqCst);
        self.record(
            elapsed,
            self.config.batch_count(users),
            vec![],
            Some(RunError::Interrupted),
        )
    }

    async fn run_batch(&self, batch: &[UserCredential]) -> Vec<SessionOutcome> {
        let simulator = SessionSimulator::new(
            self.config.clone(),
            self.connector.clone(),
            self.metrics.clone(),
        );

        // NOTE: Dropping the set aborts every session still in it.
        let mut set = JoinSet::new();
        let mut usernames = HashMap::with_capacity(batch.len());
        for credential in batch.iter().cloned() {
            let simulator = simulator.clone();
            let username = credential.username.clone();
            let handle =
                set.spawn(async move { simulator.run(&credential).await }.in_current_span());
            usernames.insert(handle.id(), username);
        }

        let mut outcomes = Vec::with_capacity(batch.len());
        while let Some(res) = set.join_next_with_id().await {
            match res {
                Ok((id, outcome)) => {
                    usernames.remove(&id);
                    outcomes.push(outcome);
                }
                Err(err) => {
                    let username = usernames.remove(&err.id()).unwrap_or_default();
                    let err = SessionError::from(err);
                    error!("User session error for {username}: {err}");
                    self.metrics
                        .record_error(err.category(), format!("{username}: {err}"));
                    outcomes.push(SessionOutcome {
                        username,
                        state: SessionState::Failed,
                        reached: SessionState::Connecting,
                        acked: 0,
                        timed_out: 0,
                        garbled: 0,
                        failure: Some(err.category()),
                    });
                }
            }
        }
        outcomes
    }

    async fn drain(&self) {
        loop {
            let active = self.metrics.active_connections();
            if active == 0 {
                return;
            }
            info!("Waiting for {active} connections to close...");
            sleep(self.config.drain_poll_interval).await;
        }
    }

    fn record(
        &self,
        elapsed: Duration,
        batches: usize,
        sessions: Vec<SessionOutcome>,
        aborted: Option<RunError>,
    ) -> RunRecord {
        RunRecord {
            total_users: self.provisioned.load(Ordering::SeqCst),
            batches,
            elapsed,
            snapshot: self.metrics.snapshot(),
            sessions,
            aborted,
        }
    }
}
