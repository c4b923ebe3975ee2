use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

/// Failure taxonomy. Every recoverable anomaly in a run lands in exactly one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    RegistrationFailure,
    ConnectionFailure,
    AckTimeout,
    ProtocolError,
    SessionFailure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegistrationFailure => "RegistrationFailure",
            Self::ConnectionFailure => "ConnectionFailure",
            Self::AckTimeout => "AckTimeout",
            Self::ProtocolError => "ProtocolError",
            Self::SessionFailure => "SessionFailure",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub response_time_ms: f64,
}

impl From<Duration> for LatencySample {
    fn from(elapsed: Duration) -> Self {
        Self {
            response_time_ms: elapsed.as_secs_f64() * 1e3,
        }
    }
}

/// Run-wide aggregate shared by every provisioning and session task.
///
/// Latency samples and error records are append-only and kept in arrival order; the success
/// counter only grows. Writers never block each other for longer than a `Vec::push`.
#[derive(Debug, Default)]
pub struct MetricsSink {
    latencies: Mutex<Vec<LatencySample>>,
    errors: Mutex<Vec<ErrorRecord>>,
    success: AtomicU64,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MetricsSink {
    pub fn new() -> Arc<Self> {
        #[cfg(feature = "metrics")]
        describe();

        Arc::new(Self::default())
    }

    /// An acknowledged chat message: one latency sample plus one success.
    pub fn record_ack(&self, elapsed: Duration) {
        let sample = LatencySample::from(elapsed);
        lock(&self.latencies).push(sample);
        self.success.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            metrics::histogram!("chatload.ack_latency").record(sample.response_time_ms);
            metrics::counter!("chatload.success").increment(1);
        }
    }

    pub fn record_error(&self, category: ErrorCategory, detail: impl Into<String>) {
        let detail = detail.into();
        trace!("Recording {category}: {detail}");
        lock(&self.errors).push(ErrorRecord { category, detail });

        #[cfg(feature = "metrics")]
        metrics::counter!("chatload.error", "category" => category.as_str()).increment(1);
    }

    /// Claims one slot of the active-connection gauge. The slot is released when the returned
    /// guard is dropped, whichever way the owning session ends.
    pub fn connection_opened(self: &Arc<Self>) -> ActiveConnection {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        #[cfg(feature = "metrics")]
        metrics::gauge!("chatload.active_connections").increment(1.);

        ActiveConnection {
            sink: Arc::clone(self),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            latencies: lock(&self.latencies).clone(),
            errors: lock(&self.errors).clone(),
            success_count: self.success_count(),
            active_connections: self.active_connections(),
            peak_connections: self.peak_connections(),
        }
    }
}

/// Gauge slot held by a live session.
#[derive(Debug)]
pub struct ActiveConnection {
    sink: Arc<MetricsSink>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.sink.active.fetch_sub(1, Ordering::SeqCst);

        #[cfg(feature = "metrics")]
        metrics::gauge!("chatload.active_connections").decrement(1.);
    }
}

/// Point-in-time copy of a [`MetricsSink`], taken once every writer has finished.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub latencies: Vec<LatencySample>,
    pub errors: Vec<ErrorRecord>,
    pub success_count: u64,
    pub active_connections: usize,
    pub peak_connections: usize,
}

impl MetricsSnapshot {
    pub fn errors_of(&self, category: ErrorCategory) -> usize {
        self.errors
            .iter()
            .filter(|record| record.category == category)
            .count()
    }
}

// NOTE: A panic while holding the lock can only interrupt a push, which leaves the Vec intact.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(feature = "metrics")]
fn describe() {
    metrics::describe_histogram!(
        "chatload.ack_latency",
        metrics::Unit::Milliseconds,
        "Round trip from chat send to first inbound frame"
    );
    metrics::describe_counter!("chatload.success", "Acknowledged chat messages");
    metrics::describe_counter!("chatload.error", "Recorded errors by category");
    metrics::describe_gauge!("chatload.active_connections", "Open realtime connections");
}
