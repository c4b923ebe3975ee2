use crate::config::Config;
use crate::constants::{ACCEPTABLE_LATENCY_MS, EXCELLENT_LATENCY_MS, GOOD_LATENCY_MS};
use crate::metrics::{ErrorCategory, MetricsSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Final, immutable summary of one run. Serialized as the persisted report artifact.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub test_summary: TestSummary,
    /// `None` when no chat message was ever acknowledged.
    pub performance_metrics: Option<PerformanceMetrics>,
    pub error_analysis: ErrorAnalysis,
    pub assessment: Assessment,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted { reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TestSummary {
    pub status: RunStatus,
    pub requested_users: usize,
    pub total_users: usize,
    pub concurrent_users: usize,
    pub peak_active_connections: usize,
    pub test_duration_seconds: f64,
    pub messages_per_user: usize,
    pub total_messages_sent: u64,
    pub total_errors: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub sample_count: usize,
    pub average_response_time_ms: f64,
    pub median_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    #[serde(rename = "95th_percentile_ms")]
    pub p95_response_time_ms: f64,
    #[serde(rename = "99th_percentile_ms")]
    pub p99_response_time_ms: f64,
    pub messages_per_second: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorAnalysis {
    pub error_types: BTreeMap<ErrorCategory, usize>,
    pub error_rate: f64,
}

/// Qualitative verdict on the mean acknowledgement latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    Excellent,
    Good,
    Acceptable,
    NeedsImprovement,
}

impl Assessment {
    /// Buckets a mean latency. A run without samples has no evidence of being fast and is
    /// treated as needing improvement.
    pub fn from_mean_latency(mean_ms: Option<f64>) -> Self {
        match mean_ms {
            Some(ms) if ms < EXCELLENT_LATENCY_MS => Self::Excellent,
            Some(ms) if ms < GOOD_LATENCY_MS => Self::Good,
            Some(ms) if ms < ACCEPTABLE_LATENCY_MS => Self::Acceptable,
            _ => Self::NeedsImprovement,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Acceptable => "ACCEPTABLE",
            Self::NeedsImprovement => "NEEDS_IMPROVEMENT",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Sub-100ms latency achieved",
            Self::Good => "Under 200ms latency",
            Self::Acceptable => "Under 500ms latency",
            Self::NeedsImprovement => "High latency detected",
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.description())
    }
}

impl Report {
    pub fn new(
        config: &Config,
        total_users: usize,
        elapsed: Duration,
        snapshot: &MetricsSnapshot,
        status: RunStatus,
    ) -> Self {
        let latencies: Vec<f64> = snapshot
            .latencies
            .iter()
            .map(|sample| sample.response_time_ms)
            .collect();

        let performance_metrics = PerformanceMetrics::from_samples(
            &latencies,
            snapshot.success_count,
            elapsed,
        );

        let total_errors = snapshot.errors.len();
        let mut error_types = BTreeMap::new();
        for record in &snapshot.errors {
            *error_types.entry(record.category).or_insert(0) += 1;
        }

        let assessment = Assessment::from_mean_latency(
            performance_metrics
                .as_ref()
                .map(|metrics| metrics.average_response_time_ms),
        );

        Self {
            test_summary: TestSummary {
                status,
                requested_users: config.total_users,
                total_users,
                concurrent_users: config.batch_size,
                peak_active_connections: snapshot.peak_connections,
                test_duration_seconds: elapsed.as_secs_f64(),
                messages_per_user: config.messages_per_user,
                total_messages_sent: snapshot.success_count,
                total_errors,
            },
            performance_metrics,
            error_analysis: ErrorAnalysis {
                error_types,
                error_rate: error_rate(snapshot.success_count, total_errors),
            },
            assessment,
        }
    }
}

impl PerformanceMetrics {
    pub fn from_samples(latencies: &[f64], successes: u64, elapsed: Duration) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }

        let mut sorted = latencies.to_vec();
        sorted.sort_by(f64::total_cmp);

        let secs = elapsed.as_secs_f64();
        let messages_per_second = if secs > 0. {
            successes as f64 / secs
        } else {
            0.
        };

        Some(Self {
            sample_count: sorted.len(),
            average_response_time_ms: statistical::mean(&sorted),
            median_response_time_ms: statistical::median(&sorted),
            min_response_time_ms: sorted[0],
            max_response_time_ms: sorted[sorted.len() - 1],
            p95_response_time_ms: percentile(&sorted, 95.)?,
            p99_response_time_ms: percentile(&sorted, 99.)?,
            messages_per_second,
        })
    }
}

/// Nearest-rank percentile over an ascending slice: the value at index `ceil(p/100 * n) - 1`,
/// clamped to the slice bounds.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let rank = (p / 100. * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Fraction of attempts that failed; 0 when nothing was attempted.
pub fn error_rate(successes: u64, errors: usize) -> f64 {
    let total = successes + errors as u64;
    if total == 0 {
        0.
    } else {
        errors as f64 / total as f64
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = &self.test_summary;
        write!(
            f,
            "users={}/{}, duration={}, sent={}, errors={}, error_rate={:.2}",
            summary.total_users,
            summary.requested_users,
            humantime::format_duration(Duration::from_millis(
                (summary.test_duration_seconds * 1e3) as u64
            )),
            summary.total_messages_sent,
            summary.total_errors,
            self.error_analysis.error_rate,
        )?;

        if let Some(perf) = &self.performance_metrics {
            write!(
                f,
                ", mean={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms",
                perf.average_response_time_ms,
                perf.median_response_time_ms,
                perf.p95_response_time_ms,
                perf.p99_response_time_ms,
            )?;
        }

        write!(f, ", assessment={}", self.assessment.label())
    }
}
