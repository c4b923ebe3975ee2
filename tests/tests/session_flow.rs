mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;
    use chatload::prelude::*;
    use mock_service::{AckMode, MockConfig};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn ten_users_in_two_batches() {
        let (server, config) = setup(MockConfig::default(), 10, 5, 3).await;

        let orchestrator = chatload::orchestrator(config).unwrap();
        let record = orchestrator.run().await;

        assert!(record.aborted.is_none());
        assert_eq!(record.total_users, 10);
        assert_eq!(record.batches, 2);
        assert_eq!(record.sessions.len(), 10);

        // Every chat is either acknowledged or timed out.
        let snapshot = &record.snapshot;
        let timeouts = snapshot.errors_of(ErrorCategory::AckTimeout);
        assert!(snapshot.success_count <= 30);
        assert_eq!(snapshot.success_count as usize + timeouts, 30);
        assert_eq!(snapshot.errors.len(), timeouts);

        assert_eq!(snapshot.active_connections, 0);
        assert!(snapshot.peak_connections <= 5);
        assert!(snapshot.peak_connections >= 1);

        let stats = server.stats();
        assert_eq!(stats.registrations, 10);
        assert_eq!(stats.connections, 10);
        assert_eq!(stats.chats, 30);
        assert_eq!(stats.typing, 20);
        assert!(stats.heartbeats >= 10);
        assert_eq!(stats.unauthorized, 0);

        let report = record.report(orchestrator.config());
        assert_eq!(report.test_summary.status, RunStatus::Completed);
        assert_eq!(report.test_summary.total_users, 10);
        assert_eq!(report.test_summary.concurrent_users, 5);
        assert!(report.performance_metrics.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn silent_service_times_out_every_message() {
        let mock = MockConfig {
            acks: AckMode::Never,
            ..Default::default()
        };
        let (server, mut config) = setup(mock, 2, 2, 2).await;
        config.ack_timeout = Duration::from_millis(100);

        let orchestrator = chatload::orchestrator(config).unwrap();
        let record = orchestrator.run().await;

        assert!(record.aborted.is_none());
        assert_eq!(record.snapshot.success_count, 0);
        assert_eq!(record.snapshot.errors_of(ErrorCategory::AckTimeout), 4);
        assert_eq!(server.stats().chats, 4);

        let report = record.report(orchestrator.config());
        assert!(report.performance_metrics.is_none());
        assert_eq!(report.error_analysis.error_rate, 1.);
        assert_eq!(report.assessment, Assessment::NeedsImprovement);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn slow_acks_show_up_in_latency() {
        let mock = MockConfig {
            acks: AckMode::Delayed(Duration::from_millis(120)),
            ..Default::default()
        };
        let (_server, config) = setup(mock, 3, 3, 2).await;

        let orchestrator = chatload::orchestrator(config).unwrap();
        let record = orchestrator.run().await;

        assert_eq!(record.snapshot.success_count, 6);
        assert!(record
            .snapshot
            .latencies
            .iter()
            .all(|sample| sample.response_time_ms >= 120.));

        let report = record.report(orchestrator.config());
        let perf = report.performance_metrics.unwrap();
        assert!(perf.min_response_time_ms >= 120.);
        assert!(perf.p99_response_time_ms >= perf.p95_response_time_ms);
        assert_ne!(report.assessment, Assessment::Excellent);
    }
}
