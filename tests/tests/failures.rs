mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;
    use chatload::error::{RegistrationError, RunError};
    use chatload::prelude::*;
    use mock_service::{MockConfig, Registration};
    use std::time::{Duration, Instant};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn rejected_registrations_abort_the_run() {
        let mock = MockConfig {
            registration: Registration::RejectAll,
            ..Default::default()
        };
        let (server, config) = setup(mock, 4, 2, 3).await;

        let orchestrator = chatload::orchestrator(config).unwrap();
        let record = orchestrator.run().await;

        assert!(matches!(
            record.aborted,
            Some(RunError::NoUsersProvisioned { requested: 4 })
        ));
        assert_eq!(
            record.snapshot.errors_of(ErrorCategory::RegistrationFailure),
            4
        );
        assert_eq!(server.stats().connections, 0);

        let report = record.report(orchestrator.config());
        assert_eq!(report.test_summary.total_users, 0);
        assert!(report.performance_metrics.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["performance_metrics"].is_null());
        assert_eq!(json["test_summary"]["status"]["state"], "aborted");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn partial_registration_runs_the_rest() {
        let mock = MockConfig {
            registration: Registration::AcceptFirst(4),
            ..Default::default()
        };
        let (server, config) = setup(mock, 6, 3, 2).await;

        let orchestrator = chatload::orchestrator(config).unwrap();
        let record = orchestrator.run().await;

        assert!(record.aborted.is_none());
        assert_eq!(record.total_users, 4);
        assert_eq!(record.batches, 2);
        assert_eq!(
            record.snapshot.errors_of(ErrorCategory::RegistrationFailure),
            2
        );
        assert_eq!(server.stats().connections, 4);
    }

    /// Hands out tokens the service has never issued.
    struct ForgedRegistrar;

    impl Registrar for ForgedRegistrar {
        async fn register(
            &self,
            identity: &Identity,
        ) -> Result<chatload_core::UserCredential, RegistrationError> {
            Ok(chatload_core::UserCredential {
                username: identity.username.clone(),
                auth_token: "forged".to_string(),
                user_id: String::new(),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn unknown_token_is_a_connection_failure() {
        let (server, config) = setup(MockConfig::default(), 3, 3, 2).await;

        let orchestrator = Orchestrator::new(config, ForgedRegistrar, WsConnector).unwrap();
        let record = orchestrator.run().await;

        assert!(record.aborted.is_none());
        assert_eq!(
            record.snapshot.errors_of(ErrorCategory::ConnectionFailure),
            3
        );
        assert_eq!(record.snapshot.peak_connections, 0);
        assert!(record
            .sessions
            .iter()
            .all(|outcome| outcome.state == SessionState::Failed));
        assert_eq!(server.stats().unauthorized, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn silent_registration_endpoint_times_out() {
        init();
        let addr = silent_listener().await;
        let config = Config {
            target_base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/api/ws"),
            total_users: 3,
            batch_size: 3,
            registration_timeout: Duration::from_millis(300),
            ..Default::default()
        };

        let start = Instant::now();
        let record = chatload::orchestrator(config).unwrap().run().await;

        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            record.aborted,
            Some(RunError::NoUsersProvisioned { requested: 3 })
        ));
        assert_eq!(
            record.snapshot.errors_of(ErrorCategory::RegistrationFailure),
            3
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn silent_realtime_endpoint_times_out() {
        let (_server, mut config) = setup(MockConfig::default(), 3, 3, 2).await;
        let addr = silent_listener().await;
        config.ws_url = format!("ws://{addr}/api/ws");
        config.connect_timeout = Duration::from_millis(300);

        let start = Instant::now();
        let orchestrator = Orchestrator::new(config, ForgedRegistrar, WsConnector).unwrap();
        let record = orchestrator.run().await;

        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(record.aborted.is_none());
        assert_eq!(
            record.snapshot.errors_of(ErrorCategory::ConnectionFailure),
            3
        );
        assert_eq!(record.snapshot.peak_connections, 0);
        assert!(record
            .sessions
            .iter()
            .all(|outcome| outcome.failure == Some(ErrorCategory::ConnectionFailure)));
    }

    #[tokio::test]
    async fn unreachable_service_records_registration_failures() {
        init();
        let config = Config {
            target_base_url: "http://127.0.0.1:1".to_string(),
            ws_url: "ws://127.0.0.1:1/api/ws".to_string(),
            total_users: 2,
            batch_size: 2,
            ..Default::default()
        };

        let record = chatload::orchestrator(config).unwrap().run().await;

        assert!(matches!(
            record.aborted,
            Some(RunError::NoUsersProvisioned { .. })
        ));
        assert_eq!(
            record.snapshot.errors_of(ErrorCategory::RegistrationFailure),
            2
        );
    }
}
