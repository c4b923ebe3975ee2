mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;
    use chatload::report;
    use mock_service::MockConfig;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn persisted_report_has_every_section() {
        let (_server, mut config) = setup(MockConfig::default(), 4, 2, 2).await;
        config.report_path = report_path("artifact");

        let orchestrator = chatload::orchestrator(config).unwrap();
        let record = orchestrator.run().await;
        let config = orchestrator.config();
        let report = record.report(config);

        let rendered = report::render(&report).unwrap();
        assert!(rendered.contains("CHAT APPLICATION LOAD TEST REPORT"));
        assert!(rendered.contains(&report.assessment.to_string()));

        report::persist(&report, &config.report_path).await.unwrap();
        let raw = tokio::fs::read_to_string(&config.report_path).await.unwrap();
        let _ = tokio::fs::remove_file(&config.report_path).await;

        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["test_summary"]["total_users"], 4);
        assert_eq!(json["test_summary"]["messages_per_user"], 2);
        assert_eq!(json["test_summary"]["status"]["state"], "completed");
        assert!(json["performance_metrics"]["95th_percentile_ms"].is_number());
        assert!(json["performance_metrics"]["99th_percentile_ms"].is_number());
        assert!(json["error_analysis"]["error_rate"].is_number());
        assert!(json["assessment"].is_string());
    }
}
