use anyhow::Context;
use chatload::{cli::Cli, report};
use clap::Parser;
#[cfg(feature = "metrics")]
use metrics_exporter_prometheus::PrometheusBuilder;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatload=info,chatload_core=info"));
    FmtSubscriber::builder().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_listener {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Unable to start Prometheus exporter")?;
        info!("Serving metrics on {addr}");
    }
    #[cfg(not(feature = "metrics"))]
    if cli.metrics_listener.is_some() {
        warn!("Built without the `metrics` feature; ignoring --metrics-listener");
    }

    let orchestrator = chatload::orchestrator(config)?;
    let record = tokio::select! {
        record = orchestrator.run() => record,
        _ = interrupt() => {
            info!("Test interrupted by user");
            orchestrator.interrupted()
        }
    };

    let config = orchestrator.config();
    let report = record.report(config);
    println!("{}", report::render(&report)?);
    report::persist(&report, &config.report_path)
        .await
        .with_context(|| format!("Saving report to {}", config.report_path.display()))?;
    info!("{report}");

    match record.aborted {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
}
