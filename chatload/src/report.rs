use crate::error::ReportError;
use chatload_core::Report;
use std::path::Path;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

const RULE: &str = "================================================================================";
const TITLE: &str = "CHAT APPLICATION LOAD TEST REPORT";

/// Console rendering: a banner, the report as pretty JSON, and the assessment line.
pub fn render(report: &Report) -> Result<String, ReportError> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(format!(
        "\n{RULE}\n{TITLE}\n{RULE}\n{json}\n{RULE}\n{}\n",
        report.assessment
    ))
}

/// Writes the report as pretty JSON, replacing any previous file at `path`.
pub async fn persist(report: &Report, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json).await?;
    info!("Detailed report saved to {}", path.display());
    Ok(())
}
