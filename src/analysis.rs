use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregator::aggregate;
use crate::database::ReportStore;
use crate::error::AnalysisError;
use crate::loader::{UploadedFile, load_files};
use crate::models::{HealthStatus, NewReport, SaveOutcome};
use crate::narrative::{NarrativeGenerator, narrate};

pub const SUCCESS_STATUS: &str = "Success";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub status: String,
    pub report_id: i64,
    pub file_count: usize,
    pub revenue: f64,
    pub expenses: f64,
    pub net_profit: f64,
    pub margin: f64,
    pub health_status: HealthStatus,
    pub ai_analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Runs one upload through load, aggregate, narrate and save.
///
/// Only input problems fail the call. A failing completion service yields the
/// fallback narrative and a failing store yields report id `-1`.
pub async fn run_analysis(
    files: Vec<UploadedFile>,
    narrator: &dyn NarrativeGenerator,
    store: &dyn ReportStore,
) -> Result<AnalyzeResponse, AnalysisError> {
    if files.is_empty() {
        return Err(AnalysisError::Validation("No valid files found".to_string()));
    }
    let file_count = files.len();

    // Parsing and summing are CPU-bound; keep them off the async workers.
    let metrics = tokio::task::spawn_blocking(move || load_files(&files).and_then(aggregate))
        .await
        .map_err(|e| AnalysisError::Internal(format!("File processing task failed: {}", e)))??;
    info!(
        "Aggregated {} file(s): revenue={} expenses={} margin={}",
        file_count, metrics.revenue, metrics.expenses, metrics.margin
    );

    let ai_analysis = narrate(narrator, &metrics).await;

    let outcome = store
        .save(NewReport::from_metrics(file_count, &metrics, &ai_analysis))
        .await;
    if let SaveOutcome::Failed(reason) = &outcome {
        warn!("Report not persisted, returning unsaved id: {}", reason);
    }

    Ok(AnalyzeResponse {
        status: SUCCESS_STATUS.to_string(),
        report_id: outcome.report_id(),
        file_count,
        revenue: metrics.revenue,
        expenses: metrics.expenses,
        net_profit: metrics.net_profit,
        margin: metrics.margin,
        health_status: metrics.health_status,
        ai_analysis,
    })
}
