use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::analysis::{ErrorResponse, run_analysis};
use crate::database::{DEFAULT_REPORT_LIMIT, ReportStore};
use crate::error::{AnalysisError, StoreError};
use crate::loader::UploadedFile;
use crate::narrative::NarrativeGenerator;

pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    pub upload_limit_bytes: usize,
}

/// Builds the HTTP surface: `/analyze`, `/reports` and `/reports/{id}`.
pub fn app(state: Arc<AppState>) -> Router {
    let upload_limit = state.upload_limit_bytes;
    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/reports", get(list_reports_handler))
        .route("/reports/{id}", get(get_report_handler))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn collect_uploads(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, AnalysisError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnalysisError::Upload(e.to_string()))?
    {
        // Plain form fields carry no filename.
        let filename = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AnalysisError::parse(&filename, e))?;
        files.push(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

async fn analyze_handler(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    info!("Endpoint /analyze called");

    let result = match collect_uploads(&mut multipart).await {
        Ok(files) => run_analysis(files, &*state.narrator, &*state.store).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => {
            info!(
                "Analysis complete (report_id: {}, status: {})",
                response.report_id, response.health_status
            );
            Json(response).into_response()
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            Json(ErrorResponse {
                error: e.to_string(),
            })
            .into_response()
        }
    }
}

#[derive(Deserialize)]
struct ReportsQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct DetailResponse {
    detail: String,
}

fn store_error_response(e: StoreError) -> Response {
    let (status, detail) = match e {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "Report not found".to_string()),
        StoreError::Database(e) => {
            error!("Error reading reports: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read reports: {}", e),
            )
        }
    };
    (status, Json(DetailResponse { detail })).into_response()
}

async fn list_reports_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_REPORT_LIMIT);
    match state.store.list(limit).await {
        Ok(reports) => Json(reports).into_response(),
        Err(e) => store_error_response(e),
    }
}

async fn get_report_handler(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match state.store.get(id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => store_error_response(e),
    }
}
