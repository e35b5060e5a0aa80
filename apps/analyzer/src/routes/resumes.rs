//! Axum route handlers for resume records and analysis.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::analysis::{list_resumes, load_resume, AnalysisRequest, Progress, ResumeRecord};
use crate::errors::AppError;
use crate::platform::FileBlob;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeRecord>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub id: Uuid,
    pub status: String,
    pub record: ResumeRecord,
}

fn require_auth(state: &AppState) -> Result<(), AppError> {
    if state.client.auth().session().is_authenticated {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
) -> Result<Json<ResumeListResponse>, AppError> {
    require_auth(&state)?;
    let resumes = list_resumes(state.client.kv()).await?;
    Ok(Json(ResumeListResponse { resumes }))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeRecord>, AppError> {
    require_auth(&state)?;
    load_resume(state.client.kv(), &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// POST /api/v1/resumes/analyze
///
/// Multipart form: `company-name`, `job-title`, `job-description`, `resume` (file).
/// Runs the full analysis pipeline and returns the stored record.
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    require_auth(&state)?;

    let mut request = AnalysisRequest {
        company_name: String::new(),
        job_title: String::new(),
        job_description: String::new(),
        resume: FileBlob::new("", None, Vec::new()),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "company-name" => request.company_name = read_text(field).await?,
            "job-title" => request.job_title = read_text(field).await?,
            "job-description" => request.job_description = read_text(field).await?,
            "resume" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable resume file: {e}")))?;
                request.resume = FileBlob::new(file_name, content_type, data);
            }
            _ => {}
        }
    }

    info!(
        "Analyzing resume '{}' for {} at {}",
        request.resume.name, request.job_title, request.company_name
    );
    let progress = Progress::new();
    let record = state.pipeline.analyze(request, &progress).await?;

    Ok(Json(AnalyzeResponse {
        id: record.id,
        status: progress.current(),
        record,
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form field: {e}")))
}
