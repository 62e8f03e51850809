use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::ApiError;
use crate::core::codegen::templates::{STARTER_TEMPLATES, StarterTemplate};
use crate::core::generation::{
    GeneratedAppRecord, GeneratedCode, GenerationError, GenerationStatus, GenerationSummary,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    template_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    id: String,
    status: GenerationStatus,
    fhir_resources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sandbox_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    github_repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl From<GeneratedAppRecord> for StatusResponse {
    fn from(job: GeneratedAppRecord) -> Self {
        Self {
            id: job.id,
            status: job.status,
            fhir_resources: job.fhir_resources,
            sandbox_url: job.sandbox_url,
            github_repo_url: job.github_repo_url,
            error_message: job.error_message,
        }
    }
}

/// List entry: the status view plus what the caller asked for.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationListItem {
    prompt: String,
    template_id: Option<String>,
    created_at: String,
    updated_at: String,
    #[serde(flatten)]
    status: StatusResponse,
}

pub async fn generate_endpoint(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GenerationSummary>), ApiError> {
    let Json(payload) = payload?;
    let template_id = payload
        .template_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let summary = state
        .orchestrator
        .run_generation(&payload.prompt, &user_id, template_id)
        .await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Load a job owned by the caller. Other users' jobs read as missing.
async fn owned_job(
    state: &AppState,
    user_id: &str,
    id: &str,
) -> Result<GeneratedAppRecord, ApiError> {
    let job = state.orchestrator.service().get_status(id).await?;
    if job.user_id != user_id {
        return Err(GenerationError::NotFound(id.to_string()).into());
    }
    Ok(job)
}

pub async fn status_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = owned_job(&state, &user_id, &id).await?;
    Ok(Json(job.into()))
}

pub async fn list_generations_endpoint(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let jobs = state.orchestrator.service().list_for_user(&user_id).await?;
    let generations: Vec<GenerationListItem> = jobs
        .into_iter()
        .map(|job| GenerationListItem {
            prompt: job.prompt.clone(),
            template_id: job.template_id.clone(),
            created_at: job.created_at.clone(),
            updated_at: job.updated_at.clone(),
            status: job.into(),
        })
        .collect();
    Ok(Json(serde_json::json!({ "generations": generations })))
}

pub async fn generated_code_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<GeneratedCode>, ApiError> {
    let job = owned_job(&state, &user_id, &id).await?;
    job.generated_code
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No generated code for this generation yet".to_string()))
}

pub async fn templates_endpoint() -> Json<&'static [StarterTemplate]> {
    Json(STARTER_TEMPLATES)
}
