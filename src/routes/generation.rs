use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::models::generation::{
    Generation, GenerateRequest, GenerationResultView, GenerationStatus, GenerationStatusView,
    HistoryQuery, SubmitResponse, SyncGenerationResult,
};
use crate::models::template::Template;
use crate::routes::auth::AuthUser;
use crate::services::generation::validate_image;

/// Pull `template_id` and `image` out of a multipart upload.
async fn read_generate_form(mut multipart: Multipart) -> Result<GenerateRequest> {
    let mut template_id: Option<i64> = None;
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("template_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                let parsed = text
                    .trim()
                    .parse()
                    .map_err(|_| AppError::Validation("invalid template_id".to_string()))?;
                template_id = Some(parsed);
            }
            Some("image") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                image = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let request = GenerateRequest {
        template_id: template_id
            .ok_or_else(|| AppError::Validation("template_id is required".to_string()))?,
        image: image.ok_or_else(|| AppError::Validation("image file is required".to_string()))?,
    };
    request.validate()?;
    Ok(request)
}

/// Records belonging to someone else read as missing.
fn ensure_owner(generation: &Generation, user_id: i64) -> Result<()> {
    if generation.user_id != user_id {
        return Err(AppError::NotFound(format!("job {}", generation.job_id)));
    }
    Ok(())
}

/// POST /api/v1/generations — queue a generation job.
pub async fn submit_generation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let request = read_generate_form(multipart).await?;
    validate_image(&request.image)?;

    let job_id = state
        .generations
        .submit_job(user_id, request.template_id, request.image)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: GenerationStatus::Pending,
            message: "Image generation job queued successfully".to_string(),
        }),
    ))
}

/// POST /api/v1/generations/sync — generate inline and charge immediately.
pub async fn generate_sync(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<Json<SyncGenerationResult>> {
    let request = read_generate_form(multipart).await?;
    let result = state
        .generations
        .generate_sync(user_id, request.template_id, &request.image)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/generations — the caller's history, newest first.
pub async fn list_generations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Generation>>> {
    query.validate()?;
    let generations = state
        .generations
        .history(user_id, query.limit, query.offset)
        .await?;
    Ok(Json(generations))
}

/// GET /api/v1/generations/{job_id}
pub async fn get_generation_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<GenerationStatusView>> {
    let generation = state.generations.get_generation(&job_id).await?;
    ensure_owner(&generation, user_id)?;
    Ok(Json(GenerationStatusView::from(&generation)))
}

/// GET /api/v1/generations/{job_id}/result
pub async fn get_generation_result(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<GenerationResultView>> {
    let generation = state.generations.get_generation(&job_id).await?;
    ensure_owner(&generation, user_id)?;
    Ok(Json(GenerationResultView::try_from(generation)?))
}

/// GET /api/v1/templates — active catalog entries.
pub async fn list_templates(State(state): State<AppState>) -> Result<Json<Vec<Template>>> {
    Ok(Json(state.generations.templates().await?))
}

/// GET /api/v1/templates/{id}
pub async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<i64>,
) -> Result<Json<Template>> {
    Ok(Json(state.generations.template(template_id).await?))
}
