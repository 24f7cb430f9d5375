use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::definition::{ApproveRequest, DefinitionResponse, DefinitionWrite, RejectRequest};
use crate::services::definition_review;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_definition))
        .route("/:definition_id", get(get_definition).put(update_definition))
        .route("/:definition_id/submit", post(submit_definition))
        .route("/:definition_id/approve", post(approve_definition))
        .route("/:definition_id/reject", post(reject_definition))
}

async fn create_definition(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<DefinitionWrite>,
) -> Result<(StatusCode, Json<DefinitionResponse>), ApiError> {
    payload.validate()?;
    let definition = definition_review::create(state.store(), &caller, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(definition.into())))
}

async fn get_definition(
    Path(definition_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<DefinitionResponse>, ApiError> {
    let definition = definition_review::get(state.store(), &caller, &definition_id).await?;
    Ok(Json(definition.into()))
}

async fn update_definition(
    Path(definition_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<DefinitionWrite>,
) -> Result<Json<DefinitionResponse>, ApiError> {
    payload.validate()?;
    let definition =
        definition_review::edit(state.store(), &caller, &definition_id, payload.into()).await?;
    Ok(Json(definition.into()))
}

async fn submit_definition(
    Path(definition_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<DefinitionResponse>, ApiError> {
    let definition =
        definition_review::submit_for_review(state.store(), &caller, &definition_id).await?;
    Ok(Json(definition.into()))
}

async fn approve_definition(
    Path(definition_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<ApproveRequest>>,
) -> Result<Json<DefinitionResponse>, ApiError> {
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;
    let notes = payload.notes.map(|notes| notes.trim().to_string()).filter(|notes| !notes.is_empty());
    let definition =
        definition_review::approve(state.store(), &caller, &definition_id, notes).await?;
    Ok(Json(definition.into()))
}

async fn reject_definition(
    Path(definition_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<DefinitionResponse>, ApiError> {
    payload.validate()?;
    // Blank notes reach the engine so the caller gets its remediation text.
    let definition =
        definition_review::reject(state.store(), &caller, &definition_id, &payload.notes).await?;
    Ok(Json(definition.into()))
}
