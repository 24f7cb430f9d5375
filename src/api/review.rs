use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::state::AppState;
use crate::schemas::definition::DefinitionResponse;
use crate::schemas::review::{QueuedSubmissionResponse, SubmissionDetailResponse};
use crate::services::review_surface;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/definitions", get(pending_definitions))
        .route("/submissions", get(submission_queue))
        .route("/submissions/:submission_id", get(submission_detail))
}

async fn pending_definitions(
    Query(query): Query<PageQuery>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<DefinitionResponse>>, ApiError> {
    query.validate()?;
    let page =
        review_surface::pending_definitions(state.store(), &caller, query.skip, query.limit)
            .await?;
    Ok(Json(PaginatedResponse {
        items: page.items.into_iter().map(Into::into).collect(),
        total_count: page.total,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn submission_queue(
    Query(query): Query<PageQuery>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<QueuedSubmissionResponse>>, ApiError> {
    query.validate()?;
    let page =
        review_surface::submission_queue(state.store(), &caller, query.skip, query.limit).await?;
    Ok(Json(PaginatedResponse {
        items: page.items.into_iter().map(Into::into).collect(),
        total_count: page.total,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn submission_detail(
    Path(submission_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmissionDetailResponse>, ApiError> {
    let detail = review_surface::submission_detail(state.store(), &caller, &submission_id).await?;
    Ok(Json(detail.into()))
}
