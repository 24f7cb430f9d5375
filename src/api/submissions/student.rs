use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::submission::{SubmissionResponse, SubmitAttemptRequest};
use crate::services::submission_grading;

/// 201 for a new submission, 200 when the attempt id was already recorded.
pub(super) async fn submit_attempt(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    payload.validate()?;
    let (definition_id, attempt) = payload.into_parts();

    let outcome =
        submission_grading::submit_attempt(state.store(), &caller, &definition_id, attempt).await?;
    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome.submission.into())))
}

pub(super) async fn get_submission(
    Path(submission_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = submission_grading::get(state.store(), &caller, &submission_id).await?;
    Ok(Json(submission.into()))
}
