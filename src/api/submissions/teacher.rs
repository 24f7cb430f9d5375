use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::submission::{FinalizeRequest, McqReviewRequest, SubmissionResponse};
use crate::services::submission_grading;

pub(super) async fn request_grading(
    Path(submission_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission =
        submission_grading::request_ai_grading(state.store(), &caller, &submission_id).await?;
    Ok(Json(submission.into()))
}

pub(super) async fn begin_review(
    Path(submission_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission =
        submission_grading::begin_review(state.store(), &caller, &submission_id).await?;
    Ok(Json(submission.into()))
}

pub(super) async fn finalize_submission(
    Path(submission_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<FinalizeRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    payload.validate()?;
    let submission = submission_grading::finalize(
        state.store(),
        &caller,
        &submission_id,
        payload.final_score,
        payload.teacher_feedback,
    )
    .await?;
    Ok(Json(submission.into()))
}

pub(super) async fn review_mcq_submission(
    Path(submission_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<McqReviewRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    payload.validate()?;
    let submission = submission_grading::review_mcq(
        state.store(),
        &caller,
        &submission_id,
        payload.decision,
        payload.notes,
    )
    .await?;
    Ok(Json(submission.into()))
}
