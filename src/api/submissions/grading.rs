use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::submission::{AiFeedbackRequest, AiFeedbackResponse};
use crate::services::submission_grading;

/// Idempotent: a re-delivered result answers 200 with `applied: false`.
pub(super) async fn receive_ai_feedback(
    Path(submission_id): Path<String>,
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AiFeedbackRequest>,
) -> Result<Json<AiFeedbackResponse>, ApiError> {
    payload.validate()?;
    let (submission, applied) =
        submission_grading::apply_ai_feedback(state.store(), &caller, &submission_id, payload.into())
            .await?;
    Ok(Json(AiFeedbackResponse { applied, submission: submission.into() }))
}
