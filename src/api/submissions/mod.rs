mod grading;
mod student;
mod teacher;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        // Student endpoints
        .route("/", post(student::submit_attempt))
        .route("/:submission_id", get(student::get_submission))
        // Grading service callback
        .route("/:submission_id/ai-feedback", post(grading::receive_ai_feedback))
        // Teacher endpoints
        .route("/:submission_id/request-grading", post(teacher::request_grading))
        .route("/:submission_id/begin-review", post(teacher::begin_review))
        .route("/:submission_id/finalize", post(teacher::finalize_submission))
        .route("/:submission_id/review", post(teacher::review_mcq_submission))
}
