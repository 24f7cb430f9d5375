use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::definition::{DefinitionResponse, LessonAssessmentsQuery};
use crate::services::definition_review;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:lesson_ref/assessments", get(list_lesson_assessments))
}

/// The approved definition per modality for a lesson; 404 when none is approved.
async fn list_lesson_assessments(
    Path(lesson_ref): Path<String>,
    Query(query): Query<LessonAssessmentsQuery>,
    CurrentUser(_caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<DefinitionResponse>>, ApiError> {
    let definitions =
        definition_review::approved_for_lesson(state.store(), &lesson_ref, query.modality).await?;
    Ok(Json(definitions.into_iter().map(Into::into).collect()))
}
