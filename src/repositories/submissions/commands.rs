use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::{Modality, SubmissionStatus};

use super::types::COLUMNS;

/// Inserts the submission unless (student_ref, attempt_id) already exists.
/// Returns `None` when the row was already there.
pub(crate) async fn insert_if_absent(
    pool: &PgPool,
    submission: &Submission,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions (
            id, definition_id, definition_version, modality, student_ref, attempt_id, answers,
            mcq_result, mcq_score, status, time_taken_seconds, integrity_event_count,
            submitted_at, updated_at, revision
         )
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,0)
         ON CONFLICT (student_ref, attempt_id) DO NOTHING
         RETURNING {COLUMNS}"
    ))
    .bind(&submission.id)
    .bind(&submission.definition_id)
    .bind(submission.definition_version)
    .bind(submission.modality)
    .bind(&submission.student_ref)
    .bind(&submission.attempt_id)
    .bind(&submission.answers)
    .bind(&submission.mcq_result)
    .bind(submission.mcq_score)
    .bind(submission.status)
    .bind(submission.time_taken_seconds)
    .bind(submission.integrity_event_count)
    .bind(submission.submitted_at)
    .bind(submission.updated_at)
    .fetch_optional(pool)
    .await
}

/// Compare-and-set write of every mutable column.
pub(crate) async fn update_if_current(
    pool: &PgPool,
    next: &Submission,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "UPDATE submissions
         SET ai_feedback = $1,
             ai_analysis_report = $2,
             ai_requested_at = $3,
             ai_attempts = $4,
             ai_error = $5,
             ai_graded_at = $6,
             teacher_feedback = $7,
             final_score = $8,
             reviewer_ref = $9,
             review_started_at = $10,
             finalized_by = $11,
             finalized_at = $12,
             status = $13,
             updated_at = $14,
             revision = revision + 1
         WHERE id = $15 AND revision = $16
         RETURNING {COLUMNS}"
    ))
    .bind(&next.ai_feedback)
    .bind(&next.ai_analysis_report)
    .bind(next.ai_requested_at)
    .bind(next.ai_attempts)
    .bind(&next.ai_error)
    .bind(next.ai_graded_at)
    .bind(&next.teacher_feedback)
    .bind(next.final_score)
    .bind(&next.reviewer_ref)
    .bind(next.review_started_at)
    .bind(&next.finalized_by)
    .bind(next.finalized_at)
    .bind(next.status)
    .bind(next.updated_at)
    .bind(&next.id)
    .bind(next.revision)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn claim_next_for_ai(
    pool: &PgPool,
    now: PrimitiveDateTime,
    stale_before: PrimitiveDateTime,
    max_attempts: i32,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "WITH candidate AS (
            SELECT id
            FROM submissions
            WHERE modality = $1
              AND status = $2
              AND ai_feedback IS NULL
              AND ai_attempts < $3
              AND (ai_requested_at IS NULL OR ai_requested_at < $4)
            ORDER BY submitted_at, id
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE submissions
        SET ai_requested_at = $5,
            ai_attempts = submissions.ai_attempts + 1,
            updated_at = $5,
            revision = submissions.revision + 1
        FROM candidate
        WHERE submissions.id = candidate.id
        RETURNING {}",
        prefixed_columns()
    ))
    .bind(Modality::Qa)
    .bind(SubmissionStatus::Submitted)
    .bind(max_attempts)
    .bind(stale_before)
    .bind(now)
    .fetch_optional(pool)
    .await
}

fn prefixed_columns() -> String {
    COLUMNS.split(',').map(|column| format!("submissions.{}", column.trim())).collect::<Vec<_>>().join(", ")
}
