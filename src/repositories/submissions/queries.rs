use sqlx::PgPool;

use crate::db::models::Submission;
use crate::db::types::{Modality, SubmissionStatus};

use super::types::{COLUMNS, REVIEW_QUEUE_STATUSES};

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_attempt(
    pool: &PgPool,
    student_ref: &str,
    attempt_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS}
         FROM submissions
         WHERE student_ref = $1 AND attempt_id = $2"
    ))
    .bind(student_ref)
    .bind(attempt_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_review_queue(
    pool: &PgPool,
    skip: i64,
    limit: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS}
         FROM submissions
         WHERE status IN ($1, $2, $3)
         ORDER BY submitted_at, id
         OFFSET $4 LIMIT $5"
    ))
    .bind(REVIEW_QUEUE_STATUSES[0])
    .bind(REVIEW_QUEUE_STATUSES[1])
    .bind(REVIEW_QUEUE_STATUSES[2])
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_review_queue(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions WHERE status IN ($1, $2, $3)")
        .bind(REVIEW_QUEUE_STATUSES[0])
        .bind(REVIEW_QUEUE_STATUSES[1])
        .bind(REVIEW_QUEUE_STATUSES[2])
        .fetch_one(pool)
        .await
}

pub(crate) async fn count_exhausted_ai_claims(
    pool: &PgPool,
    max_attempts: i32,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM submissions
         WHERE modality = $1
           AND status = $2
           AND ai_feedback IS NULL
           AND ai_attempts >= $3",
    )
    .bind(Modality::Qa)
    .bind(SubmissionStatus::Submitted)
    .bind(max_attempts)
    .fetch_one(pool)
    .await
}
