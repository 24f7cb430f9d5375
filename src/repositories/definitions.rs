use sqlx::{PgExecutor, PgPool};

use crate::db::models::AssessmentDefinition;
use crate::db::types::{ApprovalStatus, Modality};

pub(crate) const COLUMNS: &str = "\
    id, lesson_ref, title, modality, questions, time_limit_minutes, status, author_ref, \
    reviewer_ref, review_notes, reviewed_at, version, revision, created_at, updated_at";

pub(crate) async fn insert(
    pool: &PgPool,
    definition: &AssessmentDefinition,
) -> Result<AssessmentDefinition, sqlx::Error> {
    sqlx::query_as::<_, AssessmentDefinition>(&format!(
        "INSERT INTO assessment_definitions (
            id, lesson_ref, title, modality, questions, time_limit_minutes, status, author_ref,
            reviewer_ref, review_notes, reviewed_at, version, revision, created_at, updated_at
         )
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,0,$13,$14)
         RETURNING {COLUMNS}"
    ))
    .bind(&definition.id)
    .bind(&definition.lesson_ref)
    .bind(&definition.title)
    .bind(definition.modality)
    .bind(&definition.questions)
    .bind(definition.time_limit_minutes)
    .bind(definition.status)
    .bind(&definition.author_ref)
    .bind(&definition.reviewer_ref)
    .bind(&definition.review_notes)
    .bind(definition.reviewed_at)
    .bind(definition.version)
    .bind(definition.created_at)
    .bind(definition.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<AssessmentDefinition>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentDefinition>(&format!(
        "SELECT {COLUMNS} FROM assessment_definitions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_status(
    pool: &PgPool,
    status: ApprovalStatus,
    skip: i64,
    limit: i64,
) -> Result<Vec<AssessmentDefinition>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentDefinition>(&format!(
        "SELECT {COLUMNS}
         FROM assessment_definitions
         WHERE status = $1
         ORDER BY updated_at, id
         OFFSET $2 LIMIT $3"
    ))
    .bind(status)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_status(
    pool: &PgPool,
    status: ApprovalStatus,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assessment_definitions WHERE status = $1")
        .bind(status)
        .fetch_one(pool)
        .await
}

pub(crate) async fn find_approved<'e, E>(
    executor: E,
    lesson_ref: &str,
    modality: Modality,
) -> Result<Option<AssessmentDefinition>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AssessmentDefinition>(&format!(
        "SELECT {COLUMNS}
         FROM assessment_definitions
         WHERE lesson_ref = $1 AND modality = $2 AND status = $3"
    ))
    .bind(lesson_ref)
    .bind(modality)
    .bind(ApprovalStatus::Approved)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_approved_for_lesson(
    pool: &PgPool,
    lesson_ref: &str,
) -> Result<Vec<AssessmentDefinition>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentDefinition>(&format!(
        "SELECT {COLUMNS}
         FROM assessment_definitions
         WHERE lesson_ref = $1 AND status = $2
         ORDER BY modality"
    ))
    .bind(lesson_ref)
    .bind(ApprovalStatus::Approved)
    .fetch_all(pool)
    .await
}

/// Writes every mutable column when the stored revision still matches.
pub(crate) async fn update_if_current<'e, E>(
    executor: E,
    next: &AssessmentDefinition,
) -> Result<Option<AssessmentDefinition>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AssessmentDefinition>(&format!(
        "UPDATE assessment_definitions
         SET lesson_ref = $1,
             title = $2,
             modality = $3,
             questions = $4,
             time_limit_minutes = $5,
             status = $6,
             reviewer_ref = $7,
             review_notes = $8,
             reviewed_at = $9,
             version = $10,
             updated_at = $11,
             revision = revision + 1
         WHERE id = $12 AND revision = $13
         RETURNING {COLUMNS}"
    ))
    .bind(&next.lesson_ref)
    .bind(&next.title)
    .bind(next.modality)
    .bind(&next.questions)
    .bind(next.time_limit_minutes)
    .bind(next.status)
    .bind(&next.reviewer_ref)
    .bind(&next.review_notes)
    .bind(next.reviewed_at)
    .bind(next.version)
    .bind(next.updated_at)
    .bind(&next.id)
    .bind(next.revision)
    .fetch_optional(executor)
    .await
}
