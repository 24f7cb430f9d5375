use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{AssessmentDefinition, Submission};
use crate::db::types::{ApprovalStatus, Modality};
use crate::repositories::store::{AssessmentStore, StoreError};
use crate::repositories::{definitions, health, submissions};
use crate::services::approval::ApprovalOutcome;

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn attempts_bound(max_attempts: u32) -> i32 {
    i32::try_from(max_attempts).unwrap_or(i32::MAX)
}

#[async_trait]
impl AssessmentStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(health::ping(&self.pool).await?)
    }

    async fn insert_definition(
        &self,
        definition: &AssessmentDefinition,
    ) -> Result<AssessmentDefinition, StoreError> {
        Ok(definitions::insert(&self.pool, definition).await?)
    }

    async fn find_definition(&self, id: &str) -> Result<Option<AssessmentDefinition>, StoreError> {
        Ok(definitions::find_by_id(&self.pool, id).await?)
    }

    async fn list_definitions_by_status(
        &self,
        status: ApprovalStatus,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<AssessmentDefinition>, i64), StoreError> {
        let items = definitions::list_by_status(&self.pool, status, skip, limit).await?;
        let total = definitions::count_by_status(&self.pool, status).await?;
        Ok((items, total))
    }

    async fn find_approved_definition(
        &self,
        lesson_ref: &str,
        modality: Modality,
    ) -> Result<Option<AssessmentDefinition>, StoreError> {
        Ok(definitions::find_approved(&self.pool, lesson_ref, modality).await?)
    }

    async fn list_approved_for_lesson(
        &self,
        lesson_ref: &str,
    ) -> Result<Vec<AssessmentDefinition>, StoreError> {
        Ok(definitions::list_approved_for_lesson(&self.pool, lesson_ref).await?)
    }

    async fn update_definition(
        &self,
        next: &AssessmentDefinition,
    ) -> Result<Option<AssessmentDefinition>, StoreError> {
        Ok(definitions::update_if_current(&self.pool, next).await?)
    }

    async fn commit_approval(
        &self,
        outcome: &ApprovalOutcome,
    ) -> Result<Option<ApprovalOutcome>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Demote first so the partial unique index never sees two approved rows.
        let archived = match &outcome.archived {
            Some(previous) => match definitions::update_if_current(&mut *tx, previous).await? {
                Some(stored) => Some(stored),
                None => {
                    tx.rollback().await?;
                    return Ok(None);
                }
            },
            None => None,
        };

        let approved = match definitions::update_if_current(&mut *tx, &outcome.approved).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                tx.rollback().await?;
                return Ok(None);
            }
            // Another approval for the same slot committed after we loaded it.
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                tx.rollback().await?;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;
        Ok(Some(ApprovalOutcome { approved, archived }))
    }

    async fn insert_submission_if_absent(
        &self,
        submission: &Submission,
    ) -> Result<(Submission, bool), StoreError> {
        if let Some(created) = submissions::insert_if_absent(&self.pool, submission).await? {
            return Ok((created, true));
        }

        let existing =
            submissions::find_by_attempt(&self.pool, &submission.student_ref, &submission.attempt_id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
        Ok((existing, false))
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::find_by_id(&self.pool, id).await?)
    }

    async fn find_submission_by_attempt(
        &self,
        student_ref: &str,
        attempt_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::find_by_attempt(&self.pool, student_ref, attempt_id).await?)
    }

    async fn list_review_queue(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Submission>, i64), StoreError> {
        let items = submissions::list_review_queue(&self.pool, skip, limit).await?;
        let total = submissions::count_review_queue(&self.pool).await?;
        Ok((items, total))
    }

    async fn update_submission(&self, next: &Submission) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::update_if_current(&self.pool, next).await?)
    }

    async fn claim_next_for_ai(
        &self,
        now: PrimitiveDateTime,
        stale_before: PrimitiveDateTime,
        max_attempts: u32,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::claim_next_for_ai(&self.pool, now, stale_before, attempts_bound(max_attempts))
            .await?)
    }

    async fn count_exhausted_ai_claims(&self, max_attempts: u32) -> Result<i64, StoreError> {
        Ok(submissions::count_exhausted_ai_claims(&self.pool, attempts_bound(max_attempts)).await?)
    }
}
