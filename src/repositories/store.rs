use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{AssessmentDefinition, Submission};
use crate::db::types::{ApprovalStatus, Modality};
use crate::services::approval::ApprovalOutcome;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for definitions and submissions.
///
/// Every `update_*`/`commit_*` is a compare-and-set on `revision`: the write
/// applies only if the stored revision equals the one on the passed record,
/// bumps it by one and returns the stored row. `None` means another writer got
/// there first and the caller should reload.
#[async_trait]
pub(crate) trait AssessmentStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_definition(
        &self,
        definition: &AssessmentDefinition,
    ) -> Result<AssessmentDefinition, StoreError>;

    async fn find_definition(&self, id: &str) -> Result<Option<AssessmentDefinition>, StoreError>;

    /// Oldest first by `updated_at`, with the total count for paging.
    async fn list_definitions_by_status(
        &self,
        status: ApprovalStatus,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<AssessmentDefinition>, i64), StoreError>;

    async fn find_approved_definition(
        &self,
        lesson_ref: &str,
        modality: Modality,
    ) -> Result<Option<AssessmentDefinition>, StoreError>;

    async fn list_approved_for_lesson(
        &self,
        lesson_ref: &str,
    ) -> Result<Vec<AssessmentDefinition>, StoreError>;

    async fn update_definition(
        &self,
        next: &AssessmentDefinition,
    ) -> Result<Option<AssessmentDefinition>, StoreError>;

    /// Writes the approval and the demotion it implies in one unit. Also
    /// reports a conflict when the slot gained an approved definition the
    /// outcome does not demote.
    async fn commit_approval(
        &self,
        outcome: &ApprovalOutcome,
    ) -> Result<Option<ApprovalOutcome>, StoreError>;

    /// Inserts unless the student already recorded this attempt id. Returns the
    /// stored submission and whether it was created by this call.
    async fn insert_submission_if_absent(
        &self,
        submission: &Submission,
    ) -> Result<(Submission, bool), StoreError>;

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError>;

    async fn find_submission_by_attempt(
        &self,
        student_ref: &str,
        attempt_id: &str,
    ) -> Result<Option<Submission>, StoreError>;

    /// Submissions waiting for a human, oldest first.
    async fn list_review_queue(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Submission>, i64), StoreError>;

    async fn update_submission(&self, next: &Submission) -> Result<Option<Submission>, StoreError>;

    /// Atomically claims the oldest QA submission that needs AI feedback.
    async fn claim_next_for_ai(
        &self,
        now: PrimitiveDateTime,
        stale_before: PrimitiveDateTime,
        max_attempts: u32,
    ) -> Result<Option<Submission>, StoreError>;

    /// QA submissions still waiting on AI feedback with no attempts left.
    async fn count_exhausted_ai_claims(&self, max_attempts: u32) -> Result<i64, StoreError>;
}
