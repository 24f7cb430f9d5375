use std::collections::HashMap;

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::Mutex;

use crate::db::models::{AssessmentDefinition, Submission};
use crate::db::types::{ApprovalStatus, Modality, SubmissionStatus};
use crate::repositories::store::{AssessmentStore, StoreError};
use crate::repositories::submissions::REVIEW_QUEUE_STATUSES;
use crate::services::approval::ApprovalOutcome;
use crate::services::grading_workflow::{claim_for_ai, is_claimable};

/// Process-local store with the same compare-and-set semantics as Postgres.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    definitions: HashMap<String, AssessmentDefinition>,
    submissions: HashMap<String, Submission>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

fn page<T>(mut items: Vec<T>, skip: i64, limit: i64) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let skip = usize::try_from(skip.max(0)).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    let page = items.drain(..).skip(skip).take(limit).collect();
    (page, total)
}

impl MemoryState {
    fn current_definition(&self, next: &AssessmentDefinition) -> bool {
        self.definitions.get(&next.id).is_some_and(|stored| stored.revision == next.revision)
    }

    fn write_definition(&mut self, next: &AssessmentDefinition) -> AssessmentDefinition {
        let stored = AssessmentDefinition { revision: next.revision + 1, ..next.clone() };
        self.definitions.insert(stored.id.clone(), stored.clone());
        stored
    }

    fn write_submission(&mut self, next: &Submission) -> Submission {
        let stored = Submission { revision: next.revision + 1, ..next.clone() };
        self.submissions.insert(stored.id.clone(), stored.clone());
        stored
    }

    fn approved_in_slot(&self, lesson_ref: &str, modality: Modality) -> Option<&AssessmentDefinition> {
        self.definitions.values().find(|definition| {
            definition.status == ApprovalStatus::Approved
                && definition.lesson_ref == lesson_ref
                && definition.modality == modality
        })
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_definition(
        &self,
        definition: &AssessmentDefinition,
    ) -> Result<AssessmentDefinition, StoreError> {
        let mut state = self.state.lock().await;
        let stored = AssessmentDefinition { revision: 0, ..definition.clone() };
        state.definitions.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_definition(&self, id: &str) -> Result<Option<AssessmentDefinition>, StoreError> {
        Ok(self.state.lock().await.definitions.get(id).cloned())
    }

    async fn list_definitions_by_status(
        &self,
        status: ApprovalStatus,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<AssessmentDefinition>, i64), StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<AssessmentDefinition> = state
            .definitions
            .values()
            .filter(|definition| definition.status == status)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page(items, skip, limit))
    }

    async fn find_approved_definition(
        &self,
        lesson_ref: &str,
        modality: Modality,
    ) -> Result<Option<AssessmentDefinition>, StoreError> {
        Ok(self.state.lock().await.approved_in_slot(lesson_ref, modality).cloned())
    }

    async fn list_approved_for_lesson(
        &self,
        lesson_ref: &str,
    ) -> Result<Vec<AssessmentDefinition>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<AssessmentDefinition> = state
            .definitions
            .values()
            .filter(|definition| {
                definition.status == ApprovalStatus::Approved && definition.lesson_ref == lesson_ref
            })
            .cloned()
            .collect();
        items.sort_by_key(|definition| definition.modality.as_str());
        Ok(items)
    }

    async fn update_definition(
        &self,
        next: &AssessmentDefinition,
    ) -> Result<Option<AssessmentDefinition>, StoreError> {
        let mut state = self.state.lock().await;
        if !state.current_definition(next) {
            return Ok(None);
        }
        Ok(Some(state.write_definition(next)))
    }

    async fn commit_approval(
        &self,
        outcome: &ApprovalOutcome,
    ) -> Result<Option<ApprovalOutcome>, StoreError> {
        let mut state = self.state.lock().await;
        let approved = &outcome.approved;

        if !state.current_definition(approved) {
            return Ok(None);
        }
        if let Some(archived) = &outcome.archived {
            if !state.current_definition(archived) {
                return Ok(None);
            }
        }
        let demoted_id = outcome.archived.as_ref().map(|archived| archived.id.as_str());
        if let Some(holder) = state.approved_in_slot(&approved.lesson_ref, approved.modality) {
            if holder.id != approved.id && Some(holder.id.as_str()) != demoted_id {
                return Ok(None);
            }
        }

        let archived = outcome.archived.as_ref().map(|archived| state.write_definition(archived));
        let approved = state.write_definition(approved);
        Ok(Some(ApprovalOutcome { approved, archived }))
    }

    async fn insert_submission_if_absent(
        &self,
        submission: &Submission,
    ) -> Result<(Submission, bool), StoreError> {
        let mut state = self.state.lock().await;
        let existing = state.submissions.values().find(|stored| {
            stored.student_ref == submission.student_ref
                && stored.attempt_id == submission.attempt_id
        });
        if let Some(existing) = existing {
            return Ok((existing.clone(), false));
        }

        let stored = Submission { revision: 0, ..submission.clone() };
        state.submissions.insert(stored.id.clone(), stored.clone());
        Ok((stored, true))
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        Ok(self.state.lock().await.submissions.get(id).cloned())
    }

    async fn find_submission_by_attempt(
        &self,
        student_ref: &str,
        attempt_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .submissions
            .values()
            .find(|stored| stored.student_ref == student_ref && stored.attempt_id == attempt_id)
            .cloned())
    }

    async fn list_review_queue(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Submission>, i64), StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<Submission> = state
            .submissions
            .values()
            .filter(|submission| REVIEW_QUEUE_STATUSES.contains(&submission.status))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page(items, skip, limit))
    }

    async fn update_submission(&self, next: &Submission) -> Result<Option<Submission>, StoreError> {
        let mut state = self.state.lock().await;
        let current =
            state.submissions.get(&next.id).is_some_and(|stored| stored.revision == next.revision);
        if !current {
            return Ok(None);
        }
        Ok(Some(state.write_submission(next)))
    }

    async fn claim_next_for_ai(
        &self,
        now: PrimitiveDateTime,
        stale_before: PrimitiveDateTime,
        max_attempts: u32,
    ) -> Result<Option<Submission>, StoreError> {
        let mut state = self.state.lock().await;
        let candidate = state
            .submissions
            .values()
            .filter(|submission| is_claimable(submission, stale_before, max_attempts))
            .min_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)))
            .cloned();

        Ok(candidate.map(|submission| state.write_submission(&claim_for_ai(&submission, now))))
    }

    async fn count_exhausted_ai_claims(&self, max_attempts: u32) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        let count = state
            .submissions
            .values()
            .filter(|submission| {
                submission.modality == Modality::Qa
                    && submission.status == SubmissionStatus::Submitted
                    && submission.ai_feedback.is_none()
                    && i64::from(submission.ai_attempts) >= i64::from(max_attempts)
            })
            .count();
        Ok(count as i64)
    }
}
