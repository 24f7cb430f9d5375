use time::{OffsetDateTime, PrimitiveDateTime};

use crate::core::metrics::{STORE_CONFLICTS_TOTAL, SUBMISSIONS_TOTAL, SUBMISSION_TRANSITIONS_TOTAL};
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::Submission;
use crate::repositories::store::AssessmentStore;
use crate::services::attempt_session::{replay_attempt, ReportedAttempt};
use crate::services::caller::{CallerContext, CallerRole};
use crate::services::grading_workflow::{
    self, FeedbackOutcome, McqDecision, ReviewStart,
};
use crate::services::scoring::AiGradingResult;
use crate::services::service_error::{ServiceError, MAX_WRITE_ATTEMPTS};
use crate::services::workflow_error::WorkflowError;

const ENTITY: &str = "submission";

/// Result of a single transition attempt against one loaded record.
enum Step {
    Write(Submission),
    Keep,
}

#[derive(Debug)]
pub(crate) struct SubmitOutcome {
    pub(crate) submission: Submission,
    pub(crate) created: bool,
}

async fn load(store: &dyn AssessmentStore, id: &str) -> Result<Submission, ServiceError> {
    store.find_submission(id).await?.ok_or(ServiceError::NotFound { entity: ENTITY })
}

async fn write_with_retry<F>(
    store: &dyn AssessmentStore,
    id: &str,
    apply: &F,
) -> Result<(Submission, bool), ServiceError>
where
    F: Fn(&Submission, PrimitiveDateTime) -> Result<Step, WorkflowError>,
{
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let current = load(store, id).await?;
        match apply(&current, primitive_now_utc())? {
            Step::Keep => return Ok((current, false)),
            Step::Write(next) => {
                if let Some(stored) = store.update_submission(&next).await? {
                    return Ok((stored, true));
                }
                metrics::counter!(STORE_CONFLICTS_TOTAL, "entity" => ENTITY).increment(1);
            }
        }
    }
    Err(ServiceError::Stale { entity: ENTITY, id: id.to_string() })
}

/// Applies a grading transition with reload-on-conflict. Returns the stored
/// submission and whether this call changed it.
async fn transition<F>(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    action: &'static str,
    apply: F,
) -> Result<(Submission, bool), ServiceError>
where
    F: Fn(&Submission, PrimitiveDateTime) -> Result<Step, WorkflowError>,
{
    let result = write_with_retry(store, id, &apply).await;

    let outcome = match &result {
        Ok((_, true)) => "ok",
        Ok((_, false)) => "unchanged",
        Err(err) => err.outcome_label(),
    };
    metrics::counter!(SUBMISSION_TRANSITIONS_TOTAL, "action" => action, "outcome" => outcome)
        .increment(1);

    match &result {
        Ok((stored, changed)) => tracing::info!(
            submission_id = %stored.id,
            action,
            actor = caller.user_ref(),
            status = %stored.status,
            changed = *changed,
            "Submission transition processed"
        ),
        Err(err) => tracing::info!(
            submission_id = id,
            action,
            actor = caller.user_ref(),
            error = %err,
            "Submission transition refused"
        ),
    }
    result
}

/// Records a finished attempt. Retrying with the same attempt id returns the
/// submission created by the first call.
pub(crate) async fn submit_attempt(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    definition_id: &str,
    reported: ReportedAttempt,
) -> Result<SubmitOutcome, ServiceError> {
    caller.require_any("submit attempt", &[CallerRole::Student])?;

    // A retried submit returns the recorded attempt even if the definition
    // has since been archived.
    if let Some(existing) =
        store.find_submission_by_attempt(caller.user_ref(), &reported.attempt_id).await?
    {
        tracing::info!(
            submission_id = %existing.id,
            student_ref = %existing.student_ref,
            "Attempt already submitted"
        );
        return Ok(SubmitOutcome { submission: existing, created: false });
    }

    let definition =
        store.find_definition(definition_id).await?.ok_or(WorkflowError::NotApproved)?;
    let now = OffsetDateTime::now_utc();
    let draft = replay_attempt(&definition, reported, now)?;
    let submission =
        grading_workflow::new_submission(caller, &definition, draft, to_primitive_utc(now))?;

    let (submission, created) = store.insert_submission_if_absent(&submission).await?;
    if created {
        metrics::counter!(SUBMISSIONS_TOTAL, "modality" => submission.modality.as_str())
            .increment(1);
    }
    tracing::info!(
        submission_id = %submission.id,
        definition_id = %submission.definition_id,
        student_ref = %submission.student_ref,
        modality = %submission.modality,
        mcq_score = submission.mcq_score,
        integrity_events = submission.integrity_event_count,
        created,
        "Attempt submitted"
    );

    Ok(SubmitOutcome { submission, created })
}

/// Students read their own submissions; staff and the grading service read any.
pub(crate) async fn get(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
) -> Result<Submission, ServiceError> {
    let submission = load(store, id).await?;
    if caller.role() == CallerRole::Student && submission.student_ref != caller.user_ref() {
        return Err(ServiceError::NotFound { entity: ENTITY });
    }
    Ok(submission)
}

/// AI callback handler. Returns the stored submission and whether this
/// delivery applied the feedback.
pub(crate) async fn apply_ai_feedback(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    result: AiGradingResult,
) -> Result<(Submission, bool), ServiceError> {
    transition(store, caller, id, "ai_feedback", |current, now| {
        Ok(match grading_workflow::apply_ai_feedback(caller, current, result.clone(), now)? {
            FeedbackOutcome::Applied(next) => Step::Write(next),
            FeedbackOutcome::AlreadyApplied => Step::Keep,
        })
    })
    .await
}

pub(crate) async fn begin_review(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
) -> Result<Submission, ServiceError> {
    transition(store, caller, id, "begin_review", |current, now| {
        Ok(match grading_workflow::begin_review(caller, current, now)? {
            ReviewStart::Started(next) => Step::Write(next),
            ReviewStart::Unchanged => Step::Keep,
        })
    })
    .await
    .map(|(submission, _)| submission)
}

pub(crate) async fn finalize(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    final_score: f64,
    teacher_feedback: Option<String>,
) -> Result<Submission, ServiceError> {
    transition(store, caller, id, "finalize", |current, now| {
        grading_workflow::finalize(caller, current, final_score, teacher_feedback.clone(), now)
            .map(Step::Write)
    })
    .await
    .map(|(submission, _)| submission)
}

pub(crate) async fn review_mcq(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    decision: McqDecision,
    notes: Option<String>,
) -> Result<Submission, ServiceError> {
    transition(store, caller, id, "review_mcq", |current, now| {
        grading_workflow::review_mcq(caller, current, decision, notes.clone(), now).map(Step::Write)
    })
    .await
    .map(|(submission, _)| submission)
}

pub(crate) async fn request_ai_grading(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
) -> Result<Submission, ServiceError> {
    transition(store, caller, id, "request_ai_grading", |current, now| {
        grading_workflow::request_ai_grading(caller, current, now).map(Step::Write)
    })
    .await
    .map(|(submission, _)| submission)
}

/// Worker-side failure bookkeeping; a submission that moved on meanwhile is left alone.
pub(crate) async fn record_ai_failure(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
    error: &str,
) -> Result<Submission, ServiceError> {
    transition(store, caller, id, "ai_failure", |current, now| {
        Ok(match grading_workflow::record_ai_failure(current, error, now) {
            Some(next) => Step::Write(next),
            None => Step::Keep,
        })
    })
    .await
    .map(|(submission, _)| submission)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::db::types::{ApprovalStatus, SubmissionStatus};
    use crate::services::approval::fixtures::{mcq_input, qa_input, reviewer, teacher, with_status};
    use crate::services::grading_workflow::fixtures::{ai_result, grader, student};
    use crate::services::questions::{Answer, AnswerEntry};
    use crate::repositories::memory::MemoryStore;

    async fn stored_definition(store: &MemoryStore, qa: bool) -> String {
        let input = if qa { qa_input("lesson-1") } else { mcq_input("lesson-1") };
        let definition = with_status(input, ApprovalStatus::Approved);
        store.insert_definition(&definition).await.unwrap().id
    }

    fn qa_attempt(attempt_id: &str) -> ReportedAttempt {
        ReportedAttempt {
            attempt_id: attempt_id.to_string(),
            answers: (0..2)
                .map(|index| AnswerEntry {
                    question_index: index,
                    answer: Answer::FreeText(format!("answer {index}")),
                })
                .collect(),
            time_taken_seconds: 420,
            integrity_event_count: 1,
        }
    }

    async fn qa_submission(store: &MemoryStore) -> Submission {
        let definition_id = stored_definition(store, true).await;
        let attempt = qa_attempt(&Uuid::new_v4().to_string());
        submit_attempt(store, &student(), &definition_id, attempt).await.unwrap().submission
    }

    #[tokio::test]
    async fn resubmitting_an_attempt_returns_the_first_submission() {
        let store = MemoryStore::new();
        let definition_id = stored_definition(&store, true).await;

        let first = submit_attempt(&store, &student(), &definition_id, qa_attempt("attempt-1"))
            .await
            .unwrap();
        let retry = submit_attempt(&store, &student(), &definition_id, qa_attempt("attempt-1"))
            .await
            .unwrap();
        assert!(first.created);
        assert!(!retry.created);
        assert_eq!(retry.submission.id, first.submission.id);
        assert_eq!(first.submission.integrity_event_count, 1);
    }

    #[tokio::test]
    async fn resubmit_after_archival_returns_the_recorded_attempt() {
        let store = MemoryStore::new();
        let definition_id = stored_definition(&store, true).await;
        let first = submit_attempt(&store, &student(), &definition_id, qa_attempt("attempt-1"))
            .await
            .unwrap();

        let mut archived = store.find_definition(&definition_id).await.unwrap().unwrap();
        archived.status = ApprovalStatus::Archived;
        store.update_definition(&archived).await.unwrap().expect("archived");

        let retry = submit_attempt(&store, &student(), &definition_id, qa_attempt("attempt-1"))
            .await
            .unwrap();
        assert!(!retry.created);
        assert_eq!(retry.submission.id, first.submission.id);

        let fresh = submit_attempt(&store, &student(), &definition_id, qa_attempt("attempt-2")).await;
        assert!(matches!(fresh, Err(ServiceError::Workflow(WorkflowError::NotApproved))));
    }

    #[tokio::test]
    async fn mcq_attempt_is_scored_on_submit() {
        let store = MemoryStore::new();
        let definition_id = stored_definition(&store, false).await;
        let attempt = ReportedAttempt {
            attempt_id: "attempt-mcq".into(),
            answers: [0, 1, 0, 3]
                .into_iter()
                .enumerate()
                .map(|(index, option)| AnswerEntry {
                    question_index: index,
                    answer: Answer::SelectedOption(option),
                })
                .collect(),
            time_taken_seconds: 30,
            integrity_event_count: 0,
        };

        let outcome = submit_attempt(&store, &student(), &definition_id, attempt).await.unwrap();
        assert_eq!(outcome.submission.mcq_score, Some(75));
        assert_eq!(outcome.submission.status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn incomplete_attempt_creates_nothing() {
        let store = MemoryStore::new();
        let definition_id = stored_definition(&store, true).await;
        let mut attempt = qa_attempt("attempt-2");
        attempt.answers.truncate(1);

        let err = submit_attempt(&store, &student(), &definition_id, attempt).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Workflow(WorkflowError::IncompleteAttempt { ref missing }) if missing == &vec![1]
        ));
        let (queue, total) = store.list_review_queue(0, 10).await.unwrap();
        assert!(queue.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn archived_definition_is_not_attemptable() {
        let store = MemoryStore::new();
        let definition = with_status(qa_input("lesson-1"), ApprovalStatus::Archived);
        let id = store.insert_definition(&definition).await.unwrap().id;
        let err = submit_attempt(&store, &student(), &id, qa_attempt("a")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Workflow(WorkflowError::NotApproved)));
    }

    #[tokio::test]
    async fn ai_callback_is_idempotent() {
        let store = MemoryStore::new();
        let submission = qa_submission(&store).await;

        let (graded, applied) =
            apply_ai_feedback(&store, &grader(), &submission.id, ai_result(68.0)).await.unwrap();
        assert!(applied);
        assert_eq!(graded.status, SubmissionStatus::AiGraded);

        let (again, applied) =
            apply_ai_feedback(&store, &grader(), &submission.id, ai_result(12.0)).await.unwrap();
        assert!(!applied);
        assert_eq!(again.revision, graded.revision);
        assert_eq!(again.suggested_final_score(), Some(68.0));
    }

    #[tokio::test]
    async fn teacher_score_replaces_ai_suggestion() {
        let store = MemoryStore::new();
        let submission = qa_submission(&store).await;
        apply_ai_feedback(&store, &grader(), &submission.id, ai_result(68.0)).await.unwrap();

        let in_review = begin_review(&store, &reviewer(), &submission.id).await.unwrap();
        assert_eq!(in_review.status, SubmissionStatus::TeacherReview);
        let again = begin_review(&store, &reviewer(), &submission.id).await.unwrap();
        assert_eq!(again.revision, in_review.revision);

        let finalized =
            finalize(&store, &reviewer(), &submission.id, 72.0, Some("Nice".into())).await.unwrap();
        assert_eq!(finalized.status, SubmissionStatus::Finalized);
        assert_eq!(finalized.final_score, Some(72.0));

        let err = finalize(&store, &teacher(), &submission.id, 10.0, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Workflow(WorkflowError::AlreadyFinalized { .. })));
        let stored = store.find_submission(&submission.id).await.unwrap().unwrap();
        assert_eq!(stored.final_score, Some(72.0));
        assert_eq!(stored.teacher_feedback.as_deref(), Some("Nice"));
    }

    #[tokio::test]
    async fn concurrent_finalize_has_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let submission = qa_submission(store.as_ref()).await;

        let mut handles = Vec::new();
        for (index, score) in [60.0, 90.0].into_iter().enumerate() {
            let store = Arc::clone(&store);
            let id = submission.id.clone();
            handles.push(tokio::spawn(async move {
                let caller = CallerContext::new(format!("reviewer-{index}"), CallerRole::Reviewer);
                finalize(store.as_ref(), &caller, &id, score, None).await
            }));
        }

        let mut winners = Vec::new();
        let mut already_finalized = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(finalized) => winners.push(finalized.final_score),
                Err(ServiceError::Workflow(WorkflowError::AlreadyFinalized { .. })) => {
                    already_finalized += 1
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(already_finalized, 1);

        let stored = store.find_submission(&submission.id).await.unwrap().unwrap();
        assert_eq!(stored.final_score, winners[0]);
    }

    #[tokio::test]
    async fn students_cannot_read_other_submissions() {
        let store = MemoryStore::new();
        let submission = qa_submission(&store).await;
        let other = CallerContext::new("student-2", CallerRole::Student);
        assert!(matches!(
            get(&store, &other, &submission.id).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(get(&store, &student(), &submission.id).await.is_ok());
    }

    #[tokio::test]
    async fn ai_failure_keeps_submission_retryable() {
        let store = MemoryStore::new();
        let submission = qa_submission(&store).await;
        let now = primitive_now_utc();
        let claimed = store.claim_next_for_ai(now, now, 3).await.unwrap().expect("claimed");

        let failed = record_ai_failure(&store, &grader(), &claimed.id, "upstream 502").await.unwrap();
        assert_eq!(failed.status, SubmissionStatus::Submitted);
        assert_eq!(failed.ai_error.as_deref(), Some("upstream 502"));

        let reset = request_ai_grading(&store, &teacher(), &submission.id).await.unwrap();
        assert_eq!(reset.ai_attempts, 0);
        assert!(store.claim_next_for_ai(now, now, 1).await.unwrap().is_some());
    }
}
