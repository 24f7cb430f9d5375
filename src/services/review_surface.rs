//! Read models for reviewers: what is waiting, and everything needed to act on
//! one submission.

use crate::db::models::{AssessmentDefinition, Submission};
use crate::db::types::ApprovalStatus;
use crate::repositories::store::AssessmentStore;
use crate::services::caller::{CallerContext, REVIEWER_ROLES, STAFF_ROLES};
use crate::services::grading_workflow::available_actions;
use crate::services::questions::{Answer, Question};
use crate::services::scoring::QuestionFeedback;
use crate::services::service_error::ServiceError;

#[derive(Debug, Clone)]
pub(crate) struct Page<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct QueuedSubmission {
    pub(crate) submission: Submission,
    pub(crate) suggested_final_score: Option<f64>,
    pub(crate) actions: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReviewItem {
    pub(crate) question_index: usize,
    pub(crate) question: Question,
    pub(crate) answer: Option<Answer>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) ai_feedback: Option<QuestionFeedback>,
}

#[derive(Debug, Clone)]
pub(crate) struct SubmissionDetail {
    pub(crate) submission: Submission,
    pub(crate) definition_title: String,
    pub(crate) items: Vec<ReviewItem>,
    pub(crate) suggested_final_score: Option<f64>,
    pub(crate) actions: Vec<&'static str>,
}

pub(crate) async fn pending_definitions(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    skip: i64,
    limit: i64,
) -> Result<Page<AssessmentDefinition>, ServiceError> {
    caller.require_any("list pending definitions", REVIEWER_ROLES)?;
    let (items, total) =
        store.list_definitions_by_status(ApprovalStatus::PendingReview, skip, limit).await?;
    Ok(Page { items, total })
}

pub(crate) async fn submission_queue(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    skip: i64,
    limit: i64,
) -> Result<Page<QueuedSubmission>, ServiceError> {
    caller.require_any("list review queue", STAFF_ROLES)?;
    let (submissions, total) = store.list_review_queue(skip, limit).await?;
    let items = submissions
        .into_iter()
        .map(|submission| QueuedSubmission {
            suggested_final_score: submission.suggested_final_score(),
            actions: available_actions(&submission),
            submission,
        })
        .collect();
    Ok(Page { items, total })
}

pub(crate) async fn submission_detail(
    store: &dyn AssessmentStore,
    caller: &CallerContext,
    id: &str,
) -> Result<SubmissionDetail, ServiceError> {
    caller.require_any("view submission for review", STAFF_ROLES)?;
    let submission = store
        .find_submission(id)
        .await?
        .ok_or(ServiceError::NotFound { entity: "submission" })?;
    let definition = store
        .find_definition(&submission.definition_id)
        .await?
        .ok_or(ServiceError::NotFound { entity: "definition" })?;

    Ok(build_detail(&definition, submission))
}

fn build_detail(definition: &AssessmentDefinition, submission: Submission) -> SubmissionDetail {
    let items = definition
        .questions
        .0
        .iter()
        .enumerate()
        .map(|(index, question)| ReviewItem {
            question_index: index,
            question: question.clone(),
            answer: submission
                .answers
                .0
                .iter()
                .find(|entry| entry.question_index == index)
                .map(|entry| entry.answer.clone()),
            is_correct: submission
                .mcq_result
                .as_ref()
                .and_then(|result| result.0.get(index).copied()),
            ai_feedback: submission
                .ai_feedback
                .as_ref()
                .and_then(|feedback| feedback.0.per_question.get(index).cloned()),
        })
        .collect();

    SubmissionDetail {
        definition_title: definition.title.clone(),
        items,
        suggested_final_score: submission.suggested_final_score(),
        actions: available_actions(&submission),
        submission,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{Modality, SubmissionStatus};
    use crate::repositories::memory::MemoryStore;
    use crate::services::approval::fixtures::{mcq_input, qa_input, reviewer, teacher, with_status};
    use crate::services::attempt_session::ReportedAttempt;
    use crate::services::caller::CallerRole;
    use crate::services::grading_workflow::fixtures::{ai_result, grader, student};
    use crate::services::questions::AnswerEntry;
    use crate::services::submission_grading;
    use crate::services::workflow_error::WorkflowError;

    async fn submitted_qa(store: &MemoryStore, attempt_id: &str) -> Submission {
        let definition = store
            .insert_definition(&with_status(qa_input("lesson-1"), ApprovalStatus::Approved))
            .await
            .unwrap();
        let attempt = ReportedAttempt {
            attempt_id: attempt_id.to_string(),
            answers: vec![
                AnswerEntry { question_index: 1, answer: Answer::FreeText("second".into()) },
                AnswerEntry { question_index: 0, answer: Answer::FreeText("first".into()) },
            ],
            time_taken_seconds: 200,
            integrity_event_count: 0,
        };
        submission_grading::submit_attempt(store, &student(), &definition.id, attempt)
            .await
            .unwrap()
            .submission
    }

    #[tokio::test]
    async fn detail_zips_questions_answers_and_ai_feedback() {
        let store = MemoryStore::new();
        let submission = submitted_qa(&store, "attempt-1").await;
        submission_grading::apply_ai_feedback(&store, &grader(), &submission.id, ai_result(68.0))
            .await
            .unwrap();

        let detail = submission_detail(&store, &reviewer(), &submission.id).await.unwrap();
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].answer, Some(Answer::FreeText("first".into())));
        assert_eq!(detail.items[1].answer, Some(Answer::FreeText("second".into())));
        assert!(detail.items.iter().all(|item| item.ai_feedback.is_some()));
        assert_eq!(detail.items[0].is_correct, None);
        assert_eq!(detail.suggested_final_score, Some(68.0));
        assert_eq!(detail.actions, vec!["begin_review", "finalize"]);
    }

    #[tokio::test]
    async fn queue_lists_waiting_submissions_only() {
        let store = MemoryStore::new();
        let waiting = submitted_qa(&store, "attempt-1").await;
        let done = submitted_qa(&store, "attempt-2").await;
        submission_grading::finalize(&store, &teacher(), &done.id, 80.0, None).await.unwrap();

        let page = submission_queue(&store, &teacher(), 0, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].submission.id, waiting.id);
        assert_eq!(page.items[0].submission.status, SubmissionStatus::Submitted);
        assert_eq!(page.items[0].suggested_final_score, None);
    }

    #[tokio::test]
    async fn pending_definitions_are_reviewer_only() {
        let store = MemoryStore::new();
        store
            .insert_definition(&with_status(mcq_input("lesson-1"), ApprovalStatus::PendingReview))
            .await
            .unwrap();
        store
            .insert_definition(&with_status(mcq_input("lesson-2"), ApprovalStatus::Draft))
            .await
            .unwrap();

        let page = pending_definitions(&store, &reviewer(), 0, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].modality, Modality::Mcq);

        let err = pending_definitions(&store, &teacher(), 0, 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::Workflow(WorkflowError::NotPermitted { .. })));
        let student = CallerContext::new("student-1", CallerRole::Student);
        assert!(submission_queue(&store, &student, 0, 10).await.is_err());
    }
}
