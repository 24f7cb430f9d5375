use anyhow::{Context, Result};
use time::Duration;

use crate::core::metrics::AI_GRADING_JOBS_TOTAL;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc as now_primitive;
use crate::db::models::Submission;
use crate::services::ai_feedback::QaFeedbackProvider;
use crate::services::caller::{CallerContext, CallerRole};
use crate::services::scoring::build_qa_items;
use crate::services::submission_grading;

const WORKER_REF: &str = "grading-worker";

fn worker_caller() -> CallerContext {
    CallerContext::new(WORKER_REF, CallerRole::GradingService)
}

/// Claims one QA submission that needs AI feedback and grades it.
///
/// Returns `false` when nothing was claimable. AI failures are recorded on the
/// submission and are not errors here; errors mean the store misbehaved.
pub(crate) async fn grade_next_submission(
    state: &AppState,
    provider: &dyn QaFeedbackProvider,
) -> Result<bool> {
    let grading = state.settings().grading();
    let now = now_primitive();
    let stale_before = now - Duration::seconds(grading.stale_claim_seconds as i64);

    let claimed = state
        .store()
        .claim_next_for_ai(now, stale_before, grading.max_ai_attempts)
        .await
        .context("Failed to claim submission for AI grading")?;
    let Some(submission) = claimed else {
        return Ok(false);
    };

    tracing::info!(
        submission_id = %submission.id,
        attempt = submission.ai_attempts,
        "Claimed submission for AI grading"
    );

    if let Err(err) = grade_claimed(state, provider, &submission).await {
        tracing::warn!(submission_id = %submission.id, error = %format!("{err:#}"), "AI grading failed");
        metrics::counter!(AI_GRADING_JOBS_TOTAL, "outcome" => "failed").increment(1);
        submission_grading::record_ai_failure(
            state.store(),
            &worker_caller(),
            &submission.id,
            &format!("{err:#}"),
        )
        .await
        .context("Failed to record AI grading failure")?;
    }

    Ok(true)
}

async fn grade_claimed(
    state: &AppState,
    provider: &dyn QaFeedbackProvider,
    submission: &Submission,
) -> Result<()> {
    let definition = state
        .store()
        .find_definition(&submission.definition_id)
        .await
        .context("Failed to load definition")?
        .context("Definition not found")?;

    let items = build_qa_items(&definition.questions.0, &submission.answers.0);
    let result = provider.grade(&submission.id, &items).await?;

    let (_, applied) =
        submission_grading::apply_ai_feedback(state.store(), &worker_caller(), &submission.id, result)
            .await
            .context("Failed to apply AI feedback")?;

    let outcome = if applied { "applied" } else { "already_applied" };
    metrics::counter!(AI_GRADING_JOBS_TOTAL, "outcome" => outcome).increment(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::config::Settings;
    use crate::db::types::{ApprovalStatus, SubmissionStatus};
    use crate::services::approval::fixtures::{qa_input, with_status};
    use crate::services::attempt_session::ReportedAttempt;
    use crate::services::grading_workflow::fixtures::{ai_result, student};
    use crate::services::questions::{Answer, AnswerEntry};
    use crate::services::scoring::{AiGradingResult, QaGradingItem};
    use crate::test_support;

    struct FixedProvider(Option<AiGradingResult>);

    #[async_trait]
    impl QaFeedbackProvider for FixedProvider {
        async fn grade(&self, _submission_id: &str, items: &[QaGradingItem]) -> Result<AiGradingResult> {
            assert_eq!(items.len(), 2);
            assert_eq!(items[1].student_answer, "answer 1");
            self.0.clone().ok_or_else(|| anyhow::anyhow!("upstream timed out"))
        }
    }

    async fn state_with_submission() -> (AppState, String) {
        let state = test_support::memory_state(Settings::load().expect("settings"));
        let definition = state
            .store()
            .insert_definition(&with_status(qa_input("lesson-1"), ApprovalStatus::Approved))
            .await
            .unwrap();
        let attempt = ReportedAttempt {
            attempt_id: "attempt-1".into(),
            answers: (0..2)
                .map(|index| AnswerEntry {
                    question_index: index,
                    answer: Answer::FreeText(format!("answer {index}")),
                })
                .collect(),
            time_taken_seconds: 90,
            integrity_event_count: 0,
        };
        let outcome =
            submission_grading::submit_attempt(state.store(), &student(), &definition.id, attempt)
                .await
                .unwrap();
        (state, outcome.submission.id)
    }

    #[tokio::test]
    async fn successful_grading_moves_submission_to_ai_graded() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let (state, id) = state_with_submission().await;
        let provider = FixedProvider(Some(ai_result(68.0)));

        assert!(grade_next_submission(&state, &provider).await.unwrap());
        assert!(!grade_next_submission(&state, &provider).await.unwrap());

        let stored = state.store().find_submission(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::AiGraded);
        assert_eq!(stored.suggested_final_score(), Some(68.0));
        assert_eq!(stored.final_score, None);
    }

    #[tokio::test]
    async fn failed_grading_stays_submitted_and_retries() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let (state, id) = state_with_submission().await;
        let provider = FixedProvider(None);

        assert!(grade_next_submission(&state, &provider).await.unwrap());
        let stored = state.store().find_submission(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Submitted);
        assert_eq!(stored.ai_attempts, 1);
        assert_eq!(stored.ai_error.as_deref(), Some("upstream timed out"));

        // the claim was released, so the next poll retries right away
        assert!(grade_next_submission(&state, &FixedProvider(Some(ai_result(55.0)))).await.unwrap());
        let stored = state.store().find_submission(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::AiGraded);
        assert_eq!(stored.ai_error, None);
    }
}
