//! Grading state machine for submissions.
//!
//! QA: Submitted -> AiGraded -> TeacherReview -> Finalized, with a direct
//! Submitted -> Finalized path when AI feedback never arrives.
//! MCQ: scored at creation; Submitted -> Approved | Rejected through `review_mcq`.

use sqlx::types::Json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{AssessmentDefinition, Submission};
use crate::db::types::{Modality, SubmissionStatus};
use crate::services::attempt_session::SubmissionDraft;
use crate::services::caller::{CallerContext, CallerRole, STAFF_ROLES};
use crate::services::scoring::{in_range, AiGradingResult, OVERALL_SCORE_MAX};
use crate::services::workflow_error::WorkflowError;

const CALLBACK_ROLES: &[CallerRole] = &[CallerRole::GradingService, CallerRole::Admin];
const AI_ERROR_MAX_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FeedbackOutcome {
    Applied(Submission),
    /// Feedback was already recorded by an earlier delivery; nothing changes.
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReviewStart {
    Started(Submission),
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum McqDecision {
    Approve,
    Reject,
}

pub(crate) fn new_submission(
    caller: &CallerContext,
    definition: &AssessmentDefinition,
    draft: SubmissionDraft,
    now: PrimitiveDateTime,
) -> Result<Submission, WorkflowError> {
    caller.require_any("submit attempt", &[CallerRole::Student])?;
    if draft.definition_id != definition.id || draft.modality != definition.modality {
        return Err(WorkflowError::NotApproved);
    }

    let (mcq_result, mcq_score) = match draft.mcq {
        Some(score) => (Some(Json(score.per_question)), Some(score.percentage)),
        None => (None, None),
    };

    Ok(Submission {
        id: Uuid::new_v4().to_string(),
        definition_id: draft.definition_id,
        definition_version: draft.definition_version,
        modality: draft.modality,
        student_ref: caller.user_ref().to_string(),
        attempt_id: draft.attempt_id,
        answers: Json(draft.answers),
        mcq_result,
        mcq_score,
        ai_feedback: None,
        ai_analysis_report: None,
        ai_requested_at: None,
        ai_attempts: 0,
        ai_error: None,
        ai_graded_at: None,
        teacher_feedback: None,
        final_score: None,
        reviewer_ref: None,
        review_started_at: None,
        finalized_by: None,
        finalized_at: None,
        status: SubmissionStatus::Submitted,
        time_taken_seconds: draft.time_taken_seconds,
        integrity_event_count: draft.integrity_event_count,
        submitted_at: now,
        updated_at: now,
        revision: 0,
    })
}

/// AI grading callback. Re-delivery after the first success is a no-op.
pub(crate) fn apply_ai_feedback(
    caller: &CallerContext,
    submission: &Submission,
    result: AiGradingResult,
    now: PrimitiveDateTime,
) -> Result<FeedbackOutcome, WorkflowError> {
    caller.require_any("record AI feedback", CALLBACK_ROLES)?;
    if submission.modality != Modality::Qa {
        return Err(WorkflowError::invalid_transition(
            "record AI feedback",
            submission.status,
            "multiple-choice submissions are scored automatically",
        ));
    }
    if submission.ai_feedback.is_some() || submission.status != SubmissionStatus::Submitted {
        return Ok(FeedbackOutcome::AlreadyApplied);
    }
    result.feedback.validate(submission.answers.0.len())?;

    Ok(FeedbackOutcome::Applied(Submission {
        ai_feedback: Some(Json(result.feedback)),
        ai_analysis_report: Some(result.analysis_report),
        ai_error: None,
        ai_graded_at: Some(now),
        status: SubmissionStatus::AiGraded,
        updated_at: now,
        ..submission.clone()
    }))
}

/// Reviewer opens an AI-graded submission. Idempotent for submissions already
/// under review and for QA submissions still waiting on the AI.
pub(crate) fn begin_review(
    caller: &CallerContext,
    submission: &Submission,
    now: PrimitiveDateTime,
) -> Result<ReviewStart, WorkflowError> {
    caller.require_any("begin review", STAFF_ROLES)?;
    if submission.modality != Modality::Qa {
        return Err(WorkflowError::invalid_transition(
            "begin review",
            submission.status,
            "multiple-choice submissions are approved or rejected directly",
        ));
    }

    match submission.status {
        SubmissionStatus::AiGraded => Ok(ReviewStart::Started(Submission {
            status: SubmissionStatus::TeacherReview,
            reviewer_ref: Some(caller.user_ref().to_string()),
            review_started_at: Some(now),
            updated_at: now,
            ..submission.clone()
        })),
        SubmissionStatus::Finalized => {
            Err(WorkflowError::AlreadyFinalized { submission_id: submission.id.clone() })
        }
        _ => Ok(ReviewStart::Unchanged),
    }
}

pub(crate) fn finalize(
    caller: &CallerContext,
    submission: &Submission,
    final_score: f64,
    teacher_feedback: Option<String>,
    now: PrimitiveDateTime,
) -> Result<Submission, WorkflowError> {
    caller.require_any("finalize", STAFF_ROLES)?;
    if submission.status == SubmissionStatus::Finalized {
        return Err(WorkflowError::AlreadyFinalized { submission_id: submission.id.clone() });
    }
    if submission.modality != Modality::Qa {
        return Err(WorkflowError::invalid_transition(
            "finalize",
            submission.status,
            "approve or reject multiple-choice submissions instead",
        ));
    }
    if !in_range(final_score, OVERALL_SCORE_MAX) {
        return Err(WorkflowError::ScoreOutOfRange { score: final_score });
    }

    Ok(Submission {
        final_score: Some(final_score),
        teacher_feedback: teacher_feedback
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        reviewer_ref: submission
            .reviewer_ref
            .clone()
            .or_else(|| Some(caller.user_ref().to_string())),
        finalized_by: Some(caller.user_ref().to_string()),
        finalized_at: Some(now),
        status: SubmissionStatus::Finalized,
        updated_at: now,
        ..submission.clone()
    })
}

pub(crate) fn review_mcq(
    caller: &CallerContext,
    submission: &Submission,
    decision: McqDecision,
    notes: Option<String>,
    now: PrimitiveDateTime,
) -> Result<Submission, WorkflowError> {
    caller.require_any("review multiple-choice submission", STAFF_ROLES)?;
    if submission.modality != Modality::Mcq {
        return Err(WorkflowError::invalid_transition(
            "review",
            submission.status,
            "free-response submissions are finalized with a score",
        ));
    }
    if submission.status != SubmissionStatus::Submitted {
        return Err(WorkflowError::invalid_transition(
            "review",
            submission.status,
            "this submission has already been reviewed",
        ));
    }
    let notes = notes.map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

    let (status, final_score) = match decision {
        McqDecision::Approve => (SubmissionStatus::Approved, submission.mcq_score.map(f64::from)),
        McqDecision::Reject if notes.is_none() => {
            return Err(WorkflowError::invalid_transition(
                "reject",
                submission.status,
                "rejection requires notes",
            ));
        }
        McqDecision::Reject => (SubmissionStatus::Rejected, None),
    };

    Ok(Submission {
        status,
        final_score,
        teacher_feedback: notes,
        reviewer_ref: Some(caller.user_ref().to_string()),
        finalized_by: Some(caller.user_ref().to_string()),
        finalized_at: Some(now),
        updated_at: now,
        ..submission.clone()
    })
}

/// Clears a failed or stale AI claim so the grading worker picks the
/// submission up again with a fresh attempt budget.
pub(crate) fn request_ai_grading(
    caller: &CallerContext,
    submission: &Submission,
    now: PrimitiveDateTime,
) -> Result<Submission, WorkflowError> {
    caller.require_any("request AI grading", STAFF_ROLES)?;
    if submission.modality != Modality::Qa || submission.status != SubmissionStatus::Submitted {
        return Err(WorkflowError::invalid_transition(
            "request AI grading",
            submission.status,
            "only free-response submissions waiting for AI feedback can be regraded",
        ));
    }

    Ok(Submission {
        ai_requested_at: None,
        ai_attempts: 0,
        ai_error: None,
        updated_at: now,
        ..submission.clone()
    })
}

/// Whether the grading worker may claim this submission now.
pub(crate) fn is_claimable(
    submission: &Submission,
    stale_before: PrimitiveDateTime,
    max_attempts: u32,
) -> bool {
    submission.modality == Modality::Qa
        && submission.status == SubmissionStatus::Submitted
        && submission.ai_feedback.is_none()
        && u32::try_from(submission.ai_attempts).map_or(false, |attempts| attempts < max_attempts)
        && submission.ai_requested_at.map_or(true, |requested| requested < stale_before)
}

pub(crate) fn claim_for_ai(submission: &Submission, now: PrimitiveDateTime) -> Submission {
    Submission {
        ai_requested_at: Some(now),
        ai_attempts: submission.ai_attempts.saturating_add(1),
        updated_at: now,
        ..submission.clone()
    }
}

/// Records a failed AI round. The claim is released so the next poll retries
/// until the attempt budget runs out; the status stays Submitted.
pub(crate) fn record_ai_failure(
    submission: &Submission,
    error: &str,
    now: PrimitiveDateTime,
) -> Option<Submission> {
    if submission.status != SubmissionStatus::Submitted || submission.ai_feedback.is_some() {
        return None;
    }
    Some(Submission {
        ai_requested_at: None,
        ai_error: Some(error.chars().take(AI_ERROR_MAX_CHARS).collect()),
        updated_at: now,
        ..submission.clone()
    })
}

/// Actions the review surface may offer for a submission in its current state.
pub(crate) fn available_actions(submission: &Submission) -> Vec<&'static str> {
    match (submission.modality, submission.status) {
        (Modality::Qa, SubmissionStatus::Submitted) => vec!["request_ai_grading", "finalize"],
        (Modality::Qa, SubmissionStatus::AiGraded) => vec!["begin_review", "finalize"],
        (Modality::Qa, SubmissionStatus::TeacherReview) => vec!["finalize"],
        (Modality::Mcq, SubmissionStatus::Submitted) => vec!["approve", "reject"],
        _ => Vec::new(),
    }
}
