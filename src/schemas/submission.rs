use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::{format_optional, format_primitive};
use crate::db::models::Submission;
use crate::db::types::{Modality, SubmissionStatus};
use crate::services::attempt_session::ReportedAttempt;
use crate::services::grading_workflow::McqDecision;
use crate::services::questions::AnswerEntry;
use crate::services::scoring::{AiFeedback, AiGradingResult, QuestionFeedback};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitAttemptRequest {
    #[serde(alias = "definitionId")]
    #[validate(length(min = 1, message = "definition_id must not be empty"))]
    pub(crate) definition_id: String,
    #[serde(alias = "attemptId")]
    #[validate(length(min = 1, max = 64, message = "attempt_id must be 1-64 characters"))]
    pub(crate) attempt_id: String,
    #[validate(length(max = 100, message = "too many answers"))]
    pub(crate) answers: Vec<AnswerEntry>,
    #[serde(alias = "timeTakenSeconds")]
    pub(crate) time_taken_seconds: u32,
    #[serde(default)]
    #[serde(alias = "integrityEventCount")]
    #[validate(range(max = 10000, message = "integrity_event_count must be at most 10000"))]
    pub(crate) integrity_event_count: u32,
}

impl SubmitAttemptRequest {
    pub(crate) fn into_parts(self) -> (String, ReportedAttempt) {
        (
            self.definition_id,
            ReportedAttempt {
                attempt_id: self.attempt_id,
                answers: self.answers,
                time_taken_seconds: self.time_taken_seconds,
                integrity_event_count: self.integrity_event_count,
            },
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AiFeedbackRequest {
    #[serde(alias = "perQuestion")]
    pub(crate) per_question: Vec<QuestionFeedback>,
    #[serde(alias = "overallScore")]
    pub(crate) overall_score: f64,
    #[serde(default)]
    #[serde(alias = "analysisReport")]
    #[validate(length(max = 20000, message = "analysis_report is too long"))]
    pub(crate) analysis_report: String,
}

impl From<AiFeedbackRequest> for AiGradingResult {
    fn from(payload: AiFeedbackRequest) -> Self {
        AiGradingResult {
            feedback: AiFeedback {
                per_question: payload.per_question,
                overall_score: payload.overall_score,
            },
            analysis_report: payload.analysis_report,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct FinalizeRequest {
    #[serde(alias = "finalScore")]
    pub(crate) final_score: f64,
    #[serde(default)]
    #[serde(alias = "teacherFeedback")]
    #[validate(length(max = 5000, message = "teacher_feedback must be at most 5000 characters"))]
    pub(crate) teacher_feedback: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct McqReviewRequest {
    pub(crate) decision: McqDecision,
    #[serde(default)]
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) definition_id: String,
    pub(crate) definition_version: i32,
    pub(crate) modality: Modality,
    pub(crate) student_ref: String,
    pub(crate) attempt_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) answers: Vec<AnswerEntry>,
    pub(crate) mcq_result: Option<Vec<bool>>,
    pub(crate) mcq_score: Option<i32>,
    pub(crate) ai_feedback: Option<AiFeedback>,
    pub(crate) ai_analysis_report: Option<String>,
    pub(crate) ai_attempts: i32,
    pub(crate) ai_error: Option<String>,
    pub(crate) suggested_final_score: Option<f64>,
    pub(crate) final_score: Option<f64>,
    pub(crate) teacher_feedback: Option<String>,
    pub(crate) reviewer_ref: Option<String>,
    pub(crate) finalized_by: Option<String>,
    pub(crate) time_taken_seconds: i32,
    pub(crate) integrity_event_count: i32,
    pub(crate) submitted_at: String,
    pub(crate) ai_graded_at: Option<String>,
    pub(crate) review_started_at: Option<String>,
    pub(crate) finalized_at: Option<String>,
    pub(crate) updated_at: String,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        Self {
            suggested_final_score: submission.suggested_final_score(),
            id: submission.id,
            definition_id: submission.definition_id,
            definition_version: submission.definition_version,
            modality: submission.modality,
            student_ref: submission.student_ref,
            attempt_id: submission.attempt_id,
            status: submission.status,
            answers: submission.answers.0,
            mcq_result: submission.mcq_result.map(|value| value.0),
            mcq_score: submission.mcq_score,
            ai_feedback: submission.ai_feedback.map(|value| value.0),
            ai_analysis_report: submission.ai_analysis_report,
            ai_attempts: submission.ai_attempts,
            ai_error: submission.ai_error,
            final_score: submission.final_score,
            teacher_feedback: submission.teacher_feedback,
            reviewer_ref: submission.reviewer_ref,
            finalized_by: submission.finalized_by,
            time_taken_seconds: submission.time_taken_seconds,
            integrity_event_count: submission.integrity_event_count,
            submitted_at: format_primitive(submission.submitted_at),
            ai_graded_at: format_optional(submission.ai_graded_at),
            review_started_at: format_optional(submission.review_started_at),
            finalized_at: format_optional(submission.finalized_at),
            updated_at: format_primitive(submission.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AiFeedbackResponse {
    pub(crate) applied: bool,
    pub(crate) submission: SubmissionResponse,
}
