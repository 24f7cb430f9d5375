use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{ApprovalStatus, Modality, SubmissionStatus};
use crate::services::questions::{AnswerEntry, Question};
use crate::services::scoring::AiFeedback;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct AssessmentDefinition {
    pub(crate) id: String,
    pub(crate) lesson_ref: String,
    pub(crate) title: String,
    pub(crate) modality: Modality,
    pub(crate) questions: Json<Vec<Question>>,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) status: ApprovalStatus,
    pub(crate) author_ref: String,
    pub(crate) reviewer_ref: Option<String>,
    pub(crate) review_notes: Option<String>,
    pub(crate) reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) version: i32,
    pub(crate) revision: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl AssessmentDefinition {
    pub(crate) fn question_count(&self) -> usize {
        self.questions.0.len()
    }

    pub(crate) fn same_slot(&self, other: &AssessmentDefinition) -> bool {
        self.lesson_ref == other.lesson_ref && self.modality == other.modality
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) definition_id: String,
    pub(crate) definition_version: i32,
    pub(crate) modality: Modality,
    pub(crate) student_ref: String,
    pub(crate) attempt_id: String,
    pub(crate) answers: Json<Vec<AnswerEntry>>,
    pub(crate) mcq_result: Option<Json<Vec<bool>>>,
    pub(crate) mcq_score: Option<i32>,
    pub(crate) ai_feedback: Option<Json<AiFeedback>>,
    pub(crate) ai_analysis_report: Option<String>,
    pub(crate) ai_requested_at: Option<PrimitiveDateTime>,
    pub(crate) ai_attempts: i32,
    pub(crate) ai_error: Option<String>,
    pub(crate) ai_graded_at: Option<PrimitiveDateTime>,
    pub(crate) teacher_feedback: Option<String>,
    pub(crate) final_score: Option<f64>,
    pub(crate) reviewer_ref: Option<String>,
    pub(crate) review_started_at: Option<PrimitiveDateTime>,
    pub(crate) finalized_by: Option<String>,
    pub(crate) finalized_at: Option<PrimitiveDateTime>,
    pub(crate) status: SubmissionStatus,
    pub(crate) time_taken_seconds: i32,
    pub(crate) integrity_event_count: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) revision: i64,
}

impl Submission {
    /// AI overall score, offered to reviewers as the starting final score.
    pub(crate) fn suggested_final_score(&self) -> Option<f64> {
        match self.modality {
            Modality::Qa => self.ai_feedback.as_ref().map(|feedback| feedback.0.overall_score),
            Modality::Mcq => self.mcq_score.map(f64::from),
        }
    }
}
