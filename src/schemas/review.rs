use serde::Serialize;

use crate::schemas::submission::SubmissionResponse;
use crate::services::questions::{Answer, Question};
use crate::services::review_surface::{QueuedSubmission, ReviewItem, SubmissionDetail};
use crate::services::scoring::QuestionFeedback;

#[derive(Debug, Serialize)]
pub(crate) struct QueuedSubmissionResponse {
    #[serde(flatten)]
    pub(crate) submission: SubmissionResponse,
    pub(crate) available_actions: Vec<&'static str>,
}

impl From<QueuedSubmission> for QueuedSubmissionResponse {
    fn from(queued: QueuedSubmission) -> Self {
        Self { submission: queued.submission.into(), available_actions: queued.actions }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewItemResponse {
    pub(crate) question_index: usize,
    pub(crate) question: Question,
    pub(crate) answer: Option<Answer>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) ai_feedback: Option<QuestionFeedback>,
}

impl From<ReviewItem> for ReviewItemResponse {
    fn from(item: ReviewItem) -> Self {
        Self {
            question_index: item.question_index,
            question: item.question,
            answer: item.answer,
            is_correct: item.is_correct,
            ai_feedback: item.ai_feedback,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionDetailResponse {
    pub(crate) submission: SubmissionResponse,
    pub(crate) definition_title: String,
    pub(crate) items: Vec<ReviewItemResponse>,
    pub(crate) suggested_final_score: Option<f64>,
    pub(crate) available_actions: Vec<&'static str>,
}

impl From<SubmissionDetail> for SubmissionDetailResponse {
    fn from(detail: SubmissionDetail) -> Self {
        Self {
            submission: detail.submission.into(),
            definition_title: detail.definition_title,
            items: detail.items.into_iter().map(Into::into).collect(),
            suggested_final_score: detail.suggested_final_score,
            available_actions: detail.actions,
        }
    }
}
