use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::{format_optional, format_primitive};
use crate::db::models::AssessmentDefinition;
use crate::db::types::{ApprovalStatus, Modality};
use crate::services::approval::DefinitionInput;
use crate::services::questions::Question;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct DefinitionWrite {
    #[serde(alias = "lessonRef")]
    #[validate(length(min = 1, max = 128, message = "lesson_ref must be 1-128 characters"))]
    pub(crate) lesson_ref: String,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    pub(crate) modality: Modality,
    #[validate(length(min = 1, max = 100, message = "questions must contain 1-100 items"))]
    pub(crate) questions: Vec<Question>,
    #[serde(default)]
    #[serde(alias = "timeLimitMinutes")]
    #[validate(range(min = 1, max = 600, message = "time_limit_minutes must be 1-600"))]
    pub(crate) time_limit_minutes: Option<i32>,
}

impl From<DefinitionWrite> for DefinitionInput {
    fn from(payload: DefinitionWrite) -> Self {
        DefinitionInput {
            lesson_ref: payload.lesson_ref.trim().to_string(),
            title: payload.title.trim().to_string(),
            modality: payload.modality,
            questions: payload.questions,
            time_limit_minutes: payload.time_limit_minutes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct ApproveRequest {
    #[serde(default)]
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RejectRequest {
    #[serde(default)]
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub(crate) notes: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonAssessmentsQuery {
    #[serde(default)]
    pub(crate) modality: Option<Modality>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DefinitionResponse {
    pub(crate) id: String,
    pub(crate) lesson_ref: String,
    pub(crate) title: String,
    pub(crate) modality: Modality,
    pub(crate) questions: Vec<Question>,
    pub(crate) question_count: usize,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) status: ApprovalStatus,
    pub(crate) author_ref: String,
    pub(crate) reviewer_ref: Option<String>,
    pub(crate) review_notes: Option<String>,
    pub(crate) reviewed_at: Option<String>,
    pub(crate) version: i32,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<AssessmentDefinition> for DefinitionResponse {
    fn from(definition: AssessmentDefinition) -> Self {
        Self {
            question_count: definition.question_count(),
            id: definition.id,
            lesson_ref: definition.lesson_ref,
            title: definition.title,
            modality: definition.modality,
            questions: definition.questions.0,
            time_limit_minutes: definition.time_limit_minutes,
            status: definition.status,
            author_ref: definition.author_ref,
            reviewer_ref: definition.reviewer_ref,
            review_notes: definition.review_notes,
            reviewed_at: format_optional(definition.reviewed_at),
            version: definition.version,
            created_at: format_primitive(definition.created_at),
            updated_at: format_primitive(definition.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn definition_payload_accepts_tagged_questions() {
        let payload: DefinitionWrite = serde_json::from_value(json!({
            "lessonRef": "lesson-7",
            "title": "  Water cycle  ",
            "modality": "qa",
            "questions": [
                {"kind": "qa", "prompt": "Describe evaporation", "expected_points": "heat, vapour"}
            ],
            "time_limit_minutes": 15
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let input = DefinitionInput::from(payload);
        assert_eq!(input.title, "Water cycle");
        assert_eq!(input.questions[0].modality(), Modality::Qa);
    }

    #[test]
    fn oversized_reject_notes_fail_validation() {
        let payload = RejectRequest { notes: "x".repeat(2001) };
        assert!(payload.validate().is_err());
        assert!(RejectRequest { notes: String::new() }.validate().is_ok());
    }
}
