//! Approval state machine for assessment definitions.
//!
//! Each transition borrows the current record and returns an updated copy, so
//! a failed call leaves the caller's value exactly as it was.

use sqlx::types::Json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::AssessmentDefinition;
use crate::db::types::{ApprovalStatus, Modality};
use crate::services::caller::{CallerContext, AUTHOR_ROLES, REVIEWER_ROLES};
use crate::services::questions::{validate_question_set, Question};
use crate::services::workflow_error::WorkflowError;

#[derive(Debug, Clone)]
pub(crate) struct DefinitionInput {
    pub(crate) lesson_ref: String,
    pub(crate) title: String,
    pub(crate) modality: Modality,
    pub(crate) questions: Vec<Question>,
    pub(crate) time_limit_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ApprovalOutcome {
    pub(crate) approved: AssessmentDefinition,
    /// The previously selectable definition for the same lesson and modality.
    pub(crate) archived: Option<AssessmentDefinition>,
}

fn validate_input(input: &DefinitionInput) -> Result<(), WorkflowError> {
    if input.lesson_ref.trim().is_empty() {
        return Err(WorkflowError::invalid_definition("lesson reference is required"));
    }
    if input.title.trim().is_empty() {
        return Err(WorkflowError::invalid_definition("title is required"));
    }
    validate_question_set(input.modality, &input.questions, input.time_limit_minutes)
}

pub(crate) fn create_definition(
    caller: &CallerContext,
    input: DefinitionInput,
    now: PrimitiveDateTime,
) -> Result<AssessmentDefinition, WorkflowError> {
    caller.require_any("create definition", AUTHOR_ROLES)?;
    validate_input(&input)?;

    Ok(AssessmentDefinition {
        id: Uuid::new_v4().to_string(),
        lesson_ref: input.lesson_ref.trim().to_string(),
        title: input.title.trim().to_string(),
        modality: input.modality,
        questions: Json(input.questions),
        time_limit_minutes: input.time_limit_minutes,
        status: ApprovalStatus::Draft,
        author_ref: caller.user_ref().to_string(),
        reviewer_ref: None,
        review_notes: None,
        reviewed_at: None,
        version: 1,
        revision: 0,
        created_at: now,
        updated_at: now,
    })
}

pub(crate) fn edit_definition(
    caller: &CallerContext,
    definition: &AssessmentDefinition,
    input: DefinitionInput,
    now: PrimitiveDateTime,
) -> Result<AssessmentDefinition, WorkflowError> {
    caller.require_any("edit definition", AUTHOR_ROLES)?;
    caller.require_owner("edit definition", &definition.author_ref)?;
    if !definition.status.is_editable() {
        return Err(WorkflowError::invalid_transition(
            "edit",
            definition.status,
            "only draft or rejected assessments can be edited",
        ));
    }
    validate_input(&input)?;

    Ok(AssessmentDefinition {
        lesson_ref: input.lesson_ref.trim().to_string(),
        title: input.title.trim().to_string(),
        modality: input.modality,
        questions: Json(input.questions),
        time_limit_minutes: input.time_limit_minutes,
        version: definition.version + 1,
        updated_at: now,
        ..definition.clone()
    })
}

pub(crate) fn submit_for_review(
    caller: &CallerContext,
    definition: &AssessmentDefinition,
    now: PrimitiveDateTime,
) -> Result<AssessmentDefinition, WorkflowError> {
    caller.require_any("submit for review", AUTHOR_ROLES)?;
    caller.require_owner("submit for review", &definition.author_ref)?;
    if !definition.status.is_editable() {
        return Err(WorkflowError::invalid_transition(
            "submit for review",
            definition.status,
            "only draft or rejected assessments can be submitted for review",
        ));
    }

    Ok(AssessmentDefinition {
        status: ApprovalStatus::PendingReview,
        review_notes: None,
        updated_at: now,
        ..definition.clone()
    })
}

/// Approves `definition` and demotes `current_approved` when it holds the same
/// (lesson, modality) slot. Anything else passed as `current_approved` is left alone.
pub(crate) fn approve(
    caller: &CallerContext,
    definition: &AssessmentDefinition,
    notes: Option<String>,
    current_approved: Option<&AssessmentDefinition>,
    now: PrimitiveDateTime,
) -> Result<ApprovalOutcome, WorkflowError> {
    caller.require_any("approve", REVIEWER_ROLES)?;
    if definition.status != ApprovalStatus::PendingReview {
        return Err(WorkflowError::invalid_transition(
            "approve",
            definition.status,
            "submit the assessment for review first",
        ));
    }
    if caller.user_ref() == definition.author_ref {
        return Err(WorkflowError::invalid_transition(
            "approve",
            definition.status,
            "authors cannot approve their own assessment",
        ));
    }

    let archived = current_approved
        .filter(|current| {
            current.id != definition.id
                && current.status == ApprovalStatus::Approved
                && current.same_slot(definition)
        })
        .map(|current| AssessmentDefinition {
            status: ApprovalStatus::Archived,
            updated_at: now,
            ..current.clone()
        });

    let approved = AssessmentDefinition {
        status: ApprovalStatus::Approved,
        reviewer_ref: Some(caller.user_ref().to_string()),
        review_notes: notes.map(|value| value.trim().to_string()).filter(|value| !value.is_empty()),
        reviewed_at: Some(now),
        updated_at: now,
        ..definition.clone()
    };

    Ok(ApprovalOutcome { approved, archived })
}

pub(crate) fn reject(
    caller: &CallerContext,
    definition: &AssessmentDefinition,
    notes: &str,
    now: PrimitiveDateTime,
) -> Result<AssessmentDefinition, WorkflowError> {
    caller.require_any("reject", REVIEWER_ROLES)?;
    if definition.status != ApprovalStatus::PendingReview {
        return Err(WorkflowError::invalid_transition(
            "reject",
            definition.status,
            "only assessments pending review can be rejected",
        ));
    }
    let notes = notes.trim();
    if notes.is_empty() {
        return Err(WorkflowError::invalid_transition(
            "reject",
            definition.status,
            "rejection requires notes",
        ));
    }

    Ok(AssessmentDefinition {
        status: ApprovalStatus::Rejected,
        reviewer_ref: Some(caller.user_ref().to_string()),
        review_notes: Some(notes.to_string()),
        reviewed_at: Some(now),
        updated_at: now,
        ..definition.clone()
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::services::caller::CallerRole;

    #[test]
    fn create_starts_as_draft_version_one() {
        let definition = create_definition(&teacher(), mcq_input("lesson-1"), now()).unwrap();
        assert_eq!(definition.status, ApprovalStatus::Draft);
        assert_eq!(definition.version, 1);
        assert_eq!(definition.author_ref, "teacher-1");
    }

    #[test]
    fn students_cannot_author() {
        let student = CallerContext::new("student-1", CallerRole::Student);
        assert_eq!(
            create_definition(&student, mcq_input("lesson-1"), now()).unwrap_err(),
            WorkflowError::NotPermitted { action: "create definition" }
        );
    }

    #[test]
    fn edit_bumps_version_and_keeps_status() {
        let rejected = with_status(mcq_input("lesson-1"), ApprovalStatus::Rejected);
        let mut input = mcq_input("lesson-1");
        input.title = "Fractions check v2".into();
        let edited = edit_definition(&teacher(), &rejected, input, now()).unwrap();
        assert_eq!(edited.version, 2);
        assert_eq!(edited.status, ApprovalStatus::Rejected);
        assert_eq!(edited.title, "Fractions check v2");
    }

    #[test]
    fn edit_is_refused_once_pending() {
        let pending = with_status(mcq_input("lesson-1"), ApprovalStatus::PendingReview);
        let err = edit_definition(&teacher(), &pending, mcq_input("lesson-1"), now()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { action: "edit", .. }));
    }

    #[test]
    fn resubmission_clears_review_notes() {
        let mut rejected = with_status(mcq_input("lesson-1"), ApprovalStatus::Rejected);
        rejected.review_notes = Some("Question 3 is ambiguous".into());
        let pending = submit_for_review(&teacher(), &rejected, now()).unwrap();
        assert_eq!(pending.status, ApprovalStatus::PendingReview);
        assert_eq!(pending.review_notes, None);
    }

    #[test]
    fn approve_on_draft_fails_and_leaves_draft() {
        let draft = with_status(mcq_input("lesson-1"), ApprovalStatus::Draft);
        let before = draft.clone();
        let err = approve(&reviewer(), &draft, None, None, now()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { action: "approve", .. }));
        assert_eq!(draft, before);
        assert_eq!(draft.status, ApprovalStatus::Draft);
    }

    #[test]
    fn approve_and_reject_require_pending_review() {
        for status in [
            ApprovalStatus::Draft,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
            ApprovalStatus::Archived,
        ] {
            let definition = with_status(mcq_input("lesson-1"), status);
            assert!(approve(&reviewer(), &definition, None, None, now()).is_err());
            assert!(reject(&reviewer(), &definition, "needs work", now()).is_err());
        }
    }

    #[test]
    fn self_approval_is_refused() {
        let pending = with_status(mcq_input("lesson-1"), ApprovalStatus::PendingReview);
        let author_as_admin = CallerContext::new("teacher-1", CallerRole::Admin);
        let err = approve(&author_as_admin, &pending, None, None, now()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn approve_demotes_only_the_same_slot() {
        let pending = with_status(mcq_input("lesson-1"), ApprovalStatus::PendingReview);
        let same_slot = with_status(mcq_input("lesson-1"), ApprovalStatus::Approved);
        let other_lesson = with_status(mcq_input("lesson-2"), ApprovalStatus::Approved);
        let other_modality = with_status(qa_input("lesson-1"), ApprovalStatus::Approved);

        let outcome = approve(&reviewer(), &pending, None, Some(&same_slot), now()).unwrap();
        assert_eq!(outcome.approved.status, ApprovalStatus::Approved);
        assert_eq!(outcome.approved.reviewer_ref.as_deref(), Some("reviewer-1"));
        let archived = outcome.archived.expect("demoted");
        assert_eq!(archived.id, same_slot.id);
        assert_eq!(archived.status, ApprovalStatus::Archived);

        for unrelated in [&other_lesson, &other_modality] {
            let outcome = approve(&reviewer(), &pending, None, Some(unrelated), now()).unwrap();
            assert!(outcome.archived.is_none());
        }
    }

    #[test]
    fn reject_requires_notes() {
        let pending = with_status(mcq_input("lesson-1"), ApprovalStatus::PendingReview);
        let err = reject(&reviewer(), &pending, "   ", now()).unwrap_err();
        assert_eq!(err.remediation(), "rejection requires notes");

        let rejected = reject(&reviewer(), &pending, "Clarify question 2", now()).unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rejected);
        assert_eq!(rejected.review_notes.as_deref(), Some("Clarify question 2"));
    }
}
