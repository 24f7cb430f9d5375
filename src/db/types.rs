use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "modality", rename_all = "lowercase")]
pub(crate) enum Modality {
    Mcq,
    Qa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "approvalstatus", rename_all = "snake_case")]
pub(crate) enum ApprovalStatus {
    Draft,
    PendingReview,
    Approved,
    Rejected,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "submissionstatus", rename_all = "snake_case")]
pub(crate) enum SubmissionStatus {
    Submitted,
    AiGraded,
    TeacherReview,
    Finalized,
    Approved,
    Rejected,
}

impl Modality {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::Qa => "qa",
        }
    }
}

impl ApprovalStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Archived => "archived",
        }
    }

    /// Statuses in which the author may still change the question set.
    pub(crate) fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

impl SubmissionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::AiGraded => "ai_graded",
            Self::TeacherReview => "teacher_review",
            Self::Finalized => "finalized",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_database_labels() {
        assert_eq!(
            serde_json::to_value(ApprovalStatus::PendingReview).unwrap(),
            serde_json::json!("pending_review")
        );
        assert_eq!(
            serde_json::to_value(SubmissionStatus::TeacherReview).unwrap(),
            serde_json::json!(SubmissionStatus::TeacherReview.as_str())
        );
        assert_eq!(serde_json::from_str::<Modality>("\"qa\"").unwrap(), Modality::Qa);
    }

    #[test]
    fn only_draft_and_rejected_are_editable() {
        assert!(ApprovalStatus::Draft.is_editable());
        assert!(ApprovalStatus::Rejected.is_editable());
        assert!(!ApprovalStatus::PendingReview.is_editable());
        assert!(!ApprovalStatus::Approved.is_editable());
        assert!(!ApprovalStatus::Archived.is_editable());
    }
}
