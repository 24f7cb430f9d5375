use thiserror::Error;

/// Typed failures of the approval, attempt and grading engines.
///
/// Every engine call that returns one of these has left its input untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum WorkflowError {
    #[error("cannot {action} while {from}: {reason}")]
    InvalidTransition { action: &'static str, from: String, reason: String },
    #[error("attempt is incomplete; unanswered questions: {missing:?}")]
    IncompleteAttempt { missing: Vec<usize> },
    #[error("no assessment available")]
    NotApproved,
    #[error("submission {submission_id} is already finalized")]
    AlreadyFinalized { submission_id: String },
    #[error("score {score} is outside the 0-100 range")]
    ScoreOutOfRange { score: f64 },
    #[error("invalid definition: {reason}")]
    InvalidDefinition { reason: String },
    #[error("invalid answer for question {index}: {reason}")]
    InvalidAnswer { index: usize, reason: String },
    #[error("{action} is not permitted for this caller")]
    NotPermitted { action: &'static str },
    #[error("invalid AI feedback: {reason}")]
    InvalidFeedback { reason: String },
}

impl WorkflowError {
    pub(crate) fn invalid_transition(
        action: &'static str,
        from: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition { action, from: from.to_string(), reason: reason.into() }
    }

    pub(crate) fn invalid_definition(reason: impl Into<String>) -> Self {
        Self::InvalidDefinition { reason: reason.into() }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::IncompleteAttempt { .. } => "incomplete_attempt",
            Self::NotApproved => "not_approved",
            Self::AlreadyFinalized { .. } => "already_finalized",
            Self::ScoreOutOfRange { .. } => "score_out_of_range",
            Self::InvalidDefinition { .. } => "invalid_definition",
            Self::InvalidAnswer { .. } => "invalid_answer",
            Self::NotPermitted { .. } => "not_permitted",
            Self::InvalidFeedback { .. } => "invalid_feedback",
        }
    }

    /// Guidance shown next to the failure on the review surface.
    pub(crate) fn remediation(&self) -> String {
        match self {
            Self::InvalidTransition { reason, .. } => reason.clone(),
            Self::IncompleteAttempt { missing } => {
                let listed: Vec<String> =
                    missing.iter().map(|index| (index + 1).to_string()).collect();
                format!("Answer question(s) {} before finishing", listed.join(", "))
            }
            Self::NotApproved => "No assessment is available for this lesson yet".to_string(),
            Self::AlreadyFinalized { .. } => {
                "This submission has already been finalized; reload to see the final score"
                    .to_string()
            }
            Self::ScoreOutOfRange { .. } => "Enter a final score between 0 and 100".to_string(),
            Self::InvalidDefinition { reason } => format!("Fix the assessment: {reason}"),
            Self::InvalidAnswer { reason, .. } => format!("Change the answer: {reason}"),
            Self::NotPermitted { .. } => "Your role does not allow this action".to_string(),
            Self::InvalidFeedback { .. } => "Request AI grading again".to_string(),
        }
    }
}
