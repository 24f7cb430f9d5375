use serde::{Deserialize, Serialize};

use crate::services::workflow_error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CallerRole {
    Student,
    Teacher,
    Reviewer,
    Admin,
    GradingService,
}

pub(crate) const STAFF_ROLES: &[CallerRole] =
    &[CallerRole::Teacher, CallerRole::Reviewer, CallerRole::Admin];
pub(crate) const AUTHOR_ROLES: &[CallerRole] = &[CallerRole::Teacher, CallerRole::Admin];
pub(crate) const REVIEWER_ROLES: &[CallerRole] = &[CallerRole::Reviewer, CallerRole::Admin];

/// Identity and role of whoever is invoking a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallerContext {
    user_ref: String,
    role: CallerRole,
}

impl CallerContext {
    pub(crate) fn new(user_ref: impl Into<String>, role: CallerRole) -> Self {
        Self { user_ref: user_ref.into(), role }
    }

    pub(crate) fn user_ref(&self) -> &str {
        &self.user_ref
    }

    pub(crate) fn role(&self) -> CallerRole {
        self.role
    }

    pub(crate) fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }

    pub(crate) fn require_any(
        &self,
        action: &'static str,
        roles: &[CallerRole],
    ) -> Result<(), WorkflowError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(WorkflowError::NotPermitted { action })
        }
    }

    /// Owners act on their own records; admins act for anyone.
    pub(crate) fn require_owner(
        &self,
        action: &'static str,
        owner_ref: &str,
    ) -> Result<(), WorkflowError> {
        if self.is_admin() || self.user_ref == owner_ref {
            Ok(())
        } else {
            Err(WorkflowError::NotPermitted { action })
        }
    }
}
