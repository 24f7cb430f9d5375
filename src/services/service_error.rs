use thiserror::Error;

use crate::repositories::store::StoreError;
use crate::services::workflow_error::WorkflowError;

/// Reload-and-retry budget for compare-and-set conflicts.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub(crate) enum ServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{entity} {id} kept changing during the update")]
    Stale { entity: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            Self::Workflow(err) => err.kind(),
            Self::NotFound { .. } => "not_found",
            Self::Stale { .. } => "stale",
            Self::Store(_) => "store_error",
        }
    }
}
