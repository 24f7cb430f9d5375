pub(crate) mod ai_feedback;
pub(crate) mod approval;
pub(crate) mod attempt_session;
pub(crate) mod caller;
pub(crate) mod definition_review;
pub(crate) mod grading_workflow;
pub(crate) mod questions;
pub(crate) mod review_surface;
pub(crate) mod scoring;
pub(crate) mod service_error;
pub(crate) mod submission_grading;
pub(crate) mod workflow_error;
