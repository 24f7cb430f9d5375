mod maintenance;
mod worker;

pub(crate) use maintenance::report_exhausted_claims;
pub(crate) use worker::grade_next_submission;
