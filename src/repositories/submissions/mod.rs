mod commands;
mod queries;
mod types;

pub(crate) use commands::{claim_next_for_ai, insert_if_absent, update_if_current};
pub(crate) use queries::{
    count_exhausted_ai_claims, count_review_queue, find_by_attempt, find_by_id, list_review_queue,
};
pub(crate) use types::REVIEW_QUEUE_STATUSES;
