use anyhow::{Context, Result};

use crate::core::metrics::GRADING_QUEUE_STALE;
use crate::core::state::AppState;

/// Publishes how many QA submissions ran out of AI attempts. Those wait for a
/// reviewer to finalize them by hand or to request grading again.
pub(crate) async fn report_exhausted_claims(state: &AppState) -> Result<i64> {
    let max_attempts = state.settings().grading().max_ai_attempts;
    let exhausted = state
        .store()
        .count_exhausted_ai_claims(max_attempts)
        .await
        .context("Failed to count exhausted AI claims")?;

    metrics::gauge!(GRADING_QUEUE_STALE).set(exhausted as f64);
    if exhausted > 0 {
        tracing::warn!(exhausted, max_attempts, "Submissions are out of AI grading attempts");
    }

    Ok(exhausted)
}
