use std::sync::OnceLock;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub(crate) const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
pub(crate) const DEFINITION_TRANSITIONS_TOTAL: &str = "definition_transitions_total";
pub(crate) const SUBMISSIONS_TOTAL: &str = "submissions_total";
pub(crate) const SUBMISSION_TRANSITIONS_TOTAL: &str = "submission_transitions_total";
pub(crate) const STORE_CONFLICTS_TOTAL: &str = "store_conflicts_total";
pub(crate) const AI_GRADING_JOBS_TOTAL: &str = "ai_grading_jobs_total";
pub(crate) const AI_GRADING_DURATION: &str = "ai_grading_duration_seconds";
pub(crate) const GRADING_QUEUE_STALE: &str = "grading_queue_stale_claims";

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP requests by status");
    describe_histogram!(HTTP_REQUEST_DURATION, Unit::Seconds, "HTTP request latency");
    describe_counter!(
        DEFINITION_TRANSITIONS_TOTAL,
        "Approval workflow transitions by action and outcome"
    );
    describe_counter!(SUBMISSIONS_TOTAL, "Submissions recorded by modality");
    describe_counter!(
        SUBMISSION_TRANSITIONS_TOTAL,
        "Grading state machine transitions by action and outcome"
    );
    describe_counter!(STORE_CONFLICTS_TOTAL, "Compare-and-set conflicts retried by entity");
    describe_counter!(AI_GRADING_JOBS_TOTAL, "AI grading jobs by outcome");
    describe_histogram!(AI_GRADING_DURATION, Unit::Seconds, "AI grading call latency");
    describe_gauge!(GRADING_QUEUE_STALE, "QA submissions with no AI attempts left");
}
