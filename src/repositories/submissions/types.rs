use crate::db::types::SubmissionStatus;

pub(crate) const COLUMNS: &str = "\
    id, definition_id, definition_version, modality, student_ref, attempt_id, answers, \
    mcq_result, mcq_score, ai_feedback, ai_analysis_report, ai_requested_at, ai_attempts, \
    ai_error, ai_graded_at, teacher_feedback, final_score, reviewer_ref, review_started_at, \
    finalized_by, finalized_at, status, time_taken_seconds, integrity_event_count, \
    submitted_at, updated_at, revision";

/// Statuses that still need a human decision. MCQ submissions only ever sit
/// in `Submitted` among these.
pub(crate) const REVIEW_QUEUE_STATUSES: &[SubmissionStatus] =
    &[SubmissionStatus::Submitted, SubmissionStatus::AiGraded, SubmissionStatus::TeacherReview];
