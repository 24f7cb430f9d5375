//! Drives one student through an approved definition.
//!
//! The session lives only in memory. Navigation and answer capture never do
//! I/O; `finish` packages the attempt into a draft the caller submits.

use std::collections::BTreeMap;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::core::time::elapsed_seconds;
use crate::db::models::AssessmentDefinition;
use crate::db::types::{ApprovalStatus, Modality};
use crate::services::questions::{Answer, AnswerEntry, McqQuestion, Question};
use crate::services::scoring::{score_mcq, McqScore};
use crate::services::workflow_error::WorkflowError;

#[derive(Debug, Clone)]
pub(crate) struct AttemptSession {
    definition: AssessmentDefinition,
    attempt_id: String,
    current_index: usize,
    furthest_visited: usize,
    captured: BTreeMap<usize, Answer>,
    per_question_result: Option<Vec<bool>>,
    started_at: OffsetDateTime,
    integrity_event_count: u32,
}

/// A finished attempt, ready to be recorded as a Submitted submission.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SubmissionDraft {
    pub(crate) definition_id: String,
    pub(crate) definition_version: i32,
    pub(crate) modality: Modality,
    pub(crate) attempt_id: String,
    /// One entry per question, `answers[i].question_index == i`.
    pub(crate) answers: Vec<AnswerEntry>,
    pub(crate) mcq: Option<McqScore>,
    pub(crate) time_taken_seconds: i32,
    pub(crate) integrity_event_count: i32,
}

impl AttemptSession {
    pub(crate) fn start(
        definition: &AssessmentDefinition,
        started_at: OffsetDateTime,
    ) -> Result<Self, WorkflowError> {
        Self::start_with_id(definition, Uuid::new_v4().to_string(), started_at)
    }

    pub(crate) fn start_with_id(
        definition: &AssessmentDefinition,
        attempt_id: String,
        started_at: OffsetDateTime,
    ) -> Result<Self, WorkflowError> {
        if definition.status != ApprovalStatus::Approved || definition.question_count() == 0 {
            return Err(WorkflowError::NotApproved);
        }

        Ok(Self {
            definition: definition.clone(),
            attempt_id,
            current_index: 0,
            furthest_visited: 0,
            captured: BTreeMap::new(),
            per_question_result: None,
            started_at,
            integrity_event_count: 0,
        })
    }

    pub(crate) fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current_index
    }

    pub(crate) fn question_count(&self) -> usize {
        self.definition.question_count()
    }

    pub(crate) fn answer(&self, index: usize) -> Option<&Answer> {
        self.captured.get(&index)
    }

    pub(crate) fn integrity_event_count(&self) -> u32 {
        self.integrity_event_count
    }

    /// Per-question correctness, available once an MCQ attempt has finished.
    pub(crate) fn per_question_result(&self) -> Option<&[bool]> {
        self.per_question_result.as_deref()
    }

    /// Records an answer for the current or an earlier visited question.
    pub(crate) fn select_answer(&mut self, index: usize, answer: Answer) -> Result<(), WorkflowError> {
        let Some(question) = self.definition.questions.0.get(index) else {
            return Err(WorkflowError::InvalidAnswer {
                index,
                reason: format!("the assessment has {} questions", self.question_count()),
            });
        };
        if index > self.furthest_visited {
            return Err(WorkflowError::InvalidAnswer {
                index,
                reason: "question has not been reached yet".to_string(),
            });
        }
        question.check_answer(index, &answer)?;

        self.captured.insert(index, answer);
        Ok(())
    }

    pub(crate) fn go_next(&mut self) {
        if self.current_index + 1 < self.question_count() {
            self.current_index += 1;
            self.furthest_visited = self.furthest_visited.max(self.current_index);
        }
    }

    pub(crate) fn go_previous(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    /// Loss of exclusive focus. Informational only.
    pub(crate) fn record_integrity_event(&mut self) {
        self.integrity_event_count = self.integrity_event_count.saturating_add(1);
    }

    /// Remaining time for timed free-response assessments.
    pub(crate) fn time_remaining(&self, now: OffsetDateTime) -> Option<Duration> {
        let minutes = self.definition.time_limit_minutes?;
        let deadline = self.started_at + Duration::minutes(i64::from(minutes));
        Some((deadline - now).max(Duration::ZERO))
    }

    pub(crate) fn missing_indices(&self) -> Vec<usize> {
        (0..self.question_count()).filter(|index| !self.captured.contains_key(index)).collect()
    }

    /// Packages the attempt. Captured answers stay in the session whether or
    /// not this succeeds, so a failed submit can be retried.
    pub(crate) fn finish(&mut self, now: OffsetDateTime) -> Result<SubmissionDraft, WorkflowError> {
        let missing = self.missing_indices();
        if !missing.is_empty() {
            return Err(WorkflowError::IncompleteAttempt { missing });
        }

        let answers: Vec<AnswerEntry> = self
            .captured
            .iter()
            .map(|(index, answer)| AnswerEntry { question_index: *index, answer: answer.clone() })
            .collect();

        let mcq = match self.definition.modality {
            Modality::Mcq => {
                let keys: Vec<&McqQuestion> = self
                    .definition
                    .questions
                    .0
                    .iter()
                    .filter_map(|question| match question {
                        Question::Mcq(mcq) => Some(mcq),
                        Question::Qa(_) => None,
                    })
                    .collect();
                let selected: Vec<Option<usize>> =
                    answers.iter().map(|entry| entry.answer.selected_option()).collect();
                let score = score_mcq(&keys, &selected);
                self.per_question_result = Some(score.per_question.clone());
                Some(score)
            }
            Modality::Qa => None,
        };

        Ok(SubmissionDraft {
            definition_id: self.definition.id.clone(),
            definition_version: self.definition.version,
            modality: self.definition.modality,
            attempt_id: self.attempt_id.clone(),
            answers,
            mcq,
            time_taken_seconds: elapsed_seconds(self.started_at, now),
            integrity_event_count: i32::try_from(self.integrity_event_count).unwrap_or(i32::MAX),
        })
    }
}

/// An attempt as reported by a client after the fact.
#[derive(Debug, Clone)]
pub(crate) struct ReportedAttempt {
    pub(crate) attempt_id: String,
    pub(crate) answers: Vec<AnswerEntry>,
    pub(crate) time_taken_seconds: u32,
    pub(crate) integrity_event_count: u32,
}

/// Replays a reported attempt through a fresh session in question order, so
/// the server applies the same validation and scoring as the live controller.
pub(crate) fn replay_attempt(
    definition: &AssessmentDefinition,
    reported: ReportedAttempt,
    now: OffsetDateTime,
) -> Result<SubmissionDraft, WorkflowError> {
    let started_at = now - Duration::seconds(i64::from(reported.time_taken_seconds));
    let mut session = AttemptSession::start_with_id(definition, reported.attempt_id, started_at)?;

    let mut by_index: BTreeMap<usize, Answer> = BTreeMap::new();
    for entry in reported.answers {
        if by_index.insert(entry.question_index, entry.answer).is_some() {
            return Err(WorkflowError::InvalidAnswer {
                index: entry.question_index,
                reason: "question answered more than once".to_string(),
            });
        }
    }
    if let Some((&index, _)) = by_index.range(session.question_count()..).next() {
        return Err(WorkflowError::InvalidAnswer {
            index,
            reason: format!("the assessment has {} questions", session.question_count()),
        });
    }

    for index in 0..session.question_count() {
        if let Some(answer) = by_index.remove(&index) {
            session.select_answer(index, answer)?;
        }
        session.go_next();
    }
    session.integrity_event_count = reported.integrity_event_count;

    // Time limits are informational; late attempts are still recorded.
    if session.time_remaining(now) == Some(Duration::ZERO) {
        tracing::warn!(
            definition_id = %definition.id,
            attempt_id = %session.attempt_id,
            time_taken_seconds = reported.time_taken_seconds,
            "Attempt reported past its time limit"
        );
    }

    session.finish(now)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::services::approval::fixtures::{mcq_input, qa_input, with_status};

    fn approved_mcq() -> AssessmentDefinition {
        with_status(mcq_input("lesson-1"), ApprovalStatus::Approved)
    }

    const T0: OffsetDateTime = datetime!(2025-03-01 10:00:00 UTC);

    #[test]
    fn start_requires_approved_definition() {
        for status in [ApprovalStatus::Draft, ApprovalStatus::PendingReview, ApprovalStatus::Archived]
        {
            let definition = with_status(mcq_input("lesson-1"), status);
            assert_eq!(AttemptSession::start(&definition, T0).unwrap_err(), WorkflowError::NotApproved);
        }
        let session = AttemptSession::start(&approved_mcq(), T0).unwrap();
        assert_eq!(session.current_index(), 0);
        assert!(Uuid::parse_str(session.attempt_id()).is_ok());
        assert!(session.answer(0).is_none());
    }

    #[test]
    fn navigation_is_bounded() {
        let mut session = AttemptSession::start(&approved_mcq(), T0).unwrap();
        session.go_previous();
        assert_eq!(session.current_index(), 0);
        for _ in 0..10 {
            session.go_next();
        }
        assert_eq!(session.current_index(), 3);
        session.go_previous();
        assert_eq!(session.current_index(), 2);
    }

    #[test]
    fn answers_only_for_visited_questions() {
        let mut session = AttemptSession::start(&approved_mcq(), T0).unwrap();
        assert!(session.select_answer(2, Answer::SelectedOption(0)).is_err());

        session.select_answer(0, Answer::SelectedOption(1)).unwrap();
        session.go_next();
        session.go_next();
        session.go_previous();
        session.go_previous();
        // back on question 0, question 2 was visited and stays answerable
        session.select_answer(2, Answer::SelectedOption(2)).unwrap();
        session.select_answer(0, Answer::SelectedOption(0)).unwrap();
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.answer(0), Some(&Answer::SelectedOption(0)));
        assert!(session.select_answer(1, Answer::FreeText("B".into())).is_err());
    }

    #[test]
    fn finish_reports_exact_missing_indices_and_keeps_answers() {
        let mut session = AttemptSession::start(&approved_mcq(), T0).unwrap();
        session.select_answer(0, Answer::SelectedOption(0)).unwrap();
        session.go_next();
        session.go_next();
        session.select_answer(2, Answer::SelectedOption(2)).unwrap();

        let err = session.finish(T0).unwrap_err();
        assert_eq!(err, WorkflowError::IncompleteAttempt { missing: vec![1, 3] });
        assert_eq!(session.answer(0), Some(&Answer::SelectedOption(0)));
        assert_eq!(session.answer(2), Some(&Answer::SelectedOption(2)));
    }

    #[test]
    fn finish_scores_mcq_in_question_order() {
        let mut session = AttemptSession::start(&approved_mcq(), T0).unwrap();
        for (index, selected) in [0, 1, 0, 3].into_iter().enumerate() {
            session.select_answer(index, Answer::SelectedOption(selected)).unwrap();
            session.go_next();
        }
        session.record_integrity_event();
        assert_eq!(session.integrity_event_count(), 1);

        let draft = session.finish(T0 + Duration::seconds(95)).unwrap();
        let score = draft.mcq.expect("mcq score");
        assert_eq!(score.percentage, 75);
        assert_eq!(session.per_question_result(), Some(&[true, true, false, true][..]));
        assert_eq!(draft.time_taken_seconds, 95);
        assert_eq!(draft.integrity_event_count, 1);
        for (index, entry) in draft.answers.iter().enumerate() {
            assert_eq!(entry.question_index, index);
        }
    }

    #[test]
    fn qa_time_remaining_counts_down_to_zero() {
        let definition = with_status(qa_input("lesson-1"), ApprovalStatus::Approved);
        let session = AttemptSession::start(&definition, T0).unwrap();
        assert_eq!(session.time_remaining(T0 + Duration::minutes(5)), Some(Duration::minutes(15)));
        assert_eq!(session.time_remaining(T0 + Duration::hours(1)), Some(Duration::ZERO));

        let untimed = AttemptSession::start(&approved_mcq(), T0).unwrap();
        assert_eq!(untimed.time_remaining(T0), None);
    }

    #[test]
    fn replay_accepts_out_of_order_entries() {
        let definition = with_status(qa_input("lesson-1"), ApprovalStatus::Approved);
        let reported = ReportedAttempt {
            attempt_id: "attempt-1".into(),
            answers: vec![
                AnswerEntry { question_index: 1, answer: Answer::FreeText("Clouds form".into()) },
                AnswerEntry { question_index: 0, answer: Answer::FreeText("Water warms".into()) },
            ],
            time_taken_seconds: 600,
            integrity_event_count: 2,
        };

        let draft = replay_attempt(&definition, reported, T0).unwrap();
        assert_eq!(draft.attempt_id, "attempt-1");
        assert_eq!(draft.answers[0].answer, Answer::FreeText("Water warms".into()));
        assert_eq!(draft.time_taken_seconds, 600);
        assert_eq!(draft.integrity_event_count, 2);
        assert!(draft.mcq.is_none());
    }

    #[test]
    fn replay_rejects_duplicates_and_unknown_questions() {
        let definition = approved_mcq();
        let entry = |index| AnswerEntry { question_index: index, answer: Answer::SelectedOption(0) };
        let reported = |answers| ReportedAttempt {
            attempt_id: "a".into(),
            answers,
            time_taken_seconds: 0,
            integrity_event_count: 0,
        };

        let duplicate = replay_attempt(&definition, reported(vec![entry(0), entry(0)]), T0);
        assert!(matches!(duplicate, Err(WorkflowError::InvalidAnswer { index: 0, .. })));

        let unknown = replay_attempt(&definition, reported(vec![entry(7)]), T0);
        assert!(matches!(unknown, Err(WorkflowError::InvalidAnswer { index: 7, .. })));

        let partial = replay_attempt(&definition, reported(vec![entry(0), entry(2)]), T0);
        assert_eq!(partial.unwrap_err(), WorkflowError::IncompleteAttempt { missing: vec![1, 3] });
    }

    #[test]
    fn replay_carries_large_integrity_counts_without_looping() {
        let reported = ReportedAttempt {
            attempt_id: "attempt-integrity".into(),
            answers: (0..4)
                .map(|index| AnswerEntry { question_index: index, answer: Answer::SelectedOption(0) })
                .collect(),
            time_taken_seconds: 30,
            integrity_event_count: u32::MAX,
        };
        let draft = replay_attempt(&approved_mcq(), reported, T0).unwrap();
        assert_eq!(draft.integrity_event_count, i32::MAX);
    }

    #[test]
    fn late_qa_attempt_is_still_recorded() {
        let definition = with_status(qa_input("lesson-1"), ApprovalStatus::Approved);
        let reported = ReportedAttempt {
            attempt_id: "attempt-late".into(),
            answers: (0..2)
                .map(|index| AnswerEntry { question_index: index, answer: Answer::FreeText("late".into()) })
                .collect(),
            time_taken_seconds: 25 * 60,
            integrity_event_count: 0,
        };
        let draft = replay_attempt(&definition, reported, T0).unwrap();
        assert_eq!(draft.time_taken_seconds, 25 * 60);
        assert_eq!(draft.answers.len(), 2);
    }
}
