use serde::{Deserialize, Serialize};

use crate::services::questions::{AnswerEntry, McqQuestion, Question};
use crate::services::workflow_error::WorkflowError;

pub(crate) const QUESTION_SCORE_MAX: f64 = 10.0;
pub(crate) const OVERALL_SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct McqScore {
    pub(crate) per_question: Vec<bool>,
    pub(crate) correct_count: usize,
    pub(crate) question_count: usize,
    pub(crate) percentage: i32,
}

/// Scores selected options index-wise against the answer key.
///
/// `selected[i]` answers `questions[i]`; a missing selection counts as wrong.
pub(crate) fn score_mcq(questions: &[&McqQuestion], selected: &[Option<usize>]) -> McqScore {
    let per_question: Vec<bool> = questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            selected.get(index).copied().flatten() == Some(question.correct_option_index)
        })
        .collect();
    let correct_count = per_question.iter().filter(|correct| **correct).count();
    let question_count = questions.len();

    McqScore {
        per_question,
        correct_count,
        question_count,
        percentage: round_percentage(correct_count, question_count),
    }
}

/// `round(100 * correct / total)` with halves rounded up, in integer arithmetic.
pub(crate) fn round_percentage(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let scaled = (200 * correct as u64 + total as u64) / (2 * total as u64);
    scaled as i32
}

/// One free-response item sent to the AI grader, in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct QaGradingItem {
    pub(crate) question_index: usize,
    pub(crate) question: String,
    pub(crate) expected_points: String,
    pub(crate) student_answer: String,
}

pub(crate) fn build_qa_items(questions: &[Question], answers: &[AnswerEntry]) -> Vec<QaGradingItem> {
    questions
        .iter()
        .enumerate()
        .filter_map(|(index, question)| {
            let Question::Qa(qa) = question else {
                return None;
            };
            let student_answer = answers
                .iter()
                .find(|entry| entry.question_index == index)
                .and_then(|entry| entry.answer.text())
                .unwrap_or_default()
                .to_string();
            Some(QaGradingItem {
                question_index: index,
                question: qa.prompt.clone(),
                expected_points: qa.expected_points.clone(),
                student_answer,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionFeedback {
    pub(crate) score: f64,
    pub(crate) feedback: String,
    #[serde(default)]
    pub(crate) strengths: Vec<String>,
    #[serde(default)]
    pub(crate) improvements: Vec<String>,
}

/// Advisory AI feedback; `overall_score` only pre-populates the final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AiFeedback {
    pub(crate) per_question: Vec<QuestionFeedback>,
    pub(crate) overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AiGradingResult {
    pub(crate) feedback: AiFeedback,
    pub(crate) analysis_report: String,
}

impl AiFeedback {
    pub(crate) fn validate(&self, question_count: usize) -> Result<(), WorkflowError> {
        if self.per_question.len() != question_count {
            return Err(WorkflowError::InvalidFeedback {
                reason: format!(
                    "expected feedback for {question_count} questions, got {}",
                    self.per_question.len()
                ),
            });
        }

        for (index, item) in self.per_question.iter().enumerate() {
            if !in_range(item.score, QUESTION_SCORE_MAX) {
                return Err(WorkflowError::InvalidFeedback {
                    reason: format!("question {} score {} is outside 0-10", index + 1, item.score),
                });
            }
        }

        if !in_range(self.overall_score, OVERALL_SCORE_MAX) {
            return Err(WorkflowError::InvalidFeedback {
                reason: format!("overall score {} is outside 0-100", self.overall_score),
            });
        }

        Ok(())
    }
}

pub(crate) fn in_range(value: f64, max: f64) -> bool {
    value.is_finite() && (0.0..=max).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::questions::fixtures::{mcq, qa};
    use crate::services::questions::Answer;

    fn keys(questions: &[Question]) -> Vec<&McqQuestion> {
        questions
            .iter()
            .filter_map(|question| match question {
                Question::Mcq(mcq) => Some(mcq),
                Question::Qa(_) => None,
            })
            .collect()
    }

    #[test]
    fn three_of_four_correct_scores_75() {
        let questions = vec![mcq(0), mcq(1), mcq(2), mcq(3)];
        let score = score_mcq(&keys(&questions), &[Some(0), Some(1), Some(0), Some(3)]);
        assert_eq!(score.per_question, vec![true, true, false, true]);
        assert_eq!(score.correct_count, 3);
        assert_eq!(score.percentage, 75);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(round_percentage(1, 8), 13);
        assert_eq!(round_percentage(2, 3), 67);
        assert_eq!(round_percentage(1, 3), 33);
        assert_eq!(round_percentage(0, 5), 0);
        assert_eq!(round_percentage(5, 5), 100);
        assert_eq!(round_percentage(0, 0), 0);
    }

    #[test]
    fn percentage_matches_float_formula() {
        for total in 1..=40usize {
            for correct in 0..=total {
                let expected = (100.0 * correct as f64 / total as f64 + 0.5).floor() as i32;
                assert_eq!(round_percentage(correct, total), expected, "{correct}/{total}");
            }
        }
    }

    #[test]
    fn qa_items_follow_question_order() {
        let questions = vec![qa("First"), qa("Second")];
        let answers = vec![
            AnswerEntry { question_index: 1, answer: Answer::FreeText("two".into()) },
            AnswerEntry { question_index: 0, answer: Answer::FreeText("one".into()) },
        ];
        let items = build_qa_items(&questions, &answers);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].question, "First");
        assert_eq!(items[0].student_answer, "one");
        assert_eq!(items[1].student_answer, "two");
    }

    #[test]
    fn feedback_validation_checks_counts_and_ranges() {
        let item = |score| QuestionFeedback {
            score,
            feedback: "ok".into(),
            strengths: vec![],
            improvements: vec![],
        };
        let feedback = AiFeedback { per_question: vec![item(7.0), item(10.0)], overall_score: 68.0 };
        assert!(feedback.validate(2).is_ok());
        assert!(feedback.validate(3).is_err());

        let bad_item = AiFeedback { per_question: vec![item(11.0)], overall_score: 50.0 };
        assert!(bad_item.validate(1).is_err());

        let bad_overall = AiFeedback { per_question: vec![item(1.0)], overall_score: f64::NAN };
        assert!(bad_overall.validate(1).is_err());
    }
}
