use serde::{Deserialize, Serialize};

use crate::db::types::Modality;
use crate::services::workflow_error::WorkflowError;

pub(crate) const MIN_MCQ_OPTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Question {
    Mcq(McqQuestion),
    Qa(QaQuestion),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct McqQuestion {
    pub(crate) prompt: String,
    pub(crate) options: Vec<String>,
    pub(crate) correct_option_index: usize,
    #[serde(default)]
    pub(crate) explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QaQuestion {
    pub(crate) prompt: String,
    /// Rubric text the AI grader and the reviewer score against.
    pub(crate) expected_points: String,
}

/// A captured answer. The wire form is one of `selected_option_index` or
/// `answer_text`, flattened next to `question_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Answer {
    #[serde(rename = "selected_option_index")]
    SelectedOption(usize),
    #[serde(rename = "answer_text")]
    FreeText(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AnswerEntry {
    pub(crate) question_index: usize,
    #[serde(flatten)]
    pub(crate) answer: Answer,
}

impl Question {
    pub(crate) fn modality(&self) -> Modality {
        match self {
            Self::Mcq(_) => Modality::Mcq,
            Self::Qa(_) => Modality::Qa,
        }
    }

    pub(crate) fn prompt(&self) -> &str {
        match self {
            Self::Mcq(question) => &question.prompt,
            Self::Qa(question) => &question.prompt,
        }
    }

    /// Checks that `answer` has the shape this question accepts.
    pub(crate) fn check_answer(&self, index: usize, answer: &Answer) -> Result<(), WorkflowError> {
        let reason = match (self, answer) {
            (Self::Mcq(question), Answer::SelectedOption(selected)) => {
                if *selected < question.options.len() {
                    return Ok(());
                }
                format!(
                    "option {selected} does not exist; the question has {} options",
                    question.options.len()
                )
            }
            (Self::Qa(_), Answer::FreeText(text)) => {
                if !text.trim().is_empty() {
                    return Ok(());
                }
                "answer text must not be blank".to_string()
            }
            (Self::Mcq(_), Answer::FreeText(_)) => {
                "multiple-choice questions need a selected option".to_string()
            }
            (Self::Qa(_), Answer::SelectedOption(_)) => {
                "free-response questions need answer text".to_string()
            }
        };

        Err(WorkflowError::InvalidAnswer { index, reason })
    }
}

impl Answer {
    pub(crate) fn selected_option(&self) -> Option<usize> {
        match self {
            Self::SelectedOption(index) => Some(*index),
            Self::FreeText(_) => None,
        }
    }

    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            Self::FreeText(text) => Some(text),
            Self::SelectedOption(_) => None,
        }
    }
}

/// Boundary validation of an authored question set.
pub(crate) fn validate_question_set(
    modality: Modality,
    questions: &[Question],
    time_limit_minutes: Option<i32>,
) -> Result<(), WorkflowError> {
    if questions.is_empty() {
        return Err(WorkflowError::invalid_definition("at least one question is required"));
    }

    for (index, question) in questions.iter().enumerate() {
        let number = index + 1;
        if question.modality() != modality {
            return Err(WorkflowError::invalid_definition(format!(
                "question {number} is {} but the assessment is {modality}",
                question.modality()
            )));
        }
        if question.prompt().trim().is_empty() {
            return Err(WorkflowError::invalid_definition(format!(
                "question {number} has an empty prompt"
            )));
        }

        match question {
            Question::Mcq(mcq) => {
                if mcq.options.len() < MIN_MCQ_OPTIONS {
                    return Err(WorkflowError::invalid_definition(format!(
                        "question {number} needs at least {MIN_MCQ_OPTIONS} options"
                    )));
                }
                if mcq.options.iter().any(|option| option.trim().is_empty()) {
                    return Err(WorkflowError::invalid_definition(format!(
                        "question {number} has an empty option"
                    )));
                }
                if mcq.correct_option_index >= mcq.options.len() {
                    return Err(WorkflowError::invalid_definition(format!(
                        "question {number} marks option {} as correct but has only {} options",
                        mcq.correct_option_index,
                        mcq.options.len()
                    )));
                }
            }
            Question::Qa(qa) => {
                if qa.expected_points.trim().is_empty() {
                    return Err(WorkflowError::invalid_definition(format!(
                        "question {number} needs expected points"
                    )));
                }
            }
        }
    }

    match (modality, time_limit_minutes) {
        (_, None) => Ok(()),
        (Modality::Mcq, Some(_)) => Err(WorkflowError::invalid_definition(
            "time limits apply to free-response assessments only",
        )),
        (Modality::Qa, Some(minutes)) if minutes <= 0 => {
            Err(WorkflowError::invalid_definition("time limit must be positive"))
        }
        (Modality::Qa, Some(_)) => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn mcq(correct: usize) -> Question {
        Question::Mcq(McqQuestion {
            prompt: format!("Pick option {correct}"),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_option_index: correct,
            explanation: String::new(),
        })
    }

    pub(crate) fn qa(prompt: &str) -> Question {
        Question::Qa(QaQuestion {
            prompt: prompt.to_string(),
            expected_points: "Mentions the water cycle".to_string(),
        })
    }
}
