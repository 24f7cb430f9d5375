use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::core::metrics::AI_GRADING_DURATION;
use crate::services::scoring::{AiFeedback, AiGradingResult, QaGradingItem, QuestionFeedback};

const FEEDBACK_SYSTEM_PROMPT: &str = r#"You are an experienced K-12 teacher giving formative feedback on free-response answers.

For every item you receive the question, the expected points a complete answer covers, and the student's answer.
Score each answer from 0 to 10 against the expected points only. Be encouraging and concrete; address the student directly.
Do not invent expected points that are not listed.

Reply with strict JSON, one per_question entry per item, in the same order:
{
  "per_question": [
    {
      "score": <number 0-10>,
      "feedback": "two or three sentences",
      "strengths": ["what the answer does well"],
      "improvements": ["what is missing or incorrect"]
    }
  ],
  "overall_score": <number 0-100>,
  "analysis_report": "a short paragraph for the teacher on overall understanding and misconceptions"
}
"#;

/// Source of AI feedback for free-response submissions.
#[async_trait]
pub(crate) trait QaFeedbackProvider: Send + Sync {
    async fn grade(&self, submission_id: &str, items: &[QaGradingItem]) -> Result<AiGradingResult>;
}

#[derive(Debug, Clone)]
pub(crate) struct AiFeedbackService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionPayload {
    per_question: Vec<QuestionFeedback>,
    overall_score: f64,
    #[serde(default)]
    analysis_report: String,
}

impl AiFeedbackService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let ai = settings.ai();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(ai.ai_request_timeout))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: ai.openai_api_key.clone(),
            base_url: ai.openai_base_url.trim_end_matches('/').to_string(),
            model: ai.ai_model.clone(),
            max_tokens: ai.ai_max_tokens,
            temperature: ai.ai_temperature,
            max_retries: ai.ai_max_retries,
        })
    }

    fn payload(&self, items: &[QaGradingItem]) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": FEEDBACK_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(items)}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        })
    }

    async fn post_with_retries(&self, payload: &Value) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = anyhow::anyhow!("AI request was not attempted");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt - 1))).await;
            }

            let response =
                match self.client.post(&url).bearer_auth(&self.api_key).json(payload).send().await {
                    Ok(response) => response,
                    Err(err) => {
                        last_error = anyhow::Error::new(err).context("Failed to call AI endpoint");
                        continue;
                    }
                };

            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            if status.is_success() {
                return Ok(body);
            }

            last_error = anyhow::anyhow!("AI endpoint returned {status}: {body}");
            if !is_retryable(status) {
                break;
            }
            tracing::warn!(attempt, status = %status, "AI request failed, retrying");
        }

        Err(last_error)
    }
}

#[async_trait]
impl QaFeedbackProvider for AiFeedbackService {
    async fn grade(&self, submission_id: &str, items: &[QaGradingItem]) -> Result<AiGradingResult> {
        if self.api_key.is_empty() || self.base_url.is_empty() {
            anyhow::bail!("AI feedback is not configured");
        }

        let timer = Instant::now();
        tracing::info!(submission_id, items = items.len(), model = %self.model, "Sending AI feedback request");

        let body = self.post_with_retries(&self.payload(items)).await?;
        let result = parse_completion(&body, items.len())?;

        let elapsed = timer.elapsed().as_secs_f64();
        let tokens_used = body.pointer("/usage/total_tokens").and_then(serde_json::Value::as_u64);
        metrics::histogram!(AI_GRADING_DURATION).record(elapsed);
        tracing::info!(
            submission_id,
            duration_seconds = elapsed,
            tokens_used,
            overall_score = result.feedback.overall_score,
            "AI feedback received"
        );

        Ok(result)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn user_prompt(items: &[QaGradingItem]) -> String {
    let mut prompt = String::new();
    for (position, item) in items.iter().enumerate() {
        prompt.push_str(&format!(
            "Item {}\nQuestion:\n{}\n\nExpected points:\n{}\n\nStudent answer:\n{}\n\n",
            position + 1,
            item.question,
            item.expected_points,
            item.student_answer
        ));
    }
    prompt.push_str("Return the JSON object described in the system prompt.");
    prompt
}

/// Extracts and validates the model's JSON from a chat-completions body.
pub(crate) fn parse_completion(body: &Value, question_count: usize) -> Result<AiGradingResult> {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .context("Missing AI response content")?;

    let payload: CompletionPayload =
        serde_json::from_str(content).context("Failed to parse AI JSON")?;
    let feedback =
        AiFeedback { per_question: payload.per_question, overall_score: payload.overall_score };
    feedback.validate(question_count).context("AI feedback failed validation")?;

    Ok(AiGradingResult { feedback, analysis_report: payload.analysis_report })
}
