//! Grader backed by an OpenAI-compatible chat completions API

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Grade, Grader, GraderError, Rubric};
use crate::config::GraderConfig;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Grade as the model is asked to return it
#[derive(Debug, Deserialize)]
struct RawGrade {
    score: i64,
    feedback: String,
}

/// Parse the model's JSON verdict; anything but `{score: 0..=100, feedback}` is malformed
pub fn parse_grade(content: &str) -> Result<Grade, GraderError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let raw: RawGrade = serde_json::from_str(body)
        .map_err(|e| GraderError::Malformed(format!("{} (body: {})", e, truncate(body, 200))))?;

    if !(0..=100).contains(&raw.score) {
        return Err(GraderError::Malformed(format!("score {} out of range", raw.score)));
    }

    Ok(Grade {
        score: raw.score as u8,
        feedback: raw.feedback.trim().to_string(),
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// LLM grader client
#[derive(Clone)]
pub struct LlmGrader {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    feedback_language: String,
}

impl LlmGrader {
    pub fn new(config: &GraderConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            feedback_language: config.feedback_language.clone(),
        })
    }

    /// Build from config with the API key from env, keyring or file
    pub fn from_config(config: &GraderConfig) -> Result<Self> {
        let api_key = crate::security::get_api_key()?;
        Self::new(config, api_key)
    }

    fn grading_instructions(&self) -> String {
        format!(
            "You are an encouraging English teacher grading a learner's answer. \
             Score it from 0 to 100 using the weighted criteria you are given. \
             Be generous when the learner made a good attempt. \
             Write short, constructive feedback in {}. \
             Respond with a JSON object only: {{\"score\": <integer 0-100>, \"feedback\": \"<text>\"}}",
            self.feedback_language
        )
    }

    async fn chat(&self, messages: Vec<ChatMessage>, json: bool) -> Result<String, GraderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(self.max_tokens),
            response_format: json.then(|| serde_json::json!({ "type": "json_object" })),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GraderError::Timeout
                } else {
                    GraderError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraderError::Transport(format!("API error ({}): {}", status, truncate(&body, 300))));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GraderError::Malformed(e.to_string()))?;

        raw.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|content| content.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| GraderError::Malformed("response has no message content".to_string()))
    }
}

#[async_trait::async_trait]
impl Grader for LlmGrader {
    async fn grade(&self, rubric: &Rubric, submission: &str) -> Result<Grade, GraderError> {
        let messages = vec![
            ChatMessage::system(self.grading_instructions()),
            ChatMessage::user(format!("{}\nLearner's answer:\n\"{}\"", rubric.describe(), submission)),
        ];

        let content = self.chat(messages, true).await?;
        match parse_grade(&content) {
            Ok(grade) => {
                debug!("Graded {} submission: {}", rubric.section, grade.score);
                Ok(grade)
            }
            Err(e) => {
                warn!("Discarding grader response: {}", e);
                Err(e)
            }
        }
    }

    async fn converse(&self, topic: &str, learner_text: &str) -> Result<Option<String>, GraderError> {
        let messages = vec![
            ChatMessage::system(
                "You are a friendly English conversation partner. \
                 Reply with one or two short, simple English sentences that continue the conversation.",
            ),
            ChatMessage::user(format!("Topic: {}\nLearner said: \"{}\"", topic, learner_text)),
        ];

        let reply = self.chat(messages, false).await?;
        let reply = reply.trim();
        Ok((!reply.is_empty()).then(|| reply.to_string()))
    }
}
