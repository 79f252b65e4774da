//! Grader boundary
//!
//! The engine never scores free text itself. It hands a [`Rubric`] and the
//! learner's submission to a [`Grader`] and gets back a structured
//! [`Grade`]. Grading is slow and fallible; callers treat every error as
//! "try again".

pub mod llm;

pub use llm::LlmGrader;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;
use crate::types::{Section, Tier};

/// What the grader is asked to judge
#[derive(Debug, Clone, PartialEq)]
pub struct Rubric {
    pub section: Section,
    pub tier: Tier,
    /// Task given to the learner
    pub task: String,
    /// Weighted criteria, highest weight first
    pub criteria: Vec<(String, u8)>,
}

impl Rubric {
    /// Use a vocabulary word in an original sentence
    pub fn vocabulary(word: &str, definition: &str, tier: Tier) -> Self {
        Self {
            section: Section::Vocabulary,
            tier,
            task: format!(
                "Write an original English sentence using the word \"{}\" ({}).",
                word, definition
            ),
            criteria: vec![
                ("The word is used correctly".to_string(), 50),
                ("The sentence is grammatically correct".to_string(), 30),
                ("The sentence is original".to_string(), 20),
            ],
        }
    }

    /// Write a sentence applying a grammar rule
    pub fn grammar(title: &str, content: &str, tier: Tier) -> Self {
        Self {
            section: Section::Grammar,
            tier,
            task: format!(
                "Write a sentence that applies the grammar rule \"{}\":\n{}",
                title, content
            ),
            criteria: vec![
                ("The grammar rule is applied correctly".to_string(), 60),
                ("The sentence is grammatically accurate".to_string(), 30),
                ("The English sounds natural".to_string(), 10),
            ],
        }
    }

    /// Reply on a conversation topic
    pub fn conversation(title: &str, description: &str, tier: Tier) -> Self {
        Self {
            section: Section::Conversation,
            tier,
            task: format!("Reply in English on the topic \"{}\": {}", title, description),
            criteria: vec![
                ("Grammar".to_string(), 40),
                ("Fluency".to_string(), 30),
                ("Relevance to the topic".to_string(), 30),
            ],
        }
    }

    /// Plain-text description handed to the grader
    pub fn describe(&self) -> String {
        let mut text = format!(
            "Section: {}\nLearner level: {}\nTask: {}\nCriteria:\n",
            self.section, self.tier, self.task
        );
        for (criterion, weight) in &self.criteria {
            text.push_str(&format!("- {} ({} points)\n", criterion, weight));
        }
        text
    }
}

/// Structured grader verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    /// 0-100
    pub score: u8,
    pub feedback: String,
}

#[derive(Debug, Error)]
pub enum GraderError {
    #[error("grader timed out")]
    Timeout,

    #[error("grader request failed: {0}")]
    Transport(String),

    #[error("grader returned an unusable response: {0}")]
    Malformed(String),
}

impl From<GraderError> for EngineError {
    fn from(e: GraderError) -> Self {
        EngineError::GraderUnavailable(e.to_string())
    }
}

/// External scorer for free-text submissions
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Grader: Send + Sync {
    /// Score a submission against a rubric
    async fn grade(&self, rubric: &Rubric, submission: &str) -> Result<Grade, GraderError>;

    /// Short conversational reply to keep a dialogue going
    async fn converse(&self, topic: &str, learner_text: &str) -> Result<Option<String>, GraderError> {
        let _ = (topic, learner_text);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rubric_weights_sum_to_hundred() {
        for rubric in [
            Rubric::vocabulary("apple", "A fruit", Tier::Beginner),
            Rubric::grammar("Passive Voice", "be + past participle", Tier::Intermediate),
            Rubric::conversation("Hobbies", "What do you do for fun?", Tier::Amateur),
        ] {
            let total: u32 = rubric.criteria.iter().map(|(_, w)| *w as u32).sum();
            assert_eq!(total, 100, "{:?}", rubric.section);
        }
    }

    #[test]
    fn test_describe_mentions_task_and_level() {
        let text = Rubric::vocabulary("apple", "A fruit", Tier::Beginner).describe();
        assert!(text.contains("\"apple\""));
        assert!(text.contains("Beginner"));
        assert!(text.contains("(50 points)"));
    }

    #[test]
    fn test_grader_error_maps_to_unavailable() {
        let engine: EngineError = GraderError::Timeout.into();
        assert!(matches!(engine, EngineError::GraderUnavailable(_)));
        assert!(engine.is_recoverable());
    }
}
