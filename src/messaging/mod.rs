//! Front-end boundary
//!
//! Front-ends turn chat events into [`LearnerIntent`]s and render the
//! [`Presentation`]s the session machine answers with. Supported front-ends:
//! - Telegram: long-polling bot with inline keyboards
//! - Console: local practice in the terminal

pub mod console;
pub mod telegram;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::LearnerId;

/// What the learner did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    /// Typed text
    FreeText(String),
    /// Pressed a button carrying this key
    ButtonChoice(String),
    /// Asked to leave whatever they are doing
    ExitMenu,
}

/// One learner action as handed over by a front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerIntent {
    pub learner_id: LearnerId,
    /// Name shown in greetings and reports; empty when unknown
    pub display_name: String,
    pub kind: IntentKind,
}

impl LearnerIntent {
    pub fn text(learner_id: LearnerId, display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            learner_id,
            display_name: display_name.into(),
            kind: IntentKind::FreeText(text.into()),
        }
    }

    pub fn button(learner_id: LearnerId, display_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            learner_id,
            display_name: display_name.into(),
            kind: IntentKind::ButtonChoice(key.into()),
        }
    }

    pub fn exit(learner_id: LearnerId, display_name: impl Into<String>) -> Self {
        Self {
            learner_id,
            display_name: display_name.into(),
            kind: IntentKind::ExitMenu,
        }
    }
}

/// Rendering hint for a presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationKind {
    Prompt,
    Question,
    Feedback,
    Summary,
}

/// A selectable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonOption {
    /// Sent back verbatim as `IntentKind::ButtonChoice`
    pub key: String,
    pub label: String,
}

impl ButtonOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Content for the front-end to display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub kind: PresentationKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ButtonOption>>,
}

impl Presentation {
    pub fn new(kind: PresentationKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            options: None,
        }
    }

    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(PresentationKind::Prompt, text)
    }

    pub fn question(text: impl Into<String>) -> Self {
        Self::new(PresentationKind::Question, text)
    }

    pub fn feedback(text: impl Into<String>) -> Self {
        Self::new(PresentationKind::Feedback, text)
    }

    pub fn summary(text: impl Into<String>) -> Self {
        Self::new(PresentationKind::Summary, text)
    }

    pub fn with_options(mut self, options: Vec<ButtonOption>) -> Self {
        self.options = if options.is_empty() { None } else { Some(options) };
        self
    }

    /// Keys of all options, in display order
    pub fn option_keys(&self) -> Vec<&str> {
        self.options
            .iter()
            .flatten()
            .map(|o| o.key.as_str())
            .collect()
    }
}

/// A chat transport that can show presentations to a learner
#[async_trait::async_trait]
pub trait FrontEnd: Send + Sync {
    /// Deliver presentations in order
    async fn deliver(&self, learner_id: LearnerId, presentations: &[Presentation]) -> Result<()>;

    /// Front-end name for logs
    fn name(&self) -> &'static str;
}
