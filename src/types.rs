//! Shared types used across modules
//!
//! Tiers, sections, learners and score samples are used by the catalog,
//! the store, the progress tracker and the session machine alike, so they
//! live here to avoid circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Learner identity as handed over by the front-end (a chat id)
pub type LearnerId = i64;

/// Ordered proficiency tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Beginner,
    Amateur,
    Intermediate,
    Advanced,
}

impl Tier {
    /// All tiers, lowest first
    pub const ALL: [Tier; 4] = [Tier::Beginner, Tier::Amateur, Tier::Intermediate, Tier::Advanced];

    /// The tier one step above, if any
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Beginner => Some(Tier::Amateur),
            Tier::Amateur => Some(Tier::Intermediate),
            Tier::Intermediate => Some(Tier::Advanced),
            Tier::Advanced => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Beginner => "beginner",
            Tier::Amateur => "amateur",
            Tier::Intermediate => "intermediate",
            Tier::Advanced => "advanced",
        }
    }

    /// Parse from the stored lowercase name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(Tier::Beginner),
            "amateur" => Some(Tier::Amateur),
            "intermediate" => Some(Tier::Intermediate),
            "advanced" => Some(Tier::Advanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Beginner => write!(f, "Beginner"),
            Tier::Amateur => write!(f, "Amateur"),
            Tier::Intermediate => write!(f, "Intermediate"),
            Tier::Advanced => write!(f, "Advanced"),
        }
    }
}

/// How the samples of a section fold into its aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Sum of bounded increments, clamped to 100
    Accumulate,
    /// Best raw score seen so far
    Best,
}

impl Aggregation {
    /// Fold samples into an aggregate in [0,100]
    pub fn fold<'a>(self, samples: impl IntoIterator<Item = &'a ScoreSample>) -> f64 {
        let value = match self {
            Aggregation::Accumulate => samples.into_iter().map(|s| s.increment.max(0.0)).sum(),
            Aggregation::Best => samples
                .into_iter()
                .map(|s| s.raw_score as f64)
                .fold(0.0, f64::max),
        };
        value.clamp(0.0, 100.0)
    }
}

/// Skill category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Vocabulary,
    Grammar,
    Conversation,
    Assessment,
}

impl Section {
    /// Sections whose aggregates gate a tier upgrade
    pub const TRACKED: [Section; 3] = [Section::Vocabulary, Section::Grammar, Section::Conversation];

    pub const ALL: [Section; 4] = [
        Section::Vocabulary,
        Section::Grammar,
        Section::Conversation,
        Section::Assessment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Vocabulary => "vocabulary",
            Section::Grammar => "grammar",
            Section::Conversation => "conversation",
            Section::Assessment => "assessment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "vocabulary" | "vocab" => Some(Section::Vocabulary),
            "grammar" => Some(Section::Grammar),
            "conversation" => Some(Section::Conversation),
            "assessment" => Some(Section::Assessment),
            _ => None,
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        match self {
            Section::Assessment => Aggregation::Best,
            _ => Aggregation::Accumulate,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A learner known to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learner {
    pub id: LearnerId,
    pub display_name: String,
    pub tier: Tier,
    pub assessment_done: bool,
    pub last_active: DateTime<Utc>,
}

impl Learner {
    pub fn new(id: LearnerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            tier: Tier::Beginner,
            assessment_done: false,
            last_active: Utc::now(),
        }
    }
}

/// Immutable score record; the source of truth for progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
    /// Unique per sample so a retried append is not counted twice
    pub id: Uuid,
    pub learner_id: LearnerId,
    pub section: Section,
    pub tier: Tier,
    /// Score as returned by the grader or computed by a quiz, 0-100
    pub raw_score: u8,
    /// Bounded progress contribution derived from the raw score
    pub increment: f64,
    pub recorded_at: DateTime<Utc>,
}

impl ScoreSample {
    pub fn new(learner_id: LearnerId, section: Section, tier: Tier, raw_score: u8, increment: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id,
            section,
            tier,
            raw_score: raw_score.min(100),
            increment,
            recorded_at: Utc::now(),
        }
    }
}
