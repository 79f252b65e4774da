//! Persistence for learners, score samples and content ledgers
//!
//! All engine state that must outlive a process sits behind
//! [`LearningStore`]. Score samples are append-only; aggregates are always
//! derived from them, never written directly.

pub mod memory;
pub mod retry;
pub mod sqlite;

pub use memory::MemoryStore;
pub use retry::{with_retry, RetryPolicy};
pub use sqlite::SqliteStore;

use anyhow::Result;
use std::collections::HashSet;
use uuid::Uuid;

use crate::types::{Learner, LearnerId, ScoreSample, Section, Tier};

/// Storage backend for the progression engine
#[async_trait::async_trait]
pub trait LearningStore: Send + Sync {
    /// Register a learner or refresh their name and last-active time
    async fn upsert_learner(&self, id: LearnerId, display_name: &str) -> Result<Learner>;

    /// Fetch a learner
    async fn learner(&self, id: LearnerId) -> Result<Option<Learner>>;

    /// Set the learner's tier; writing the same tier twice is a no-op
    async fn upsert_tier(&self, id: LearnerId, tier: Tier) -> Result<()>;

    /// Flag the placement assessment as completed
    async fn set_assessment_done(&self, id: LearnerId, done: bool) -> Result<()>;

    /// Append a score sample; re-appending the same sample id is a no-op
    async fn append_score(&self, sample: &ScoreSample) -> Result<()>;

    /// Samples for one (learner, section, tier) in insertion order
    async fn samples(&self, id: LearnerId, section: Section, tier: Tier) -> Result<Vec<ScoreSample>>;

    /// Aggregate score for a section at a tier, in [0,100]
    async fn read_aggregate(&self, id: LearnerId, section: Section, tier: Tier) -> Result<f64> {
        let samples = self.samples(id, section, tier).await?;
        Ok(section.aggregation().fold(&samples))
    }

    /// Add keys to the seen ledger
    async fn mark_content_seen(&self, id: LearnerId, section: Section, tier: Tier, keys: &[String]) -> Result<()>;

    /// Keys seen in the current cycle
    async fn read_seen_content(&self, id: LearnerId, section: Section, tier: Tier) -> Result<HashSet<String>>;

    /// Start a new cycle for (learner, section, tier)
    async fn clear_seen(&self, id: LearnerId, section: Section, tier: Tier) -> Result<()>;

    /// Record one graded vocabulary word; repeats of a word count again,
    /// re-recording the same `study_id` is a no-op
    async fn record_word_studied(&self, id: LearnerId, study_id: Uuid, word_key: &str) -> Result<()>;

    /// Graded vocabulary words, repeats included
    async fn studied_word_count(&self, id: LearnerId) -> Result<usize>;

    /// Distinct studied words, most recently studied first
    async fn recent_studied_words(&self, id: LearnerId, limit: usize) -> Result<Vec<String>>;

    /// Number of vocabulary-quiz batches the learner has finished
    async fn quiz_checkpoint(&self, id: LearnerId) -> Result<usize>;

    /// Raise the finished quiz batch count; never lowers it
    async fn set_quiz_checkpoint(&self, id: LearnerId, batches: usize) -> Result<()>;
}
