//! Progress accumulation and tier upgrades
//!
//! Every scored submission becomes a [`ScoreSample`] carrying a bounded
//! increment. Aggregates are folded from the samples on read, so they can
//! only grow and never leave [0,100].

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::ContentCatalog;
use crate::config::PolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::{with_retry, LearningStore, RetryPolicy};
use crate::types::{LearnerId, ScoreSample, Section, Tier};

/// Progress contribution of one raw score.
///
/// `(100 / total_items) * max(floor, raw / 100)`. Returns `None` when the
/// section has no items at the tier.
pub fn bounded_increment(total_items: usize, raw_score: u8, floor_multiplier: f64) -> Option<f64> {
    if total_items == 0 {
        return None;
    }
    let quality = (raw_score.min(100) as f64 / 100.0).max(floor_multiplier);
    Some(100.0 / total_items as f64 * quality)
}

/// Tracks section progress and decides tier upgrades
pub struct ProgressTracker {
    store: Arc<dyn LearningStore>,
    catalog: Arc<ContentCatalog>,
    policy: PolicyConfig,
    retry: RetryPolicy,
}

impl ProgressTracker {
    pub fn new(
        store: Arc<dyn LearningStore>,
        catalog: Arc<ContentCatalog>,
        policy: PolicyConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            policy,
            retry,
        }
    }

    fn increment_for(&self, section: Section, tier: Tier, raw_score: u8) -> f64 {
        if section == Section::Assessment {
            // Assessment aggregates keep the best raw score
            return 0.0;
        }
        let total = self.catalog.total_items(section, tier);
        match bounded_increment(total, raw_score, self.policy.floor_multiplier) {
            Some(increment) => increment,
            None => {
                let degenerate = EngineError::ConfigurationDegenerate(format!(
                    "no {} items at tier {}, using minimum bump {}",
                    section, tier, self.policy.min_progress_bump
                ));
                warn!("{}", degenerate);
                self.policy.min_progress_bump
            }
        }
    }

    /// Append a sample for a raw score and return the new aggregate.
    ///
    /// `sample_id` names the unit of work being scored. Recording it again
    /// after a partial failure leaves the aggregate unchanged.
    pub async fn record_score(
        &self,
        learner_id: LearnerId,
        section: Section,
        tier: Tier,
        raw_score: u8,
        sample_id: Uuid,
    ) -> EngineResult<f64> {
        let increment = self.increment_for(section, tier, raw_score);
        let mut sample = ScoreSample::new(learner_id, section, tier, raw_score, increment);
        sample.id = sample_id;

        with_retry(self.retry, "score sample", || self.store.append_score(&sample)).await?;

        let aggregate = self.current_progress(learner_id, section, tier).await?;
        debug!(
            "Learner {} scored {} in {} at {} (+{:.1}, now {:.1})",
            learner_id, raw_score, section, tier, increment, aggregate
        );
        Ok(aggregate)
    }

    /// Derived aggregate for (section, tier); 0 without samples
    pub async fn current_progress(&self, learner_id: LearnerId, section: Section, tier: Tier) -> Result<f64> {
        self.store.read_aggregate(learner_id, section, tier).await
    }

    /// Move the learner up exactly one tier when every tracked section has
    /// reached the upgrade threshold at the current tier.
    pub async fn try_upgrade_tier(&self, learner_id: LearnerId) -> EngineResult<bool> {
        let Some(learner) = self.store.learner(learner_id).await? else {
            return Ok(false);
        };
        let Some(next) = learner.tier.next() else {
            return Ok(false);
        };

        for section in Section::TRACKED {
            let aggregate = self.current_progress(learner_id, section, learner.tier).await?;
            if aggregate < self.policy.upgrade_threshold {
                return Ok(false);
            }
        }

        with_retry(self.retry, "tier", || self.store.upsert_tier(learner_id, next)).await?;
        info!("Learner {} upgraded from {} to {}", learner_id, learner.tier, next);
        Ok(true)
    }

    /// Snapshot of the learner's progress at their current tier
    pub async fn report(&self, learner_id: LearnerId) -> Result<ProgressReport> {
        let learner = self
            .store
            .learner(learner_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Unknown learner {}", learner_id))?;

        let mut sections = Vec::new();
        for section in Section::TRACKED {
            let value = self.current_progress(learner_id, section, learner.tier).await?;
            sections.push((section, value));
        }

        let mut best_assessment = 0.0_f64;
        for tier in Tier::ALL {
            let value = self.current_progress(learner_id, Section::Assessment, tier).await?;
            best_assessment = best_assessment.max(value);
        }

        Ok(ProgressReport {
            display_name: learner.display_name,
            tier: learner.tier,
            assessment_done: learner.assessment_done,
            sections,
            best_assessment,
            studied_words: self.store.studied_word_count(learner_id).await?,
            upgrade_threshold: self.policy.upgrade_threshold,
        })
    }
}

/// Per-section progress at the learner's current tier
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub display_name: String,
    pub tier: Tier,
    pub assessment_done: bool,
    pub sections: Vec<(Section, f64)>,
    pub best_assessment: f64,
    pub studied_words: usize,
    pub upgrade_threshold: f64,
}

fn bar(value: f64) -> String {
    let filled = (value.clamp(0.0, 100.0) / 10.0).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

impl std::fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Progress for {}", self.display_name)?;
        writeln!(f, "Level: {}", self.tier)?;
        if !self.assessment_done {
            writeln!(f, "Placement test: not taken yet")?;
        }
        writeln!(f)?;
        for (section, value) in &self.sections {
            writeln!(f, "{:<13} {} {:>5.1}%", section.as_str(), bar(*value), value)?;
        }
        writeln!(f)?;
        writeln!(f, "Words studied: {}", self.studied_words)?;
        writeln!(f, "Best test score: {:.0}%", self.best_assessment)?;
        match self.tier.next() {
            Some(next) => write!(
                f,
                "Reach {:.0}% in every section to move up to {}.",
                self.upgrade_threshold, next
            ),
            None => write!(f, "You are at the highest level."),
        }
    }
}
