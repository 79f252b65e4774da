//! In-process store, used by the console front-end and tests

use anyhow::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::LearningStore;
use crate::types::{Learner, LearnerId, ScoreSample, Section, Tier};

#[derive(Default)]
struct Inner {
    learners: HashMap<LearnerId, Learner>,
    samples: Vec<ScoreSample>,
    seen: HashMap<(LearnerId, Section, Tier), HashSet<String>>,
    studied: HashMap<LearnerId, Vec<(Uuid, String)>>,
    quizzes: HashMap<LearnerId, usize>,
}

/// Volatile store backed by hash maps
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LearningStore for MemoryStore {
    async fn upsert_learner(&self, id: LearnerId, display_name: &str) -> Result<Learner> {
        let mut inner = self.inner.write().await;
        let learner = inner
            .learners
            .entry(id)
            .or_insert_with(|| Learner::new(id, display_name));
        if !display_name.is_empty() {
            learner.display_name = display_name.to_string();
        }
        learner.last_active = Utc::now();
        Ok(learner.clone())
    }

    async fn learner(&self, id: LearnerId) -> Result<Option<Learner>> {
        Ok(self.inner.read().await.learners.get(&id).cloned())
    }

    async fn upsert_tier(&self, id: LearnerId, tier: Tier) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .learners
            .entry(id)
            .or_insert_with(|| Learner::new(id, ""))
            .tier = tier;
        Ok(())
    }

    async fn set_assessment_done(&self, id: LearnerId, done: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .learners
            .entry(id)
            .or_insert_with(|| Learner::new(id, ""))
            .assessment_done = done;
        Ok(())
    }

    async fn append_score(&self, sample: &ScoreSample) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.samples.iter().any(|s| s.id == sample.id) {
            inner.samples.push(sample.clone());
        }
        Ok(())
    }

    async fn samples(&self, id: LearnerId, section: Section, tier: Tier) -> Result<Vec<ScoreSample>> {
        Ok(self
            .inner
            .read()
            .await
            .samples
            .iter()
            .filter(|s| s.learner_id == id && s.section == section && s.tier == tier)
            .cloned()
            .collect())
    }

    async fn mark_content_seen(&self, id: LearnerId, section: Section, tier: Tier, keys: &[String]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .seen
            .entry((id, section, tier))
            .or_default()
            .extend(keys.iter().cloned());
        Ok(())
    }

    async fn read_seen_content(&self, id: LearnerId, section: Section, tier: Tier) -> Result<HashSet<String>> {
        Ok(self
            .inner
            .read()
            .await
            .seen
            .get(&(id, section, tier))
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_seen(&self, id: LearnerId, section: Section, tier: Tier) -> Result<()> {
        self.inner.write().await.seen.remove(&(id, section, tier));
        Ok(())
    }

    async fn record_word_studied(&self, id: LearnerId, study_id: Uuid, word_key: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let studies = inner.studied.entry(id).or_default();
        if !studies.iter().any(|(sid, _)| *sid == study_id) {
            studies.push((study_id, word_key.to_string()));
        }
        Ok(())
    }

    async fn studied_word_count(&self, id: LearnerId) -> Result<usize> {
        Ok(self.inner.read().await.studied.get(&id).map_or(0, |w| w.len()))
    }

    async fn recent_studied_words(&self, id: LearnerId, limit: usize) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut words: Vec<String> = Vec::new();
        for (_, word) in inner.studied.get(&id).into_iter().flatten().rev() {
            if words.len() == limit {
                break;
            }
            if !words.contains(word) {
                words.push(word.clone());
            }
        }
        Ok(words)
    }

    async fn quiz_checkpoint(&self, id: LearnerId) -> Result<usize> {
        Ok(self.inner.read().await.quizzes.get(&id).copied().unwrap_or(0))
    }

    async fn set_quiz_checkpoint(&self, id: LearnerId, batches: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        let taken = inner.quizzes.entry(id).or_default();
        *taken = (*taken).max(batches);
        Ok(())
    }
}
