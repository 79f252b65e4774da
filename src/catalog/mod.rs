//! Content catalog - practice material per tier plus anti-repetition selection
//!
//! The catalog owns the pool of vocabulary words, grammar lessons,
//! conversation topics and assessment questions. Which items a learner has
//! already been served lives in the seen ledger behind the store, keyed by
//! (learner, section, tier). Duplicates are removed once, at load time.

pub mod seed;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::store::LearningStore;
use crate::types::{LearnerId, Section, Tier};

/// Normalize a displayed term or title into a content key
pub fn content_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Presentable material of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Material {
    Word { definition: String, example: String },
    Lesson { content: String },
    Topic { description: String, starter: String },
    Question { options: Vec<String>, answer: usize },
}

impl Material {
    pub fn section(&self) -> Section {
        match self {
            Material::Word { .. } => Section::Vocabulary,
            Material::Lesson { .. } => Section::Grammar,
            Material::Topic { .. } => Section::Conversation,
            Material::Question { .. } => Section::Assessment,
        }
    }
}

/// A single practice or assessment item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Normalized identity used by the seen ledger
    pub key: String,
    pub tier: Tier,
    /// Displayed term, lesson title, topic title or question text
    pub title: String,
    pub material: Material,
}

impl ContentItem {
    pub fn new(tier: Tier, title: impl Into<String>, material: Material) -> Self {
        let title = title.into();
        Self {
            key: content_key(&title),
            tier,
            title,
            material,
        }
    }

    pub fn section(&self) -> Section {
        self.material.section()
    }

    /// Definition of a vocabulary word
    pub fn definition(&self) -> Option<&str> {
        match &self.material {
            Material::Word { definition, .. } => Some(definition),
            _ => None,
        }
    }
}

/// Whether an exhausted pool may silently start a new cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePolicy {
    /// Clear the ledger and start over
    AutoCycle,
    /// Report completion to the caller; lesson order matters
    Explicit,
}

impl CyclePolicy {
    pub fn for_section(section: Section) -> Self {
        match section {
            Section::Grammar => CyclePolicy::Explicit,
            _ => CyclePolicy::AutoCycle,
        }
    }
}

/// On-disk catalog format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub vocabulary: Vec<WordEntry>,
    #[serde(default)]
    pub grammar: Vec<LessonEntry>,
    #[serde(default)]
    pub conversation: Vec<TopicEntry>,
    #[serde(default)]
    pub assessment: Vec<QuestionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordEntry {
    pub tier: Tier,
    pub word: String,
    pub definition: String,
    #[serde(default)]
    pub example: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonEntry {
    pub tier: Tier,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEntry {
    pub tier: Tier,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub starter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub tier: Tier,
    pub question: String,
    pub options: Vec<String>,
    /// Text of the correct option
    pub answer: String,
}

impl CatalogFile {
    /// Parse a catalog from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse catalog JSON")
    }

    /// Read a catalog file
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Flatten into items, in file order; malformed questions are skipped
    pub fn into_items(self) -> Vec<ContentItem> {
        let mut items = Vec::new();

        for w in self.vocabulary {
            items.push(ContentItem::new(w.tier, w.word, Material::Word {
                definition: w.definition,
                example: w.example,
            }));
        }
        for l in self.grammar {
            items.push(ContentItem::new(l.tier, l.title, Material::Lesson { content: l.content }));
        }
        for t in self.conversation {
            items.push(ContentItem::new(t.tier, t.title, Material::Topic {
                description: t.description,
                starter: t.starter,
            }));
        }
        for q in self.assessment {
            match q.options.iter().position(|o| o.trim() == q.answer.trim()) {
                Some(answer) if q.options.len() >= 2 => {
                    items.push(ContentItem::new(q.tier, q.question, Material::Question {
                        options: q.options,
                        answer,
                    }));
                }
                _ => warn!("Skipping assessment question without a matching answer: {}", q.question),
            }
        }

        items
    }
}

/// A duplicate dropped at load
#[derive(Debug, Clone, PartialEq)]
pub struct Duplicate {
    pub section: Section,
    pub key: String,
    pub kept_tier: Tier,
    pub dropped_tier: Tier,
}

/// Outcome of the load-time deduplication pass
#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    pub kept: usize,
    pub removed: Vec<Duplicate>,
}

impl DedupReport {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty()
    }
}

impl std::fmt::Display for DedupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.removed.is_empty() {
            return write!(f, "{} items, no duplicates", self.kept);
        }
        writeln!(f, "{} items kept, {} duplicates removed:", self.kept, self.removed.len())?;
        for d in &self.removed {
            writeln!(
                f,
                "  [{}] '{}' kept at {}, dropped at {}",
                d.section, d.key, d.kept_tier, d.dropped_tier
            )?;
        }
        Ok(())
    }
}

/// Drop items whose (section, key) already exists, keeping the lowest tier.
/// Within a tier the first occurrence wins.
pub fn deduplicate(items: Vec<ContentItem>) -> (Vec<ContentItem>, DedupReport) {
    let mut ordered: Vec<(usize, ContentItem)> = items.into_iter().enumerate().collect();
    ordered.sort_by_key(|(idx, item)| (item.tier, *idx));

    let mut first_tier: HashMap<(Section, String), Tier> = HashMap::new();
    let mut kept = Vec::new();
    let mut report = DedupReport::default();

    for (idx, item) in ordered {
        let id = (item.section(), item.key.clone());
        match first_tier.get(&id) {
            Some(&kept_tier) => report.removed.push(Duplicate {
                section: item.section(),
                key: item.key,
                kept_tier,
                dropped_tier: item.tier,
            }),
            None => {
                first_tier.insert(id, item.tier);
                kept.push((idx, item));
            }
        }
    }

    // Restore file order so lesson sequences stay as authored
    kept.sort_by_key(|(idx, _)| *idx);
    report.kept = kept.len();
    (kept.into_iter().map(|(_, item)| item).collect(), report)
}

/// The content catalog
pub struct ContentCatalog {
    pools: HashMap<(Section, Tier), Vec<ContentItem>>,
    fallback_questions: Vec<ContentItem>,
    store: Arc<dyn LearningStore>,
}

impl ContentCatalog {
    /// Build from raw items; runs the deduplication pass once
    pub fn new(items: Vec<ContentItem>, store: Arc<dyn LearningStore>) -> (Self, DedupReport) {
        let (items, report) = deduplicate(items);
        if report.is_clean() {
            info!("Catalog loaded: {}", report);
        } else {
            warn!("Catalog loaded with duplicates removed: {}", report);
        }

        let mut pools: HashMap<(Section, Tier), Vec<ContentItem>> = HashMap::new();
        for item in items {
            pools.entry((item.section(), item.tier)).or_default().push(item);
        }

        let catalog = Self {
            pools,
            fallback_questions: Vec::new(),
            store,
        };
        (catalog, report)
    }

    /// Catalog from the built-in seed content with the static question pool as fallback
    pub fn builtin(store: Arc<dyn LearningStore>) -> Result<(Self, DedupReport)> {
        let (catalog, report) = Self::new(seed::seed_catalog()?.into_items(), store);
        Ok((catalog.with_fallback_questions(seed::fallback_questions()?), report))
    }

    /// Catalog from a JSON file (or the seed when no path is given)
    pub fn load(path: Option<&Path>, store: Arc<dyn LearningStore>) -> Result<(Self, DedupReport)> {
        match path {
            Some(path) => {
                let (catalog, report) = Self::new(CatalogFile::read(path)?.into_items(), store);
                Ok((catalog.with_fallback_questions(seed::fallback_questions()?), report))
            }
            None => Self::builtin(store),
        }
    }

    /// Static question pool used to backfill a placement test
    pub fn with_fallback_questions(mut self, questions: Vec<ContentItem>) -> Self {
        self.fallback_questions = questions
            .into_iter()
            .filter(|q| q.section() == Section::Assessment)
            .collect();
        self
    }

    pub fn items(&self, section: Section, tier: Tier) -> &[ContentItem] {
        self.pools
            .get(&(section, tier))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_items(&self, section: Section, tier: Tier) -> usize {
        self.items(section, tier).len()
    }

    pub fn fallback_questions(&self) -> &[ContentItem] {
        &self.fallback_questions
    }

    /// Look up an item by key in any tier of a section
    pub fn find(&self, section: Section, key: &str) -> Option<&ContentItem> {
        Tier::ALL
            .iter()
            .flat_map(|tier| self.items(section, *tier))
            .find(|item| item.key == key)
    }

    /// Up to `batch_size` items the learner has not seen in this cycle.
    ///
    /// Grammar keeps catalog order; other sections are shuffled. An empty
    /// result is valid: under `AutoCycle` the ledger is cleared so the next
    /// call starts a fresh cycle, under `Explicit` nothing changes.
    pub async fn next_items(
        &self,
        learner_id: LearnerId,
        section: Section,
        tier: Tier,
        batch_size: usize,
        policy: CyclePolicy,
    ) -> Result<Vec<ContentItem>> {
        let pool = self.items(section, tier);
        if pool.is_empty() {
            warn!("Catalog has no {} items at tier {}", section, tier);
            return Ok(Vec::new());
        }

        let seen = self.store.read_seen_content(learner_id, section, tier).await?;
        let mut unseen: Vec<ContentItem> = pool
            .iter()
            .filter(|item| !seen.contains(&item.key))
            .cloned()
            .collect();

        if unseen.is_empty() {
            if policy == CyclePolicy::AutoCycle {
                info!(
                    "Learner {} exhausted {} at {}; starting a new cycle",
                    learner_id, section, tier
                );
                self.reset_cycle(learner_id, section, tier).await?;
            }
            return Ok(Vec::new());
        }

        if section != Section::Grammar {
            unseen.shuffle(&mut rand::rng());
        }
        unseen.truncate(batch_size);

        debug!(
            "Serving {} {} item(s) at {} to learner {} ({} seen)",
            unseen.len(), section, tier, learner_id, seen.len()
        );
        Ok(unseen)
    }

    /// `next_items` with the section's default cycle policy applied.
    ///
    /// Auto-cycling sections retry once after the reset; an explicit section
    /// or an empty pool yields `ContentExhausted`.
    pub async fn draw(
        &self,
        learner_id: LearnerId,
        section: Section,
        tier: Tier,
        batch_size: usize,
    ) -> EngineResult<Vec<ContentItem>> {
        let policy = CyclePolicy::for_section(section);
        let mut items = self.next_items(learner_id, section, tier, batch_size, policy).await?;
        if items.is_empty() && policy == CyclePolicy::AutoCycle {
            items = self.next_items(learner_id, section, tier, batch_size, policy).await?;
        }
        if items.is_empty() {
            return Err(EngineError::ContentExhausted { section, tier });
        }
        Ok(items)
    }

    /// Record items as served; already-seen keys are a no-op
    pub async fn mark_seen(
        &self,
        learner_id: LearnerId,
        section: Section,
        tier: Tier,
        keys: &[String],
    ) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.store.mark_content_seen(learner_id, section, tier, keys).await
    }

    /// Clear the ledger for one (learner, section, tier)
    pub async fn reset_cycle(&self, learner_id: LearnerId, section: Section, tier: Tier) -> Result<()> {
        self.store.clear_seen(learner_id, section, tier).await
    }

    /// Definitions other than the given word's, same tier first, then any tier
    pub fn distractor_definitions(&self, word_key: &str, tier: Tier, count: usize) -> Vec<String> {
        let correct = self
            .find(Section::Vocabulary, word_key)
            .and_then(|item| item.definition())
            .map(content_key);

        let mut picked: HashSet<String> = HashSet::new();
        let mut result = Vec::new();
        let mut rng = rand::rng();

        let mut same_tier: Vec<&ContentItem> = self.items(Section::Vocabulary, tier).iter().collect();
        same_tier.shuffle(&mut rng);
        let mut other_tiers: Vec<&ContentItem> = Tier::ALL
            .iter()
            .filter(|t| **t != tier)
            .flat_map(|t| self.items(Section::Vocabulary, *t))
            .collect();
        other_tiers.shuffle(&mut rng);

        for item in same_tier.into_iter().chain(other_tiers) {
            if result.len() >= count {
                break;
            }
            let Some(definition) = item.definition() else { continue };
            let normalized = content_key(definition);
            if item.key == word_key || Some(&normalized) == correct.as_ref() {
                continue;
            }
            if picked.insert(normalized) {
                result.push(definition.to_string());
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn word(tier: Tier, term: &str) -> ContentItem {
        ContentItem::new(tier, term, Material::Word {
            definition: format!("meaning of {}", term),
            example: format!("I use {}.", term),
        })
    }

    fn lesson(tier: Tier, title: &str) -> ContentItem {
        ContentItem::new(tier, title, Material::Lesson { content: format!("{} rules", title) })
    }

    fn catalog(items: Vec<ContentItem>) -> ContentCatalog {
        ContentCatalog::new(items, Arc::new(MemoryStore::new())).0
    }

    #[test]
    fn test_content_key_normalization() {
        assert_eq!(content_key("  Simple   Present Tense "), "simple present tense");
        assert_eq!(content_key("Apple"), content_key("apple"));
    }

    #[test]
    fn test_dedup_keeps_lowest_tier() {
        let items = vec![
            word(Tier::Advanced, "Data"),
            word(Tier::Beginner, "data"),
            word(Tier::Beginner, "apple"),
            word(Tier::Beginner, "Apple"),
        ];
        let (kept, report) = deduplicate(items);
        assert_eq!(kept.len(), 2);
        assert_eq!(report.removed.len(), 2);
        assert!(kept.iter().all(|i| i.tier == Tier::Beginner));
        let data = report.removed.iter().find(|d| d.key == "data").unwrap();
        assert_eq!(data.kept_tier, Tier::Beginner);
        assert_eq!(data.dropped_tier, Tier::Advanced);
    }

    #[test]
    fn test_dedup_is_per_section() {
        let items = vec![
            word(Tier::Beginner, "present"),
            lesson(Tier::Beginner, "Present"),
        ];
        let (kept, report) = deduplicate(items);
        assert_eq!(kept.len(), 2);
        assert!(report.is_clean());
    }

    #[test]
    fn test_question_without_matching_answer_skipped() {
        let file = CatalogFile {
            assessment: vec![
                QuestionEntry {
                    tier: Tier::Beginner,
                    question: "Pick one".into(),
                    options: vec!["a".into(), "b".into()],
                    answer: "c".into(),
                },
                QuestionEntry {
                    tier: Tier::Beginner,
                    question: "Pick b".into(),
                    options: vec!["a".into(), "b".into()],
                    answer: "b".into(),
                },
            ],
            ..Default::default()
        };
        let items = file.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].material, Material::Question {
            options: vec!["a".into(), "b".into()],
            answer: 1,
        });
    }

    #[tokio::test]
    async fn test_next_items_never_repeats_within_cycle() {
        let items: Vec<ContentItem> = (0..7).map(|i| word(Tier::Beginner, &format!("w{}", i))).collect();
        let catalog = catalog(items);
        let mut served = HashSet::new();

        for _ in 0..3 {
            let batch = catalog
                .next_items(1, Section::Vocabulary, Tier::Beginner, 3, CyclePolicy::AutoCycle)
                .await
                .unwrap();
            let keys: Vec<String> = batch.iter().map(|i| i.key.clone()).collect();
            for key in &keys {
                assert!(served.insert(key.clone()), "served twice: {}", key);
            }
            catalog.mark_seen(1, Section::Vocabulary, Tier::Beginner, &keys).await.unwrap();
        }
        assert_eq!(served.len(), 7);
    }

    #[tokio::test]
    async fn test_exhausted_vocabulary_cycles() {
        let items: Vec<ContentItem> = (0..5).map(|i| word(Tier::Beginner, &format!("w{}", i))).collect();
        let catalog = catalog(items);

        let all = catalog
            .next_items(1, Section::Vocabulary, Tier::Beginner, 10, CyclePolicy::AutoCycle)
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
        let keys: Vec<String> = all.iter().map(|i| i.key.clone()).collect();
        catalog.mark_seen(1, Section::Vocabulary, Tier::Beginner, &keys).await.unwrap();

        let empty = catalog
            .next_items(1, Section::Vocabulary, Tier::Beginner, 10, CyclePolicy::AutoCycle)
            .await
            .unwrap();
        assert!(empty.is_empty());

        let again = catalog
            .next_items(1, Section::Vocabulary, Tier::Beginner, 10, CyclePolicy::AutoCycle)
            .await
            .unwrap();
        assert_eq!(again.len(), 5);
    }

    #[tokio::test]
    async fn test_grammar_reports_completion_instead_of_cycling() {
        let catalog = catalog(vec![lesson(Tier::Beginner, "One"), lesson(Tier::Beginner, "Two")]);

        let first = catalog.draw(1, Section::Grammar, Tier::Beginner, 1).await.unwrap();
        assert_eq!(first[0].title, "One");
        catalog.mark_seen(1, Section::Grammar, Tier::Beginner, &[first[0].key.clone()]).await.unwrap();

        let second = catalog.draw(1, Section::Grammar, Tier::Beginner, 1).await.unwrap();
        assert_eq!(second[0].title, "Two");
        catalog.mark_seen(1, Section::Grammar, Tier::Beginner, &[second[0].key.clone()]).await.unwrap();

        let done = catalog.draw(1, Section::Grammar, Tier::Beginner, 1).await;
        assert!(matches!(done, Err(EngineError::ContentExhausted { section: Section::Grammar, .. })));

        catalog.reset_cycle(1, Section::Grammar, Tier::Beginner).await.unwrap();
        let restarted = catalog.draw(1, Section::Grammar, Tier::Beginner, 1).await.unwrap();
        assert_eq!(restarted[0].title, "One");
    }

    #[tokio::test]
    async fn test_ledgers_are_per_learner_and_tier() {
        let catalog = catalog(vec![word(Tier::Beginner, "a"), word(Tier::Amateur, "b")]);
        catalog.mark_seen(1, Section::Vocabulary, Tier::Beginner, &["a".into()]).await.unwrap();

        let other_learner = catalog
            .next_items(2, Section::Vocabulary, Tier::Beginner, 5, CyclePolicy::AutoCycle)
            .await
            .unwrap();
        assert_eq!(other_learner.len(), 1);

        let other_tier = catalog
            .next_items(1, Section::Vocabulary, Tier::Amateur, 5, CyclePolicy::AutoCycle)
            .await
            .unwrap();
        assert_eq!(other_tier.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_pool_is_exhausted() {
        let catalog = catalog(vec![word(Tier::Beginner, "a")]);
        let result = catalog.draw(1, Section::Conversation, Tier::Beginner, 1).await;
        assert!(matches!(result, Err(EngineError::ContentExhausted { .. })));
    }

    #[test]
    fn test_distractors_exclude_correct_definition() {
        let catalog = catalog(vec![
            word(Tier::Beginner, "a"),
            word(Tier::Beginner, "b"),
            word(Tier::Amateur, "c"),
            word(Tier::Advanced, "d"),
        ]);
        let distractors = catalog.distractor_definitions("a", Tier::Beginner, 3);
        assert_eq!(distractors.len(), 3);
        assert!(!distractors.contains(&"meaning of a".to_string()));
        assert_eq!(distractors[0], "meaning of b");
    }
}
