//! End-to-end progression through the session coordinator

use anyhow::{anyhow, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use lingua_tutor::catalog::{ContentCatalog, ContentItem, Material};
use lingua_tutor::config::PolicyConfig;
use lingua_tutor::grader::{Grade, Grader, GraderError, Rubric};
use lingua_tutor::messaging::{IntentKind, LearnerIntent, Presentation};
use lingua_tutor::store::{LearningStore, MemoryStore, RetryPolicy};
use lingua_tutor::{ActivityKind, Learner, LearnerId, ScoreSample, Section, SessionCoordinator, Tier};

const LEARNER: LearnerId = 1;

/// Grader that replays a script, then returns a fixed score
struct ScriptedGrader {
    script: Mutex<VecDeque<Result<u8, GraderError>>>,
    fallback: u8,
    calls: AtomicUsize,
}

impl ScriptedGrader {
    fn new(fallback: u8) -> Self {
        Self::scripted(Vec::new(), fallback)
    }

    fn scripted(script: Vec<Result<u8, GraderError>>, fallback: u8) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Grader for ScriptedGrader {
    async fn grade(&self, _rubric: &Rubric, _submission: &str) -> Result<Grade, GraderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let score = next.unwrap_or(Ok(self.fallback))?;
        Ok(Grade {
            score,
            feedback: "Good effort.".to_string(),
        })
    }

    async fn converse(&self, _topic: &str, _learner_text: &str) -> Result<Option<String>, GraderError> {
        Ok(Some("That sounds interesting! Tell me more.".to_string()))
    }
}

/// Memory store whose armed writes fail a set number of times
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    assessment_failures: AtomicU32,
    tier_failures: AtomicU32,
    seen_failures: AtomicU32,
    checkpoint_failures: AtomicU32,
}

fn trip(failures: &AtomicU32) -> Result<()> {
    let left = failures.load(Ordering::SeqCst);
    if left > 0 {
        failures.store(left - 1, Ordering::SeqCst);
        return Err(anyhow!("database is locked"));
    }
    Ok(())
}

#[async_trait::async_trait]
impl LearningStore for FlakyStore {
    async fn upsert_learner(&self, id: LearnerId, display_name: &str) -> Result<Learner> {
        self.inner.upsert_learner(id, display_name).await
    }

    async fn learner(&self, id: LearnerId) -> Result<Option<Learner>> {
        self.inner.learner(id).await
    }

    async fn upsert_tier(&self, id: LearnerId, tier: Tier) -> Result<()> {
        trip(&self.tier_failures)?;
        self.inner.upsert_tier(id, tier).await
    }

    async fn set_assessment_done(&self, id: LearnerId, done: bool) -> Result<()> {
        trip(&self.assessment_failures)?;
        self.inner.set_assessment_done(id, done).await
    }

    async fn append_score(&self, sample: &ScoreSample) -> Result<()> {
        self.inner.append_score(sample).await
    }

    async fn samples(&self, id: LearnerId, section: Section, tier: Tier) -> Result<Vec<ScoreSample>> {
        self.inner.samples(id, section, tier).await
    }

    async fn mark_content_seen(&self, id: LearnerId, section: Section, tier: Tier, keys: &[String]) -> Result<()> {
        trip(&self.seen_failures)?;
        self.inner.mark_content_seen(id, section, tier, keys).await
    }

    async fn read_seen_content(&self, id: LearnerId, section: Section, tier: Tier) -> Result<HashSet<String>> {
        self.inner.read_seen_content(id, section, tier).await
    }

    async fn clear_seen(&self, id: LearnerId, section: Section, tier: Tier) -> Result<()> {
        self.inner.clear_seen(id, section, tier).await
    }

    async fn record_word_studied(&self, id: LearnerId, study_id: Uuid, word_key: &str) -> Result<()> {
        self.inner.record_word_studied(id, study_id, word_key).await
    }

    async fn studied_word_count(&self, id: LearnerId) -> Result<usize> {
        self.inner.studied_word_count(id).await
    }

    async fn recent_studied_words(&self, id: LearnerId, limit: usize) -> Result<Vec<String>> {
        self.inner.recent_studied_words(id, limit).await
    }

    async fn quiz_checkpoint(&self, id: LearnerId) -> Result<usize> {
        self.inner.quiz_checkpoint(id).await
    }

    async fn set_quiz_checkpoint(&self, id: LearnerId, batches: usize) -> Result<()> {
        trip(&self.checkpoint_failures)?;
        self.inner.set_quiz_checkpoint(id, batches).await
    }
}

fn word(tier: Tier, name: &str, example: &str) -> ContentItem {
    ContentItem::new(tier, name, Material::Word {
        definition: format!("meaning of {}", name),
        example: example.to_string(),
    })
}

fn lesson(tier: Tier, title: &str) -> ContentItem {
    ContentItem::new(tier, title, Material::Lesson {
        content: format!("How to use {}.", title),
    })
}

fn topic(tier: Tier, title: &str) -> ContentItem {
    ContentItem::new(tier, title, Material::Topic {
        description: format!("Talk about {}.", title),
        starter: String::new(),
    })
}

/// One word, lesson and topic per tier
fn small_catalog() -> Vec<ContentItem> {
    Tier::ALL
        .iter()
        .flat_map(|t| {
            vec![
                word(*t, &format!("{} word", t), ""),
                lesson(*t, &format!("{} lesson", t)),
                topic(*t, &format!("{} topic", t)),
            ]
        })
        .collect()
}

/// Five two-option questions per tier; "right" is always correct
fn placement_pool() -> Vec<ContentItem> {
    Tier::ALL
        .iter()
        .flat_map(|t| {
            (0..5).map(move |i| {
                ContentItem::new(*t, format!("{} question {}", t, i), Material::Question {
                    options: vec!["right".to_string(), "wrong".to_string()],
                    answer: 0,
                })
            })
        })
        .collect()
}

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 2,
        backoff: Duration::from_millis(1),
    }
}

struct Harness {
    coordinator: SessionCoordinator,
    store: Arc<dyn LearningStore>,
    grader: Arc<ScriptedGrader>,
}

impl Harness {
    fn new(items: Vec<ContentItem>, policy: PolicyConfig, grader: ScriptedGrader) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), items, policy, grader)
    }

    fn with_store(
        store: Arc<dyn LearningStore>,
        items: Vec<ContentItem>,
        policy: PolicyConfig,
        grader: ScriptedGrader,
    ) -> Self {
        let (catalog, _) = ContentCatalog::new(items, store.clone());
        let catalog = Arc::new(catalog.with_fallback_questions(placement_pool()));
        let grader = Arc::new(grader);
        let coordinator = SessionCoordinator::new(store.clone(), catalog, grader.clone(), policy, quick_retry());
        Self {
            coordinator,
            store,
            grader,
        }
    }

    /// Learner who already finished placement at `tier`
    async fn placed(self, tier: Tier) -> Self {
        self.store.upsert_learner(LEARNER, "Sara").await.unwrap();
        self.store.upsert_tier(LEARNER, tier).await.unwrap();
        self.store.set_assessment_done(LEARNER, true).await.unwrap();
        self
    }

    async fn send(&self, kind: IntentKind) -> Vec<Presentation> {
        self.coordinator
            .handle(LearnerIntent {
                learner_id: LEARNER,
                display_name: "Sara".to_string(),
                kind,
            })
            .await
    }

    async fn press(&self, key: &str) -> Vec<Presentation> {
        self.send(IntentKind::ButtonChoice(key.to_string())).await
    }

    async fn say(&self, text: &str) -> Vec<Presentation> {
        self.send(IntentKind::FreeText(text.to_string())).await
    }

    async fn activity(&self) -> ActivityKind {
        self.coordinator.activity(LEARNER).await
    }

    async fn learner(&self) -> Learner {
        self.store.learner(LEARNER).await.unwrap().unwrap()
    }
}

fn mentions(out: &[Presentation], needle: &str) -> bool {
    out.iter().any(|p| p.text.contains(needle))
}

fn offers(out: &[Presentation], key: &str) -> bool {
    out.iter().any(|p| p.option_keys().contains(&key))
}

/// Button key of the right answer to the quiz question on screen
fn correct_quiz_key(out: &[Presentation]) -> String {
    let question = out.iter().find(|p| p.text.contains("what does")).cloned().unwrap();
    let asked = question.text.split('"').nth(1).unwrap().to_string();
    question
        .options
        .iter()
        .flatten()
        .find(|o| o.label == format!("meaning of {}", asked))
        .map(|o| o.key.clone())
        .unwrap()
}

/// Submit `count` sentences, asking for more words whenever a batch ends
async fn study_words(h: &Harness, count: usize) -> Vec<Presentation> {
    let mut out = h.press("menu:vocab").await;
    for studied in 1..=count {
        if offers(&out, "vocab:more") {
            out = h.press("vocab:more").await;
        }
        assert_eq!(h.activity().await, ActivityKind::PracticingVocab, "before word {}", studied);
        out = h.say(&format!("Here is my own sentence number {}.", studied)).await;
    }
    out
}

/// Answer every placement question, the first `correct` of them right
async fn take_placement(h: &Harness, correct: usize) -> Vec<Presentation> {
    let mut out = h.press("menu:assess").await;
    let mut answered = 0;
    while let Some(question) = out
        .iter()
        .rev()
        .find(|p| p.option_keys().iter().any(|k| k.starts_with("assess:") && *k != "assess:save"))
        .cloned()
    {
        let wanted = if answered < correct { "right" } else { "wrong" };
        let key = question
            .options
            .iter()
            .flatten()
            .find(|o| o.label == wanted)
            .map(|o| o.key.clone())
            .unwrap();
        out = h.press(&key).await;
        answered += 1;
    }
    out
}

#[tokio::test]
async fn test_sixteen_of_twenty_places_intermediate() {
    let h = Harness::new(small_catalog(), PolicyConfig::default(), ScriptedGrader::new(70));

    let out = take_placement(&h, 16).await;

    assert!(mentions(&out, "Your level: Intermediate"));
    assert_eq!(h.activity().await, ActivityKind::Idle);
    let learner = h.learner().await;
    assert_eq!(learner.tier, Tier::Intermediate);
    assert!(learner.assessment_done);
    assert!(offers(&out, "menu:vocab"));
}

#[tokio::test]
async fn test_repeated_answer_is_not_counted_twice() {
    let policy = PolicyConfig {
        assessment_questions: 4,
        ..Default::default()
    };
    let h = Harness::new(small_catalog(), policy, ScriptedGrader::new(70));

    h.press("menu:assess").await;
    let first = h.press("assess:0:0").await;
    assert!(mentions(&first, "Correct"));
    let again = h.press("assess:0:0").await;
    assert!(mentions(&again, "already handled"));

    for i in 1..4 {
        h.press(&format!("assess:{}:1", i)).await;
    }

    // 1 of 4 correct is 25%; a double count would have placed at Intermediate
    assert_eq!(h.learner().await.tier, Tier::Amateur);
}

#[tokio::test]
async fn test_practice_requires_placement() {
    let h = Harness::new(small_catalog(), PolicyConfig::default(), ScriptedGrader::new(70));

    let out = h.press("menu:vocab").await;

    assert!(mentions(&out, "placement test first"));
    assert!(offers(&out, "menu:assess"));
    assert_eq!(h.activity().await, ActivityKind::Idle);
}

#[tokio::test]
async fn test_twentieth_word_starts_quiz() {
    let items: Vec<ContentItem> = (0..20).map(|i| word(Tier::Beginner, &format!("w{}", i), "")).collect();
    let h = Harness::new(items, PolicyConfig::default(), ScriptedGrader::new(70))
        .placed(Tier::Beginner)
        .await;

    let mut out = study_words(&h, 20).await;

    assert_eq!(h.activity().await, ActivityKind::VocabQuiz);
    assert!(mentions(&out, "Quiz time"));
    assert_eq!(h.store.studied_word_count(LEARNER).await.unwrap(), 20);

    for _ in 0..20 {
        out = h.press(&correct_quiz_key(&out)).await;
    }

    assert!(mentions(&out, "20 of 20 correct"));
    assert_eq!(h.activity().await, ActivityKind::Idle);
    assert_eq!(h.store.quiz_checkpoint(LEARNER).await.unwrap(), 1);
    let quiz_samples = h.store.samples(LEARNER, Section::Assessment, Tier::Beginner).await.unwrap();
    assert_eq!(quiz_samples.len(), 1);
    assert_eq!(quiz_samples[0].raw_score, 100);
}

#[tokio::test]
async fn test_repeated_words_still_reach_the_quiz() {
    let items: Vec<ContentItem> = (0..5).map(|i| word(Tier::Beginner, &format!("w{}", i), "")).collect();
    let h = Harness::new(items, PolicyConfig::default(), ScriptedGrader::new(70))
        .placed(Tier::Beginner)
        .await;

    let mut out = study_words(&h, 20).await;
    assert_eq!(h.activity().await, ActivityKind::VocabQuiz);
    assert_eq!(h.store.studied_word_count(LEARNER).await.unwrap(), 20);

    // The quiz covers the five distinct words studied most recently
    for _ in 0..5 {
        out = h.press(&correct_quiz_key(&out)).await;
    }
    assert!(mentions(&out, "5 of 5 correct"));
    assert_eq!(h.activity().await, ActivityKind::Idle);

    // The batch is closed, so the next visit serves words again
    h.press("menu:vocab").await;
    assert_eq!(h.activity().await, ActivityKind::PracticingVocab);
}

#[tokio::test]
async fn test_failed_quiz_save_counts_once() {
    let store = Arc::new(FlakyStore::default());
    let items: Vec<ContentItem> = (0..5).map(|i| word(Tier::Beginner, &format!("w{}", i), "")).collect();
    let policy = PolicyConfig {
        vocab_quiz_interval: 5,
        ..Default::default()
    };
    let h = Harness::with_store(store.clone(), items, policy, ScriptedGrader::new(70))
        .placed(Tier::Beginner)
        .await;

    let mut out = study_words(&h, 5).await;
    assert_eq!(h.activity().await, ActivityKind::VocabQuiz);
    for _ in 0..4 {
        out = h.press(&correct_quiz_key(&out)).await;
    }

    store.checkpoint_failures.store(2, Ordering::SeqCst);
    let last = correct_quiz_key(&out);
    let failed = h.press(&last).await;
    assert!(mentions(&failed, "could not be saved"));
    assert_eq!(h.activity().await, ActivityKind::VocabQuiz);

    let saved = h.press(&last).await;
    assert!(mentions(&saved, "5 of 5 correct"));
    assert_eq!(h.activity().await, ActivityKind::Idle);

    let quiz_samples = tokio_test::assert_ok!(store.samples(LEARNER, Section::Assessment, Tier::Beginner).await);
    assert_eq!(quiz_samples.len(), 1);
    assert_eq!(tokio_test::assert_ok!(store.quiz_checkpoint(LEARNER).await), 1);
}

#[tokio::test]
async fn test_failed_tier_write_does_not_double_count_word() {
    let store = Arc::new(FlakyStore::default());
    let h = Harness::with_store(store.clone(), small_catalog(), PolicyConfig::default(), ScriptedGrader::new(90))
        .placed(Tier::Beginner)
        .await;
    for section in [Section::Grammar, Section::Conversation] {
        store
            .append_score(&ScoreSample::new(LEARNER, section, Tier::Beginner, 100, 100.0))
            .await
            .unwrap();
    }

    h.press("menu:vocab").await;
    store.tier_failures.store(2, Ordering::SeqCst);
    let failed = h.say("I keep my favourite word in a notebook.").await;
    assert!(mentions(&failed, "could not be saved"));
    assert_eq!(h.activity().await, ActivityKind::PracticingVocab);

    let saved = h.say("I keep my favourite word in a notebook.").await;
    assert!(mentions(&saved, "moved up to the Amateur level"));
    assert_eq!(h.learner().await.tier, Tier::Amateur);

    let samples = tokio_test::assert_ok!(store.samples(LEARNER, Section::Vocabulary, Tier::Beginner).await);
    assert_eq!(samples.len(), 1);
    assert_eq!(tokio_test::assert_ok!(store.studied_word_count(LEARNER).await), 1);
}

#[tokio::test]
async fn test_batch_keeps_its_tier_after_upgrade() {
    let mut items = small_catalog();
    items.push(word(Tier::Beginner, "extra", ""));
    let policy = PolicyConfig {
        vocab_batch_size: 2,
        ..Default::default()
    };
    let h = Harness::new(items, policy, ScriptedGrader::new(90))
        .placed(Tier::Beginner)
        .await;
    for (section, increment) in [(Section::Grammar, 100.0), (Section::Conversation, 100.0), (Section::Vocabulary, 40.0)] {
        h.store
            .append_score(&ScoreSample::new(LEARNER, section, Tier::Beginner, 100, increment))
            .await
            .unwrap();
    }

    h.press("menu:vocab").await;
    let first = h.say("My first sentence is about the garden.").await;
    assert!(mentions(&first, "moved up to the Amateur level"));
    assert_eq!(h.activity().await, ActivityKind::PracticingVocab);

    h.say("My second sentence is about the kitchen.").await;

    let beginner = h.store.samples(LEARNER, Section::Vocabulary, Tier::Beginner).await.unwrap();
    assert_eq!(beginner.len(), 3);
    assert!(h.store.samples(LEARNER, Section::Vocabulary, Tier::Amateur).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_copied_example_is_rejected_without_grading() {
    let items = vec![word(Tier::Beginner, "apple", "I eat an apple every day.")];
    let h = Harness::new(items, PolicyConfig::default(), ScriptedGrader::new(70))
        .placed(Tier::Beginner)
        .await;

    h.press("menu:vocab").await;
    let out = h.say("I eat an apple every day!").await;

    assert!(mentions(&out, "sentence of your own"));
    assert_eq!(h.grader.calls(), 0);
    assert_eq!(h.activity().await, ActivityKind::PracticingVocab);
}

#[tokio::test]
async fn test_strong_sections_upgrade_one_tier() {
    let grader = ScriptedGrader::scripted(vec![Ok(80), Ok(85), Ok(85), Ok(90), Ok(90), Ok(90), Ok(90)], 50);
    let h = Harness::new(small_catalog(), PolicyConfig::default(), grader)
        .placed(Tier::Beginner)
        .await;

    h.press("menu:vocab").await;
    h.say("My favourite word today is this one.").await;
    h.press("menu:main").await;

    h.press("menu:grammar").await;
    h.say("She has lived here for ten years.").await;
    let lesson_done = h.say("They have visited Paris twice.").await;
    assert!(mentions(&lesson_done, "complete"));
    assert_eq!(h.learner().await.tier, Tier::Beginner);

    h.press("menu:conversation").await;
    let mut out = Vec::new();
    for turn in 0..4 {
        out = h.say(&format!("I like reading books in the evening, part {}.", turn)).await;
    }

    assert!(mentions(&out, "moved up to the Amateur level"));
    assert_eq!(h.learner().await.tier, Tier::Amateur);
    assert_eq!(h.activity().await, ActivityKind::Idle);

    for (section, expected) in [
        (Section::Vocabulary, 80.0),
        (Section::Grammar, 85.0),
        (Section::Conversation, 90.0),
    ] {
        let value = h.store.read_aggregate(LEARNER, section, Tier::Beginner).await.unwrap();
        assert_eq!(value, expected, "{}", section);
    }
}

#[tokio::test]
async fn test_grader_timeout_keeps_exercise() {
    let grader = ScriptedGrader::scripted(vec![Err(GraderError::Timeout)], 75);
    let h = Harness::new(small_catalog(), PolicyConfig::default(), grader)
        .placed(Tier::Beginner)
        .await;

    h.press("menu:grammar").await;
    let out = h.say("I have finished my homework.").await;

    assert!(mentions(&out, "send it again"));
    assert_eq!(h.activity().await, ActivityKind::PracticingGrammar);
    assert!(h.store.samples(LEARNER, Section::Grammar, Tier::Beginner).await.unwrap().is_empty());

    let retry = h.say("I have finished my homework.").await;
    assert!(mentions(&retry, "Exercise 2 of 2"));
}

#[tokio::test]
async fn test_exit_to_menu_discards_activity() {
    let h = Harness::new(small_catalog(), PolicyConfig::default(), ScriptedGrader::new(90))
        .placed(Tier::Beginner)
        .await;

    h.press("menu:grammar").await;
    h.say("We have eaten lunch already.").await;

    let busy = h.press("menu:vocab").await;
    assert!(mentions(&busy, "in the middle of a grammar lesson"));
    assert_eq!(h.activity().await, ActivityKind::PracticingGrammar);

    let out = h.send(IntentKind::ExitMenu).await;
    assert!(offers(&out, "menu:grammar"));
    assert_eq!(h.activity().await, ActivityKind::Idle);
    assert!(h.store.samples(LEARNER, Section::Grammar, Tier::Beginner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_finished_grammar_offers_review() {
    let h = Harness::new(small_catalog(), PolicyConfig::default(), ScriptedGrader::new(90))
        .placed(Tier::Beginner)
        .await;

    h.press("menu:grammar").await;
    h.say("I have seen that film.").await;
    h.say("He has never been to Spain.").await;

    let out = h.press("menu:grammar").await;
    assert!(mentions(&out, "completed all Beginner grammar lessons"));
    assert!(offers(&out, "grammar:review"));
    assert_eq!(h.activity().await, ActivityKind::Idle);

    let review = h.press("grammar:review").await;
    assert!(mentions(&review, "Beginner lesson"));
    assert_eq!(h.activity().await, ActivityKind::PracticingGrammar);
}

#[tokio::test]
async fn test_conversation_requires_english() {
    let h = Harness::new(small_catalog(), PolicyConfig::default(), ScriptedGrader::new(80))
        .placed(Tier::Beginner)
        .await;

    h.press("menu:conversation").await;
    let out = h.say("من کتاب می‌خوانم").await;

    assert!(mentions(&out, "in English"));
    assert_eq!(h.grader.calls(), 0);

    let reply = h.say("I read books every night.").await;
    assert!(mentions(&reply, "Tell me more"));
    assert!(mentions(&reply, "Turn 2 of 4"));
}

#[tokio::test]
async fn test_failed_assessment_save_can_be_retried() {
    let store = Arc::new(FlakyStore {
        assessment_failures: AtomicU32::new(3),
        ..Default::default()
    });
    let policy = PolicyConfig {
        assessment_questions: 4,
        ..Default::default()
    };
    let h = Harness::with_store(store.clone(), small_catalog(), policy, ScriptedGrader::new(70));

    let out = take_placement(&h, 4).await;
    assert!(offers(&out, "assess:save"));
    assert_eq!(h.activity().await, ActivityKind::Assessing);
    assert!(!h.learner().await.assessment_done);

    let saved = h.press("assess:save").await;
    assert!(mentions(&saved, "Your level: Advanced"));
    assert_eq!(h.activity().await, ActivityKind::Idle);

    let learner = tokio_test::assert_ok!(store.learner(LEARNER).await).unwrap();
    assert!(learner.assessment_done);
    assert_eq!(learner.tier, Tier::Advanced);
    let samples = tokio_test::assert_ok!(store.samples(LEARNER, Section::Assessment, Tier::Advanced).await);
    assert_eq!(samples.len(), 1);
}

#[tokio::test]
async fn test_failed_lesson_save_counts_once() {
    let store = Arc::new(FlakyStore::default());
    let policy = PolicyConfig {
        grammar_exercises: 1,
        ..Default::default()
    };
    let h = Harness::with_store(store.clone(), small_catalog(), policy, ScriptedGrader::new(80))
        .placed(Tier::Beginner)
        .await;

    h.press("menu:grammar").await;
    store.seen_failures.store(2, Ordering::SeqCst);
    let failed = h.say("I have already read this book.").await;
    assert!(mentions(&failed, "could not be saved"));
    assert_eq!(h.activity().await, ActivityKind::PracticingGrammar);

    let saved = h.say("I have already read this book.").await;
    assert!(mentions(&saved, "complete"));
    assert_eq!(h.activity().await, ActivityKind::Idle);

    let samples = tokio_test::assert_ok!(store.samples(LEARNER, Section::Grammar, Tier::Beginner).await);
    assert_eq!(samples.len(), 1);
    let seen = tokio_test::assert_ok!(store.read_seen_content(LEARNER, Section::Grammar, Tier::Beginner).await);
    assert_eq!(seen.len(), 1);
}

#[tokio::test]
async fn test_unknown_button_is_already_handled() {
    let h = Harness::new(small_catalog(), PolicyConfig::default(), ScriptedGrader::new(70));
    let out = h.press("quiz:9").await;
    assert!(mentions(&out, "already handled"));
    assert_eq!(h.activity().await, ActivityKind::Idle);
}

#[tokio::test]
async fn test_learners_do_not_share_sessions() {
    let h = Harness::new(small_catalog(), PolicyConfig::default(), ScriptedGrader::new(70))
        .placed(Tier::Beginner)
        .await;

    h.press("menu:grammar").await;
    let other = h
        .coordinator
        .handle(LearnerIntent::button(2, "Ali", "menu:help"))
        .await;

    assert!(mentions(&other, "How it works"));
    assert_eq!(h.coordinator.activity(2).await, ActivityKind::Idle);
    assert_eq!(h.activity().await, ActivityKind::PracticingGrammar);
}
