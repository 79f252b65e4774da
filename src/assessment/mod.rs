//! Placement assessment
//!
//! Draws a tier-balanced multiple-choice test, scores answers one question
//! at a time and maps the final percentage to a starting tier.

use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{content_key, ContentCatalog, ContentItem, Material};
use crate::config::PolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::{with_retry, LearningStore, RetryPolicy};
use crate::types::{LearnerId, ScoreSample, Section, Tier};

/// One multiple-choice question in a run
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub tier: Tier,
    pub text: String,
    pub options: Vec<String>,
    pub answer: usize,
}

impl Question {
    fn from_item(item: &ContentItem) -> Option<Self> {
        match &item.material {
            Material::Question { options, answer } => Some(Self {
                tier: item.tier,
                text: item.title.clone(),
                options: options.clone(),
                answer: *answer,
            }),
            _ => None,
        }
    }

    pub fn correct_answer(&self) -> &str {
        self.options.get(self.answer).map(String::as_str).unwrap_or_default()
    }
}

/// A placement test in progress
#[derive(Debug, Clone)]
pub struct AssessmentRun {
    pub run_id: Uuid,
    pub questions: Vec<Question>,
    /// Index of the question expected next
    pub current: usize,
    pub correct: usize,
}

impl AssessmentRun {
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    pub fn percentage(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        self.correct as f64 / self.questions.len() as f64 * 100.0
    }
}

/// Result of submitting an answer
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Recorded { correct: bool, correct_answer: String },
    /// Index did not match the expected question; nothing changed
    Stale,
}

/// Map a percentage to a tier using the configured thresholds
pub fn tier_for_percentage(percentage: f64, policy: &PolicyConfig) -> Tier {
    if percentage >= policy.advanced_threshold {
        Tier::Advanced
    } else if percentage >= policy.intermediate_threshold {
        Tier::Intermediate
    } else if percentage >= policy.amateur_threshold {
        Tier::Amateur
    } else {
        Tier::Beginner
    }
}

/// Questions per tier: an even split with the remainder going to the top tier
pub fn questions_per_tier(total: usize) -> [(Tier, usize); 4] {
    let base = total / Tier::ALL.len();
    let remainder = total % Tier::ALL.len();
    Tier::ALL.map(|tier| {
        let extra = if tier == Tier::Advanced { remainder } else { 0 };
        (tier, base + extra)
    })
}

/// Runs placement tests
pub struct AssessmentFlow {
    catalog: Arc<ContentCatalog>,
    store: Arc<dyn LearningStore>,
    policy: PolicyConfig,
    retry: RetryPolicy,
}

impl AssessmentFlow {
    pub fn new(
        catalog: Arc<ContentCatalog>,
        store: Arc<dyn LearningStore>,
        policy: PolicyConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            store,
            policy,
            retry,
        }
    }

    /// Draw a fresh question set.
    ///
    /// Each tier takes catalog questions first, then the static fallback
    /// pool. Slots a tier cannot fill are taken from whatever unique
    /// questions remain. Question text never repeats within a run.
    pub fn start(&self, learner_id: LearnerId) -> EngineResult<AssessmentRun> {
        let needed = self.policy.assessment_questions;
        let mut rng = rand::rng();
        let mut used: HashSet<String> = HashSet::new();
        let mut questions = Vec::with_capacity(needed);
        let mut leftovers: Vec<Question> = Vec::new();

        for (tier, quota) in questions_per_tier(needed) {
            let mut from_catalog: Vec<&ContentItem> = self.catalog.items(Section::Assessment, tier).iter().collect();
            from_catalog.shuffle(&mut rng);
            let mut from_fallback: Vec<&ContentItem> = self
                .catalog
                .fallback_questions()
                .iter()
                .filter(|q| q.tier == tier)
                .collect();
            from_fallback.shuffle(&mut rng);

            let mut taken = 0;
            for item in from_catalog.into_iter().chain(from_fallback) {
                let Some(question) = Question::from_item(item) else { continue };
                let key = content_key(&question.text);
                if used.contains(&key) {
                    continue;
                }
                if taken < quota {
                    used.insert(key);
                    questions.push(question);
                    taken += 1;
                } else {
                    leftovers.push(question);
                }
            }
            if taken < quota {
                debug!("Only {} of {} {} questions available", taken, quota, tier);
            }
        }

        leftovers.shuffle(&mut rng);
        for question in leftovers {
            if questions.len() >= needed {
                break;
            }
            if used.insert(content_key(&question.text)) {
                questions.push(question);
            }
        }

        if questions.len() < needed {
            return Err(EngineError::InsufficientQuestions {
                needed,
                found: questions.len(),
            });
        }

        // Easy questions first
        questions.sort_by_key(|q| q.tier);

        info!("Learner {} started a placement test with {} questions", learner_id, questions.len());
        Ok(AssessmentRun {
            run_id: Uuid::new_v4(),
            questions,
            current: 0,
            correct: 0,
        })
    }

    /// Score the answer to `question_index`; anything but the expected index is stale
    pub fn record_answer(&self, run: &mut AssessmentRun, question_index: usize, selected: usize) -> AnswerOutcome {
        if question_index != run.current {
            debug!(
                "Ignoring stale answer for question {} (expected {})",
                question_index, run.current
            );
            return AnswerOutcome::Stale;
        }
        let Some(question) = run.questions.get(question_index) else {
            return AnswerOutcome::Stale;
        };
        if selected >= question.options.len() {
            return AnswerOutcome::Stale;
        }

        let correct = selected == question.answer;
        let correct_answer = question.correct_answer().to_string();
        if correct {
            run.correct += 1;
        }
        run.current += 1;

        AnswerOutcome::Recorded { correct, correct_answer }
    }

    /// Persist the result of a finished run and return the placed tier.
    ///
    /// Every write is an idempotent upsert keyed by the run, so calling this
    /// again after a failure is safe.
    pub async fn complete(&self, learner_id: LearnerId, run: &AssessmentRun) -> EngineResult<Tier> {
        if !run.is_finished() {
            return Err(EngineError::StaleIntent(format!(
                "assessment has {} unanswered question(s)",
                run.total() - run.current
            )));
        }

        let percentage = run.percentage();
        let tier = tier_for_percentage(percentage, &self.policy);

        let mut sample = ScoreSample::new(learner_id, Section::Assessment, tier, percentage.round() as u8, 0.0);
        sample.id = run.run_id;

        with_retry(self.retry, "tier", || self.store.upsert_tier(learner_id, tier)).await?;
        with_retry(self.retry, "assessment score", || self.store.append_score(&sample)).await?;
        with_retry(self.retry, "assessment flag", || self.store.set_assessment_done(learner_id, true)).await?;

        info!(
            "Learner {} placed at {} ({}/{} correct, {:.0}%)",
            learner_id, tier, run.correct, run.total(), percentage
        );
        Ok(tier)
    }
}
