//! Per-learner session state machine
//!
//! The [`SessionCoordinator`] owns one [`SessionState`] per learner and is
//! the only way to reach it. Intents for the same learner are processed one
//! at a time; different learners never share mutable state.
//!
//! Handlers follow one rule: every fallible await (grader, store) happens
//! before the scratch state is touched, so a failure leaves the learner on
//! the same item, free to resubmit.

mod assessing;
mod conversation;
mod grammar;
pub mod guards;
pub mod keys;
mod present;
mod vocab;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assessment::{AssessmentFlow, AssessmentRun};
use crate::catalog::{ContentCatalog, ContentItem};
use crate::config::PolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::grader::Grader;
use crate::messaging::{IntentKind, LearnerIntent, Presentation};
use crate::progress::ProgressTracker;
use crate::store::{LearningStore, RetryPolicy};
use crate::types::{Learner, LearnerId, Tier};

use keys::{Choice, MenuAction};

/// Vocabulary batch being worked through
#[derive(Debug, Clone)]
pub struct VocabScratch {
    /// Tier the batch was served at. Words keep scoring here even if the
    /// learner moves up before the batch is finished.
    pub tier: Tier,
    pub words: Vec<ContentItem>,
    /// Sample id per word, fixed when the batch is drawn
    pub sample_ids: Vec<Uuid>,
    pub index: usize,
}

/// One quiz question: pick the definition of a studied word
#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub word_key: String,
    pub word: String,
    pub options: Vec<String>,
    pub answer: usize,
}

#[derive(Debug, Clone)]
pub struct QuizScratch {
    pub tier: Tier,
    pub questions: Vec<QuizQuestion>,
    /// Studied-word batch this quiz closes
    pub batch: usize,
    pub sample_id: Uuid,
    pub current: usize,
    pub correct: usize,
}

#[derive(Debug, Clone)]
pub struct GrammarScratch {
    pub tier: Tier,
    pub lesson: ContentItem,
    pub scores: Vec<u8>,
    pub sample_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ConversationScratch {
    pub tier: Tier,
    pub topic: ContentItem,
    pub scores: Vec<u8>,
    pub partner_replies: u32,
    pub sample_id: Uuid,
}

/// Current activity with its scratch data
#[derive(Debug, Clone, Default)]
pub enum Activity {
    #[default]
    Idle,
    Assessing(AssessmentRun),
    PracticingVocab(VocabScratch),
    PracticingGrammar(GrammarScratch),
    PracticingConversation(ConversationScratch),
    VocabQuiz(QuizScratch),
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Activity::Idle => ActivityKind::Idle,
            Activity::Assessing(_) => ActivityKind::Assessing,
            Activity::PracticingVocab(_) => ActivityKind::PracticingVocab,
            Activity::PracticingGrammar(_) => ActivityKind::PracticingGrammar,
            Activity::PracticingConversation(_) => ActivityKind::PracticingConversation,
            Activity::VocabQuiz(_) => ActivityKind::VocabQuiz,
        }
    }
}

/// Activity without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Idle,
    Assessing,
    PracticingVocab,
    PracticingGrammar,
    PracticingConversation,
    VocabQuiz,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::Idle => write!(f, "the menu"),
            ActivityKind::Assessing => write!(f, "the placement test"),
            ActivityKind::PracticingVocab => write!(f, "vocabulary practice"),
            ActivityKind::PracticingGrammar => write!(f, "a grammar lesson"),
            ActivityKind::PracticingConversation => write!(f, "a conversation"),
            ActivityKind::VocabQuiz => write!(f, "a vocabulary quiz"),
        }
    }
}

/// Ephemeral per-learner state
#[derive(Debug, Default)]
pub struct SessionState {
    pub activity: Activity,
}

/// Outcome of handling one intent
pub(crate) struct Step {
    out: Vec<Presentation>,
    next: Option<Activity>,
}

impl Step {
    fn stay(out: Vec<Presentation>) -> Self {
        Self { out, next: None }
    }

    fn go(next: Activity, out: Vec<Presentation>) -> Self {
        Self { out, next: Some(next) }
    }

    /// Put presentations in front of this step's output
    fn after(mut self, mut first: Vec<Presentation>) -> Self {
        first.append(&mut self.out);
        self.out = first;
        self
    }
}

fn average(scores: &[u8]) -> u8 {
    if scores.is_empty() {
        return 0;
    }
    let sum: u32 = scores.iter().map(|s| *s as u32).sum();
    (sum as f64 / scores.len() as f64).round() as u8
}

/// Owns every learner's session and drives the activities
pub struct SessionCoordinator {
    store: Arc<dyn LearningStore>,
    catalog: Arc<ContentCatalog>,
    progress: ProgressTracker,
    assessment: AssessmentFlow,
    grader: Arc<dyn Grader>,
    policy: PolicyConfig,
    retry: RetryPolicy,
    sessions: Mutex<HashMap<LearnerId, Arc<Mutex<SessionState>>>>,
}

impl SessionCoordinator {
    pub fn new(
        store: Arc<dyn LearningStore>,
        catalog: Arc<ContentCatalog>,
        grader: Arc<dyn Grader>,
        policy: PolicyConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            progress: ProgressTracker::new(store.clone(), catalog.clone(), policy.clone(), retry),
            assessment: AssessmentFlow::new(catalog.clone(), store.clone(), policy.clone(), retry),
            store,
            catalog,
            grader,
            policy,
            retry,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    async fn slot(&self, learner_id: LearnerId) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(learner_id).or_default().clone()
    }

    /// Drop an idle learner's slot unless another intent already holds it.
    /// Slots are only cloned under the map lock, so the count is exact here.
    async fn release(&self, learner_id: LearnerId, slot: &Arc<Mutex<SessionState>>) {
        let mut sessions = self.sessions.lock().await;
        let unshared = sessions
            .get(&learner_id)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && Arc::strong_count(slot) == 2);
        if unshared {
            sessions.remove(&learner_id);
        }
    }

    #[cfg(test)]
    async fn live_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Current activity of a learner; Idle if never seen
    pub async fn activity(&self, learner_id: LearnerId) -> ActivityKind {
        let slot = self.sessions.lock().await.get(&learner_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.activity.kind(),
            None => ActivityKind::Idle,
        }
    }

    /// Handle one intent and return what to show the learner
    pub async fn handle(&self, intent: LearnerIntent) -> Vec<Presentation> {
        let slot = self.slot(intent.learner_id).await;
        let mut state = slot.lock().await;
        let out = self.handle_locked(&mut state, &intent).await;

        let idle = matches!(state.activity, Activity::Idle);
        drop(state);
        if idle {
            self.release(intent.learner_id, &slot).await;
        }
        out
    }

    async fn handle_locked(&self, state: &mut SessionState, intent: &LearnerIntent) -> Vec<Presentation> {
        let learner = match self.store.upsert_learner(intent.learner_id, &intent.display_name).await {
            Ok(learner) => learner,
            Err(e) => {
                error!("Failed to load learner {}: {:#}", intent.learner_id, e);
                state.activity = Activity::Idle;
                return vec![Presentation::feedback(
                    "Sorry, something went wrong on our side. Please try again in a moment.",
                )];
            }
        };

        let before = state.activity.kind();
        match self.dispatch(state, &learner, &intent.kind).await {
            Ok(step) => {
                if let Some(next) = step.next {
                    if next.kind() != before {
                        debug!("Learner {}: {:?} -> {:?}", learner.id, before, next.kind());
                    }
                    state.activity = next;
                }
                step.out
            }
            Err(e) => self.recover(state, &learner, e).await,
        }
    }

    /// Map an engine error to what the learner sees, closest to the cause
    async fn recover(&self, state: &mut SessionState, learner: &Learner, e: EngineError) -> Vec<Presentation> {
        match e {
            EngineError::GraderUnavailable(reason) => {
                warn!("Grader unavailable for learner {}: {}", learner.id, reason);
                vec![Presentation::feedback(
                    "I couldn't check your answer just now. Please send it again.",
                )]
            }
            EngineError::PersistenceWriteFailure { .. } => {
                warn!("Learner {}: {}", learner.id, e);
                vec![Presentation::feedback(
                    "Your progress could not be saved. Please send your answer again.",
                )]
            }
            EngineError::StaleIntent(reason) => {
                debug!("Learner {}: stale intent ({})", learner.id, reason);
                vec![present::already_handled()]
            }
            EngineError::ContentExhausted { .. }
            | EngineError::InsufficientQuestions { .. }
            | EngineError::ConfigurationDegenerate(_) => {
                warn!("Learner {}: {}", learner.id, e);
                state.activity = Activity::Idle;
                vec![
                    Presentation::feedback("Sorry, there is no material available for this right now."),
                    present::menu(&self.fresh(learner).await),
                ]
            }
            EngineError::Other(err) => {
                error!("Unexpected error for learner {}: {:#}", learner.id, err);
                state.activity = Activity::Idle;
                present::apology(&self.fresh(learner).await)
            }
        }
    }

    /// Re-read the learner after a write may have changed the tier
    async fn fresh(&self, learner: &Learner) -> Learner {
        match self.store.learner(learner.id).await {
            Ok(Some(fresh)) => fresh,
            _ => learner.clone(),
        }
    }

    async fn dispatch(&self, state: &mut SessionState, learner: &Learner, kind: &IntentKind) -> EngineResult<Step> {
        let (choice, text) = match kind {
            IntentKind::ExitMenu => return Ok(self.exit_to_menu(state, learner)),
            IntentKind::ButtonChoice(key) => match Choice::parse(key) {
                Some(choice) => (Some(choice), None),
                None => {
                    debug!("Learner {}: unknown button key {:?}", learner.id, key);
                    return Err(EngineError::StaleIntent(format!("unknown key {}", key)));
                }
            },
            IntentKind::FreeText(text) => (None, Some(text.trim())),
        };

        match choice {
            Some(Choice::Menu(MenuAction::Main)) => return Ok(self.exit_to_menu(state, learner)),
            Some(Choice::Menu(MenuAction::Help)) => return Ok(Step::stay(vec![present::help()])),
            Some(Choice::Menu(MenuAction::Progress)) => {
                let report = self.progress.report(learner.id).await?;
                return Ok(Step::stay(vec![Presentation::summary(report.to_string())]));
            }
            Some(Choice::Menu(_)) if !matches!(state.activity, Activity::Idle) => {
                return Ok(Step::stay(vec![present::busy(state.activity.kind())]));
            }
            _ => {}
        }

        match &mut state.activity {
            Activity::Idle => self.on_idle(learner, choice).await,
            Activity::Assessing(run) => self.on_assessing(learner, run, choice).await,
            Activity::PracticingVocab(scratch) => self.on_vocab(learner, scratch, choice, text).await,
            Activity::VocabQuiz(quiz) => self.on_quiz(learner, quiz, choice).await,
            Activity::PracticingGrammar(scratch) => self.on_grammar(learner, scratch, text).await,
            Activity::PracticingConversation(scratch) => self.on_conversation(learner, scratch, text).await,
        }
    }

    fn exit_to_menu(&self, state: &SessionState, learner: &Learner) -> Step {
        if !matches!(state.activity, Activity::Idle) {
            info!("Learner {} left {}", learner.id, state.activity.kind());
        }
        Step::go(Activity::Idle, vec![present::menu(learner)])
    }

    async fn on_idle(&self, learner: &Learner, choice: Option<Choice>) -> EngineResult<Step> {
        let needs_placement = || {
            Step::stay(vec![
                Presentation::prompt("Please take the placement test first so we can pick the right level."),
                present::menu(learner),
            ])
        };

        match choice {
            Some(Choice::Menu(MenuAction::Assess)) if learner.assessment_done => Ok(Step::stay(vec![
                Presentation::prompt(format!(
                    "You already have a level ({}). Do you want to take the placement test again?",
                    learner.tier
                ))
                .with_options(vec![
                    crate::messaging::ButtonOption::new(Choice::Menu(MenuAction::Reassess).key(), "🧪 Retake placement test"),
                    present::back_to_menu(),
                ]),
            ])),
            Some(Choice::Menu(MenuAction::Assess)) | Some(Choice::Menu(MenuAction::Reassess)) => {
                self.start_assessment(learner)
            }
            Some(Choice::Menu(_)) | Some(Choice::GrammarReview) if !learner.assessment_done => Ok(needs_placement()),
            Some(Choice::Menu(MenuAction::Vocabulary)) => self.start_vocab(learner).await,
            Some(Choice::Menu(MenuAction::Grammar)) => self.start_grammar(learner).await,
            Some(Choice::Menu(MenuAction::Conversation)) => self.start_conversation(learner).await,
            Some(Choice::GrammarReview) => self.review_grammar(learner).await,
            Some(_) => Ok(Step::stay(vec![present::already_handled(), present::menu(learner)])),
            None => Ok(Step::stay(vec![
                Presentation::prompt("Please use the menu buttons to choose what to practice."),
                present::menu(learner),
            ])),
        }
    }
}
