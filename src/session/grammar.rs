use tracing::info;
use uuid::Uuid;

use super::{average, present, Activity, GrammarScratch, SessionCoordinator, Step};
use crate::catalog::Material;
use crate::error::{EngineError, EngineResult};
use crate::grader::Rubric;
use crate::messaging::Presentation;
use crate::store::with_retry;
use crate::types::{Learner, Section};

impl SessionCoordinator {
    /// Next unseen lesson in catalog order
    pub(super) async fn start_grammar(&self, learner: &Learner) -> EngineResult<Step> {
        let drawn = self
            .catalog
            .draw(learner.id, Section::Grammar, learner.tier, 1)
            .await
            .map(|lessons| lessons.into_iter().next());
        let lesson = match drawn {
            Ok(Some(lesson)) => lesson,
            Ok(None) => {
                return Err(EngineError::ContentExhausted {
                    section: Section::Grammar,
                    tier: learner.tier,
                })
            }
            Err(EngineError::ContentExhausted { tier, .. })
                if self.catalog.total_items(Section::Grammar, tier) > 0 =>
            {
                return Ok(Step::stay(vec![present::grammar_all_complete(tier)]));
            }
            Err(e) => return Err(e),
        };

        let out = vec![present::grammar_lesson(&lesson, learner.tier, self.policy.grammar_exercises)];
        Ok(Step::go(
            Activity::PracticingGrammar(GrammarScratch {
                tier: learner.tier,
                lesson,
                scores: Vec::new(),
                sample_id: Uuid::new_v4(),
            }),
            out,
        ))
    }

    /// Start the tier's lessons over from the first one
    pub(super) async fn review_grammar(&self, learner: &Learner) -> EngineResult<Step> {
        with_retry(self.retry, "grammar review", || {
            self.catalog.reset_cycle(learner.id, Section::Grammar, learner.tier)
        })
        .await?;
        info!("Learner {} is reviewing {} grammar", learner.id, learner.tier);
        self.start_grammar(learner).await
    }

    pub(super) async fn on_grammar(
        &self,
        learner: &Learner,
        scratch: &mut GrammarScratch,
        text: Option<&str>,
    ) -> EngineResult<Step> {
        let Some(sentence) = text.filter(|t| !t.is_empty()) else {
            return Ok(Step::stay(vec![Presentation::prompt(format!(
                "Please write a sentence that uses \"{}\".",
                scratch.lesson.title
            ))
            .with_options(vec![present::back_to_menu()])]));
        };

        let content = match &scratch.lesson.material {
            Material::Lesson { content } => content.as_str(),
            _ => "",
        };
        let rubric = Rubric::grammar(&scratch.lesson.title, content, scratch.tier);
        let grade = self.grader.grade(&rubric, sentence).await?;

        let exercises = self.policy.grammar_exercises.max(1) as usize;
        let mut scores = scratch.scores.clone();
        scores.push(grade.score);

        if scores.len() < exercises {
            scratch.scores = scores;
            return Ok(Step::stay(vec![
                present::grade_feedback(&grade),
                Presentation::prompt(format!(
                    "Exercise {} of {}: write another sentence.",
                    scratch.scores.len() + 1,
                    exercises
                )),
            ]));
        }

        let final_score = average(&scores);
        let progress = self
            .progress
            .record_score(
                learner.id,
                Section::Grammar,
                scratch.tier,
                final_score,
                scratch.sample_id,
            )
            .await?;
        let key = [scratch.lesson.key.clone()];
        with_retry(self.retry, "completed lesson", || {
            self.catalog.mark_seen(learner.id, Section::Grammar, scratch.tier, &key)
        })
        .await?;
        let upgraded = self.progress.try_upgrade_tier(learner.id).await?;
        scratch.scores = scores;

        let fresh = self.fresh(learner).await;
        let mut out = vec![
            present::grade_feedback(&grade),
            Presentation::summary(format!(
                "📝 Lesson \"{}\" complete. Lesson score: {}/100. Grammar progress: {:.0}%",
                scratch.lesson.title, final_score, progress
            )),
        ];
        if upgraded {
            out.push(present::level_up(fresh.tier));
        }
        out.push(present::menu(&fresh));
        Ok(Step::go(Activity::Idle, out))
    }
}
