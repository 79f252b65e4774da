use tracing::{info, warn};
use uuid::Uuid;

use super::guards::is_english;
use super::{average, present, Activity, ConversationScratch, SessionCoordinator, Step};
use crate::catalog::Material;
use crate::error::{EngineError, EngineResult};
use crate::grader::Rubric;
use crate::messaging::Presentation;
use crate::store::with_retry;
use crate::types::{Learner, Section};

impl SessionCoordinator {
    pub(super) async fn start_conversation(&self, learner: &Learner) -> EngineResult<Step> {
        let topic = self
            .catalog
            .draw(learner.id, Section::Conversation, learner.tier, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(EngineError::ContentExhausted {
                section: Section::Conversation,
                tier: learner.tier,
            })?;
        let key = [topic.key.clone()];
        with_retry(self.retry, "seen topic", || {
            self.catalog.mark_seen(learner.id, Section::Conversation, learner.tier, &key)
        })
        .await?;

        let out = vec![present::conversation_topic(&topic, learner.tier, self.policy.conversation_turns)];
        Ok(Step::go(
            Activity::PracticingConversation(ConversationScratch {
                tier: learner.tier,
                topic,
                scores: Vec::new(),
                partner_replies: 0,
                sample_id: Uuid::new_v4(),
            }),
            out,
        ))
    }

    pub(super) async fn on_conversation(
        &self,
        learner: &Learner,
        scratch: &mut ConversationScratch,
        text: Option<&str>,
    ) -> EngineResult<Step> {
        let Some(message) = text.filter(|t| !t.is_empty()) else {
            return Ok(Step::stay(vec![Presentation::prompt(format!(
                "Please reply in a message about \"{}\".",
                scratch.topic.title
            ))
            .with_options(vec![present::back_to_menu()])]));
        };
        if !is_english(message) {
            return Ok(Step::stay(vec![Presentation::feedback(
                "Please write your reply in English.",
            )]));
        }

        let description = match &scratch.topic.material {
            Material::Topic { description, .. } => description.as_str(),
            _ => "",
        };
        let rubric = Rubric::conversation(&scratch.topic.title, description, scratch.tier);
        let grade = self.grader.grade(&rubric, message).await?;

        let turns = self.policy.conversation_turns.max(1) as usize;
        let mut scores = scratch.scores.clone();
        scores.push(grade.score);

        if scores.len() >= turns {
            let final_score = average(&scores);
            let progress = self
                .progress
                .record_score(
                    learner.id,
                    Section::Conversation,
                    scratch.tier,
                    final_score,
                    scratch.sample_id,
                )
                .await?;
            let upgraded = self.progress.try_upgrade_tier(learner.id).await?;
            scratch.scores = scores;
            info!(
                "Learner {} finished conversation \"{}\" with {}",
                learner.id, scratch.topic.title, final_score
            );

            let fresh = self.fresh(learner).await;
            let mut out = vec![
                present::grade_feedback(&grade),
                Presentation::summary(format!(
                    "🗣️ Conversation finished. Score: {}/100. Conversation progress: {:.0}%",
                    final_score, progress
                )),
            ];
            if upgraded {
                out.push(present::level_up(fresh.tier));
            }
            out.push(present::menu(&fresh));
            return Ok(Step::go(Activity::Idle, out));
        }

        scratch.scores = scores;
        let mut out = vec![present::grade_feedback(&grade)];

        if scratch.partner_replies < self.policy.conversation_partner_replies {
            match self.grader.converse(&scratch.topic.title, message).await {
                Ok(Some(reply)) => {
                    scratch.partner_replies += 1;
                    out.push(Presentation::prompt(format!("💬 {}", reply)));
                }
                Ok(None) => {}
                Err(e) => warn!("No conversation reply for learner {}: {}", learner.id, e),
            }
        }

        out.push(Presentation::prompt(format!(
            "Turn {} of {}: send your next message.",
            scratch.scores.len() + 1,
            turns
        )));
        Ok(Step::stay(out))
    }
}
