use tracing::warn;

use super::keys::Choice;
use super::{present, Activity, SessionCoordinator, Step};
use crate::assessment::{AnswerOutcome, AssessmentRun};
use crate::error::{EngineError, EngineResult};
use crate::messaging::Presentation;
use crate::types::Learner;

impl SessionCoordinator {
    pub(super) fn start_assessment(&self, learner: &Learner) -> EngineResult<Step> {
        let run = self.assessment.start(learner.id)?;
        let intro = Presentation::prompt(format!(
            "🧪 Placement test: {} questions, from easy to hard. Pick the best answer for each one.",
            run.total()
        ));
        let mut out = vec![intro];
        out.extend(present::assessment_question(&run));
        Ok(Step::go(Activity::Assessing(run), out))
    }

    pub(super) async fn on_assessing(
        &self,
        learner: &Learner,
        run: &mut AssessmentRun,
        choice: Option<Choice>,
    ) -> EngineResult<Step> {
        match choice {
            Some(Choice::AssessAnswer { question, option }) => {
                match self.assessment.record_answer(run, question, option) {
                    AnswerOutcome::Stale => {
                        let mut out = vec![present::already_handled()];
                        out.extend(present::assessment_question(run));
                        Ok(Step::stay(out))
                    }
                    AnswerOutcome::Recorded { correct, correct_answer } => {
                        let verdict = if correct {
                            Presentation::feedback("✅ Correct!")
                        } else {
                            Presentation::feedback(format!("❌ Not quite. The answer is: {}", correct_answer))
                        };
                        if run.is_finished() {
                            return Ok(self.finish_assessment(learner, run).await?.after(vec![verdict]));
                        }
                        let mut out = vec![verdict];
                        out.extend(present::assessment_question(run));
                        Ok(Step::stay(out))
                    }
                }
            }
            Some(Choice::AssessSave) if run.is_finished() => self.finish_assessment(learner, run).await,
            _ if run.is_finished() => Ok(Step::stay(vec![present::assessment_save_failed()])),
            _ => {
                let mut out = vec![present::choose_an_option()];
                out.extend(present::assessment_question(run));
                Ok(Step::stay(out))
            }
        }
    }

    /// Persist the finished run; a failed save keeps the run so it can be retried
    async fn finish_assessment(&self, learner: &Learner, run: &AssessmentRun) -> EngineResult<Step> {
        match self.assessment.complete(learner.id, run).await {
            Ok(tier) => {
                let fresh = self.fresh(learner).await;
                Ok(Step::go(
                    Activity::Idle,
                    vec![present::assessment_result(run, tier), present::menu(&fresh)],
                ))
            }
            Err(e @ EngineError::PersistenceWriteFailure { .. }) => {
                warn!("Placement result for learner {} not saved: {}", learner.id, e);
                Ok(Step::stay(vec![present::assessment_save_failed()]))
            }
            Err(e) => Err(e),
        }
    }
}
