use rand::seq::SliceRandom;
use tracing::{debug, info};
use uuid::Uuid;

use super::guards::similarity_ratio;
use super::keys::Choice;
use super::{present, Activity, QuizQuestion, QuizScratch, SessionCoordinator, Step, VocabScratch};
use crate::catalog::Material;
use crate::error::EngineResult;
use crate::grader::Rubric;
use crate::messaging::Presentation;
use crate::store::with_retry;
use crate::types::{Learner, Section};

const QUIZ_DISTRACTORS: usize = 3;

impl SessionCoordinator {
    /// Serve a quiz when one is due, otherwise a new batch
    pub(super) async fn start_vocab(&self, learner: &Learner) -> EngineResult<Step> {
        if let Some(step) = self.quiz_if_due(learner).await? {
            return Ok(step);
        }

        let words = self
            .catalog
            .draw(learner.id, Section::Vocabulary, learner.tier, self.policy.vocab_batch_size)
            .await?;
        let keys: Vec<String> = words.iter().map(|w| w.key.clone()).collect();
        with_retry(self.retry, "seen vocabulary", || {
            self.catalog.mark_seen(learner.id, Section::Vocabulary, learner.tier, &keys)
        })
        .await?;

        let scratch = VocabScratch {
            tier: learner.tier,
            sample_ids: words.iter().map(|_| Uuid::new_v4()).collect(),
            words,
            index: 0,
        };
        let out = present::vocab_word(&scratch).into_iter().collect();
        Ok(Step::go(Activity::PracticingVocab(scratch), out))
    }

    /// Quiz due once the studied-word count passes the next multiple of the
    /// interval. Repeated words count again.
    async fn quiz_if_due(&self, learner: &Learner) -> EngineResult<Option<Step>> {
        let interval = self.policy.vocab_quiz_interval;
        if interval == 0 {
            return Ok(None);
        }
        let batch = self.store.studied_word_count(learner.id).await? / interval;
        if batch <= self.store.quiz_checkpoint(learner.id).await? {
            return Ok(None);
        }

        let recent = self.store.recent_studied_words(learner.id, interval).await?;
        let questions = self.build_quiz(&recent, learner);
        if questions.is_empty() {
            debug!("No quiz could be built for learner {}; closing batch {}", learner.id, batch);
            with_retry(self.retry, "quiz checkpoint", || self.store.set_quiz_checkpoint(learner.id, batch)).await?;
            return Ok(None);
        }

        info!("Learner {} gets a {}-question vocabulary quiz", learner.id, questions.len());
        let quiz = QuizScratch {
            tier: learner.tier,
            questions,
            batch,
            sample_id: Uuid::new_v4(),
            current: 0,
            correct: 0,
        };
        let mut out = vec![Presentation::prompt(
            "⏰ Quiz time! Let's check the words you have studied.",
        )];
        out.extend(present::quiz_question(&quiz.questions, 0));
        Ok(Some(Step::go(Activity::VocabQuiz(quiz), out)))
    }

    /// One question per studied word that still has a definition and distractors
    fn build_quiz(&self, word_keys: &[String], learner: &Learner) -> Vec<QuizQuestion> {
        let mut rng = rand::rng();
        let mut questions = Vec::new();

        for key in word_keys {
            let Some(item) = self.catalog.find(Section::Vocabulary, key) else { continue };
            let Some(definition) = item.definition() else { continue };
            let distractors = self.catalog.distractor_definitions(key, item.tier, QUIZ_DISTRACTORS);
            if distractors.is_empty() {
                continue;
            }

            let mut options = distractors;
            options.push(definition.to_string());
            options.shuffle(&mut rng);
            let answer = options.iter().position(|o| o == definition).unwrap_or_default();

            questions.push(QuizQuestion {
                word_key: key.clone(),
                word: item.title.clone(),
                options,
                answer,
            });
        }

        if questions.is_empty() {
            debug!("Learner {}: none of {} words could be quizzed", learner.id, word_keys.len());
        }
        questions
    }

    pub(super) async fn on_vocab(
        &self,
        learner: &Learner,
        scratch: &mut VocabScratch,
        choice: Option<Choice>,
        text: Option<&str>,
    ) -> EngineResult<Step> {
        let finished = scratch.index >= scratch.words.len();

        match (choice, text) {
            (None, Some(sentence)) if !finished => self.submit_sentence(learner, scratch, sentence).await,
            (Some(Choice::VocabSkip(idx)), _) if idx == scratch.index && !finished => {
                scratch.index += 1;
                Ok(Step::stay(self.next_word_or_done(scratch)))
            }
            (Some(Choice::VocabSkip(_)), _) => {
                let mut out = vec![present::already_handled()];
                out.extend(self.next_word_or_done(scratch));
                Ok(Step::stay(out))
            }
            (Some(Choice::VocabMore), _) if finished => self.start_vocab(learner).await,
            _ if finished => Ok(Step::stay(vec![present::vocab_batch_done()])),
            _ => {
                let mut out = vec![Presentation::prompt("Please write a sentence with the word.")];
                out.extend(present::vocab_word(scratch));
                Ok(Step::stay(out))
            }
        }
    }

    fn next_word_or_done(&self, scratch: &VocabScratch) -> Vec<Presentation> {
        match present::vocab_word(scratch) {
            Some(word) => vec![word],
            None => vec![present::vocab_batch_done()],
        }
    }

    async fn submit_sentence(&self, learner: &Learner, scratch: &mut VocabScratch, sentence: &str) -> EngineResult<Step> {
        let Some(item) = scratch.words.get(scratch.index).cloned() else {
            return Ok(Step::stay(vec![present::vocab_batch_done()]));
        };
        let (definition, example) = match &item.material {
            Material::Word { definition, example } => (definition.as_str(), example.as_str()),
            _ => ("", ""),
        };

        if !example.is_empty() && similarity_ratio(sentence, example) > self.policy.similarity_limit {
            let mut out = vec![Presentation::feedback(
                "That is very close to the example. Please write a sentence of your own.",
            )];
            out.extend(present::vocab_word(scratch));
            return Ok(Step::stay(out));
        }

        let rubric = Rubric::vocabulary(&item.title, definition, scratch.tier);
        let grade = self.grader.grade(&rubric, sentence).await?;

        let sample_id = scratch.sample_ids.get(scratch.index).copied().unwrap_or_else(Uuid::new_v4);
        with_retry(self.retry, "studied word", || {
            self.store.record_word_studied(learner.id, sample_id, &item.key)
        })
        .await?;
        self.progress
            .record_score(learner.id, Section::Vocabulary, scratch.tier, grade.score, sample_id)
            .await?;
        let upgraded = self.progress.try_upgrade_tier(learner.id).await?;

        scratch.index += 1;

        let mut out = vec![present::grade_feedback(&grade)];
        if upgraded {
            let fresh = self.fresh(learner).await;
            out.push(present::level_up(fresh.tier));
        }

        // The word that completes an interval switches straight to the quiz
        let fresh = self.fresh(learner).await;
        if let Some(quiz) = self.quiz_if_due(&fresh).await? {
            return Ok(quiz.after(out));
        }
        out.extend(self.next_word_or_done(scratch));
        Ok(Step::stay(out))
    }

    pub(super) async fn on_quiz(&self, learner: &Learner, quiz: &mut QuizScratch, choice: Option<Choice>) -> EngineResult<Step> {
        let Some(Choice::QuizAnswer { question, option }) = choice else {
            let mut out = vec![present::choose_an_option()];
            out.extend(present::quiz_question(&quiz.questions, quiz.current));
            return Ok(Step::stay(out));
        };

        let valid = quiz
            .questions
            .get(question)
            .is_some_and(|q| question == quiz.current && option < q.options.len());
        if !valid {
            let mut out = vec![present::already_handled()];
            out.extend(present::quiz_question(&quiz.questions, quiz.current));
            return Ok(Step::stay(out));
        }

        let asked = &quiz.questions[question];
        let correct = option == asked.answer;
        let verdict = if correct {
            Presentation::feedback("✅ Correct!")
        } else {
            Presentation::feedback(format!(
                "❌ Not quite. \"{}\" means: {}",
                asked.word, asked.options[asked.answer]
            ))
        };
        let correct_total = quiz.correct + usize::from(correct);
        let next = question + 1;

        if next < quiz.questions.len() {
            quiz.correct = correct_total;
            quiz.current = next;
            let mut out = vec![verdict];
            out.extend(present::quiz_question(&quiz.questions, next));
            return Ok(Step::stay(out));
        }

        let total = quiz.questions.len();
        let percentage = (correct_total as f64 / total as f64 * 100.0).round() as u8;
        self.progress
            .record_score(learner.id, Section::Assessment, quiz.tier, percentage, quiz.sample_id)
            .await?;
        with_retry(self.retry, "quiz checkpoint", || {
            self.store.set_quiz_checkpoint(learner.id, quiz.batch)
        })
        .await?;

        quiz.correct = correct_total;
        quiz.current = next;
        info!(
            "Learner {} finished a vocabulary quiz: {}/{} ({}%)",
            learner.id, correct_total, total, percentage
        );

        let fresh = self.fresh(learner).await;
        Ok(Step::go(
            Activity::Idle,
            vec![
                verdict,
                Presentation::summary(format!(
                    "📋 Quiz finished: {} of {} correct ({}%).",
                    correct_total, total, percentage
                )),
                present::menu(&fresh),
            ],
        ))
    }
}
