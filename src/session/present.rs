//! Presentation builders

use super::keys::{Choice, MenuAction};
use super::{ActivityKind, QuizQuestion, VocabScratch};
use crate::assessment::AssessmentRun;
use crate::catalog::{ContentItem, Material};
use crate::grader::Grade;
use crate::messaging::{ButtonOption, Presentation};
use crate::types::{Learner, Tier};

fn button(choice: Choice, label: &str) -> ButtonOption {
    ButtonOption::new(choice.key(), label)
}

pub fn back_to_menu() -> ButtonOption {
    button(Choice::Menu(MenuAction::Main), "🔙 Back to menu")
}

/// Main menu; practice entries only once placement is done
pub fn menu(learner: &Learner) -> Presentation {
    if !learner.assessment_done {
        let greeting = if learner.display_name.is_empty() {
            "Welcome!".to_string()
        } else {
            format!("Welcome, {}!", learner.display_name)
        };
        return Presentation::prompt(format!(
            "{} Let's find your level first with a short placement test.",
            greeting
        ))
        .with_options(vec![
            button(Choice::Menu(MenuAction::Assess), "🧪 Start placement test"),
            button(Choice::Menu(MenuAction::Help), "❓ Help"),
        ]);
    }

    Presentation::prompt(format!("Main menu (level: {}). What would you like to practice?", learner.tier))
        .with_options(vec![
            button(Choice::Menu(MenuAction::Vocabulary), "📚 Vocabulary"),
            button(Choice::Menu(MenuAction::Grammar), "📝 Grammar"),
            button(Choice::Menu(MenuAction::Conversation), "🗣️ Conversation"),
            button(Choice::Menu(MenuAction::Progress), "📊 My progress"),
            button(Choice::Menu(MenuAction::Reassess), "🧪 Retake placement test"),
            button(Choice::Menu(MenuAction::Help), "❓ Help"),
        ])
}

pub fn help() -> Presentation {
    Presentation::summary(
        "How it works:\n\
         🧪 Placement test: multiple-choice questions that set your starting level.\n\
         📚 Vocabulary: learn new words and use each one in your own sentence. \
         Every few words you get a short quiz.\n\
         📝 Grammar: read a lesson, then write sentences that use the rule.\n\
         🗣️ Conversation: chat in English about a topic.\n\
         📊 My progress: see how close you are to the next level.\n\n\
         Reach the target score in vocabulary, grammar and conversation to move up a level. \
         Send /menu at any time to go back to the menu.",
    )
}

pub fn apology(learner: &Learner) -> Vec<Presentation> {
    vec![
        Presentation::feedback("Sorry, something went wrong on our side. Let's start again from the menu."),
        menu(learner),
    ]
}

pub fn assessment_question(run: &AssessmentRun) -> Option<Presentation> {
    let question = run.current_question()?;
    let options = question
        .options
        .iter()
        .enumerate()
        .map(|(i, text)| {
            button(
                Choice::AssessAnswer {
                    question: run.current,
                    option: i,
                },
                text,
            )
        })
        .collect();

    Some(
        Presentation::question(format!(
            "Question {} of {}:\n{}",
            run.current + 1,
            run.total(),
            question.text
        ))
        .with_options(options),
    )
}

pub fn assessment_result(run: &AssessmentRun, tier: Tier) -> Presentation {
    Presentation::summary(format!(
        "🎯 Placement test finished!\nCorrect answers: {} of {} ({:.0}%)\nYour level: {}",
        run.correct,
        run.total(),
        run.percentage(),
        tier
    ))
}

pub fn assessment_save_failed() -> Presentation {
    Presentation::feedback(
        "Your test is finished, but the result could not be saved. Please try saving again.",
    )
    .with_options(vec![
        button(Choice::AssessSave, "💾 Save result"),
        back_to_menu(),
    ])
}

pub fn vocab_word(scratch: &VocabScratch) -> Option<Presentation> {
    let item = scratch.words.get(scratch.index)?;
    let (definition, example) = match &item.material {
        Material::Word { definition, example } => (definition.as_str(), example.as_str()),
        _ => ("", ""),
    };

    let mut text = format!(
        "📚 Word {} of {}: {}\nMeaning: {}",
        scratch.index + 1,
        scratch.words.len(),
        item.title,
        definition
    );
    if !example.is_empty() {
        text.push_str(&format!("\nExample: {}", example));
    }
    text.push_str("\n\nWrite your own sentence using this word.");

    Some(Presentation::question(text).with_options(vec![
        button(Choice::VocabSkip(scratch.index), "⏭️ Skip"),
        back_to_menu(),
    ]))
}

pub fn vocab_batch_done() -> Presentation {
    Presentation::summary("Nice work! You finished this set of words.").with_options(vec![
        button(Choice::VocabMore, "📚 More words"),
        back_to_menu(),
    ])
}

pub fn quiz_question(questions: &[QuizQuestion], current: usize) -> Option<Presentation> {
    let question = questions.get(current)?;
    let options = question
        .options
        .iter()
        .enumerate()
        .map(|(i, text)| button(Choice::QuizAnswer { question: current, option: i }, text))
        .collect();

    Some(
        Presentation::question(format!(
            "Quiz {} of {}: what does \"{}\" mean?",
            current + 1,
            questions.len(),
            question.word
        ))
        .with_options(options),
    )
}

pub fn grammar_lesson(lesson: &ContentItem, tier: Tier, exercises: u32) -> Presentation {
    let content = match &lesson.material {
        Material::Lesson { content } => content.as_str(),
        _ => "",
    };
    Presentation::prompt(format!(
        "📝 Grammar lesson: {} ({})\n\n{}\n\nNow write {} sentences that use this rule.\nExercise 1 of {}: write your first sentence.",
        lesson.title, tier, content, exercises, exercises
    ))
}

pub fn grammar_all_complete(tier: Tier) -> Presentation {
    Presentation::summary(format!(
        "✅ You have completed all {} grammar lessons. You can review them again from the beginning.",
        tier
    ))
    .with_options(vec![
        button(Choice::GrammarReview, "🔁 Review lessons again"),
        back_to_menu(),
    ])
}

pub fn conversation_topic(topic: &ContentItem, tier: Tier, turns: u32) -> Presentation {
    let (description, starter) = match &topic.material {
        Material::Topic { description, starter } => (description.as_str(), starter.as_str()),
        _ => ("", ""),
    };
    let mut text = format!(
        "🗣️ Conversation topic ({}): {}\n💡 {}\n\nReply in English. We'll talk for {} turns.",
        tier, topic.title, description, turns
    );
    if !starter.is_empty() {
        text.push_str(&format!("\n💬 You could start with: {}", starter));
    }
    Presentation::prompt(text)
}

pub fn level_up(tier: Tier) -> Presentation {
    Presentation::summary(format!("🎉 Congratulations! You moved up to the {} level.", tier))
}

pub fn choose_an_option() -> Presentation {
    Presentation::prompt("Please choose one of the options above.")
}

pub fn already_handled() -> Presentation {
    Presentation::feedback("That one was already handled.")
}

pub fn grade_feedback(grade: &Grade) -> Presentation {
    Presentation::feedback(format!("Score: {}/100\n{}", grade.score, grade.feedback))
}

pub fn busy(activity: ActivityKind) -> Presentation {
    Presentation::prompt(format!(
        "You are in the middle of {}. Finish it first, or go back to the menu to stop.",
        activity
    ))
    .with_options(vec![back_to_menu()])
}
