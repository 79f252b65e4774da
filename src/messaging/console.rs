//! Console front-end for local practice
//!
//! Options are numbered; typing a number presses that button. `/menu`
//! leaves the current activity and `/quit` ends the session.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};

use crate::messaging::{ButtonOption, FrontEnd, IntentKind, LearnerIntent, Presentation, PresentationKind};
use crate::session::keys::{Choice, MenuAction};
use crate::session::SessionCoordinator;
use crate::types::LearnerId;

/// What a typed line means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Intent(IntentKind),
    Quit,
    Empty,
}

/// Interpret a line against the options currently on screen
pub fn interpret(line: &str, options: &[ButtonOption]) -> ConsoleInput {
    let line = line.trim();
    match line {
        "" => return ConsoleInput::Empty,
        "/quit" | "/exit" => return ConsoleInput::Quit,
        "/menu" | "/start" => return ConsoleInput::Intent(IntentKind::ExitMenu),
        "/help" => return ConsoleInput::Intent(IntentKind::ButtonChoice(Choice::Menu(MenuAction::Help).key())),
        "/progress" => {
            return ConsoleInput::Intent(IntentKind::ButtonChoice(Choice::Menu(MenuAction::Progress).key()))
        }
        _ => {}
    }

    if let Ok(n) = line.parse::<usize>() {
        if let Some(option) = n.checked_sub(1).and_then(|i| options.get(i)) {
            return ConsoleInput::Intent(IntentKind::ButtonChoice(option.key.clone()));
        }
    }
    ConsoleInput::Intent(IntentKind::FreeText(line.to_string()))
}

/// Render a presentation as terminal text
pub fn render(presentation: &Presentation) -> String {
    let marker = match presentation.kind {
        PresentationKind::Prompt => "›",
        PresentationKind::Question => "?",
        PresentationKind::Feedback => "•",
        PresentationKind::Summary => "═",
    };
    let mut text = format!("{} {}", marker, presentation.text);
    for (i, option) in presentation.options.iter().flatten().enumerate() {
        text.push_str(&format!("\n   [{}] {}", i + 1, option.label));
    }
    text
}

/// Prints presentations and remembers the last set of options
#[derive(Default)]
pub struct ConsoleFrontEnd {
    options: Mutex<Vec<ButtonOption>>,
}

impl ConsoleFrontEnd {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_options(&self) -> Vec<ButtonOption> {
        self.options.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Read lines until /quit or EOF
    pub async fn run(&self, coordinator: Arc<SessionCoordinator>, learner_id: LearnerId, name: &str) -> Result<()> {
        let mut rl = rustyline::DefaultEditor::new().context("Failed to start line editor")?;
        println!("lingua-tutor console. Type a number to choose, /menu for the menu, /quit to leave.\n");

        let first = coordinator.handle(LearnerIntent::exit(learner_id, name)).await;
        self.deliver(learner_id, &first).await?;

        loop {
            match rl.readline("\x1b[32m❯\x1b[0m ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    let kind = match interpret(&line, &self.current_options()) {
                        ConsoleInput::Empty => continue,
                        ConsoleInput::Quit => break,
                        ConsoleInput::Intent(kind) => kind,
                    };
                    let intent = LearnerIntent {
                        learner_id,
                        display_name: name.to_string(),
                        kind,
                    };
                    let out = coordinator.handle(intent).await;
                    self.deliver(learner_id, &out).await?;
                }
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(rustyline::error::ReadlineError::Eof) => break,
                Err(err) => return Err(err).context("Failed to read input"),
            }
        }

        println!("Goodbye! Keep practicing.");
        Ok(())
    }
}

#[async_trait::async_trait]
impl FrontEnd for ConsoleFrontEnd {
    async fn deliver(&self, _learner_id: LearnerId, presentations: &[Presentation]) -> Result<()> {
        let mut latest = None;
        for presentation in presentations {
            println!("{}\n", render(presentation));
            if let Some(options) = &presentation.options {
                latest = Some(options.clone());
            }
        }
        if let Ok(mut options) = self.options.lock() {
            *options = latest.unwrap_or_default();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
