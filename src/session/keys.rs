//! Button keys exchanged with front-ends

/// Menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Main,
    Assess,
    Reassess,
    Vocabulary,
    Grammar,
    Conversation,
    Progress,
    Help,
}

impl MenuAction {
    fn as_str(&self) -> &'static str {
        match self {
            MenuAction::Main => "main",
            MenuAction::Assess => "assess",
            MenuAction::Reassess => "reassess",
            MenuAction::Vocabulary => "vocab",
            MenuAction::Grammar => "grammar",
            MenuAction::Conversation => "conversation",
            MenuAction::Progress => "progress",
            MenuAction::Help => "help",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "main" => Some(MenuAction::Main),
            "assess" => Some(MenuAction::Assess),
            "reassess" => Some(MenuAction::Reassess),
            "vocab" => Some(MenuAction::Vocabulary),
            "grammar" => Some(MenuAction::Grammar),
            "conversation" => Some(MenuAction::Conversation),
            "progress" => Some(MenuAction::Progress),
            "help" => Some(MenuAction::Help),
            _ => None,
        }
    }
}

/// A parsed button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Menu(MenuAction),
    AssessAnswer { question: usize, option: usize },
    AssessSave,
    QuizAnswer { question: usize, option: usize },
    VocabSkip(usize),
    VocabMore,
    GrammarReview,
}

impl Choice {
    pub fn parse(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.trim().split(':').collect();
        match parts.as_slice() {
            ["menu", action] => MenuAction::parse(action).map(Choice::Menu),
            ["assess", "save"] => Some(Choice::AssessSave),
            ["assess", q, o] => Some(Choice::AssessAnswer {
                question: q.parse().ok()?,
                option: o.parse().ok()?,
            }),
            ["quiz", q, o] => Some(Choice::QuizAnswer {
                question: q.parse().ok()?,
                option: o.parse().ok()?,
            }),
            ["vocab", "skip", idx] => Some(Choice::VocabSkip(idx.parse().ok()?)),
            ["vocab", "more"] => Some(Choice::VocabMore),
            ["grammar", "review"] => Some(Choice::GrammarReview),
            _ => None,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Choice::Menu(action) => format!("menu:{}", action.as_str()),
            Choice::AssessAnswer { question, option } => format!("assess:{}:{}", question, option),
            Choice::AssessSave => "assess:save".to_string(),
            Choice::QuizAnswer { question, option } => format!("quiz:{}:{}", question, option),
            Choice::VocabSkip(idx) => format!("vocab:skip:{}", idx),
            Choice::VocabMore => "vocab:more".to_string(),
            Choice::GrammarReview => "grammar:review".to_string(),
        }
    }
}
