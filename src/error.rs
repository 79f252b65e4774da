//! Engine error taxonomy
//!
//! Every variant except `Other` is recoverable and handled at the boundary
//! closest to its cause; `Other` reaches the session coordinator, which
//! resets the learner to Idle.

use thiserror::Error;

use crate::types::{Section, Tier};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no unseen {section} content left at tier {tier}")]
    ContentExhausted { section: Section, tier: Tier },

    #[error("stale intent: {0}")]
    StaleIntent(String),

    #[error("grader unavailable: {0}")]
    GraderUnavailable(String),

    #[error("could not persist {what} after {attempts} attempt(s): {message}")]
    PersistenceWriteFailure {
        what: String,
        attempts: u32,
        message: String,
    },

    #[error("degenerate content configuration: {0}")]
    ConfigurationDegenerate(String),

    #[error("not enough unique assessment questions: needed {needed}, found {found}")]
    InsufficientQuestions { needed: usize, found: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether the learner can simply try again
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Other(_))
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(EngineError::GraderUnavailable("timeout".into()).is_recoverable());
        assert!(EngineError::ContentExhausted {
            section: Section::Grammar,
            tier: Tier::Beginner
        }
        .is_recoverable());
        assert!(!EngineError::Other(anyhow::anyhow!("boom")).is_recoverable());
    }

    #[test]
    fn test_persistence_message() {
        let err = EngineError::PersistenceWriteFailure {
            what: "tier".into(),
            attempts: 3,
            message: "database is locked".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not persist tier after 3 attempt(s): database is locked"
        );
    }
}
