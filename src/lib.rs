//! Lingua Tutor - Learning Progression Engine
//!
//! An English tutor that:
//! - Places learners into one of four tiers with a multiple-choice test
//! - Serves vocabulary, grammar and conversation practice without repeats
//! - Grades free-text answers through an external LLM grader
//! - Accumulates bounded progress and moves learners up one tier at a time
//!
//! # Example
//!
//! ```ignore
//! use lingua_tutor::{Config, ContentCatalog, LlmGrader, SessionCoordinator, SqliteStore};
//! use lingua_tutor::messaging::LearnerIntent;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = Arc::new(SqliteStore::new(&config.storage.database_path).await?);
//!     let (catalog, _) = ContentCatalog::builtin(store.clone())?;
//!     let grader = LlmGrader::from_config(&config.grader)?;
//!     let coordinator = SessionCoordinator::new(
//!         store,
//!         Arc::new(catalog),
//!         Arc::new(grader),
//!         config.policy.clone(),
//!         Default::default(),
//!     );
//!     for p in coordinator.handle(LearnerIntent::exit(1, "Sara")).await {
//!         println!("{}", p.text);
//!     }
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod catalog;
pub mod progress;
pub mod assessment;
pub mod grader;
pub mod security;

// Interaction
pub mod session;
pub mod messaging;
pub mod cli;

// Re-export commonly used types for convenience
pub use types::{Learner, LearnerId, ScoreSample, Section, Tier};
pub use error::{EngineError, EngineResult};
pub use config::Config;
pub use store::{LearningStore, MemoryStore, RetryPolicy, SqliteStore};
pub use catalog::{ContentCatalog, ContentItem, DedupReport};
pub use progress::{ProgressReport, ProgressTracker};
pub use assessment::{AssessmentFlow, AssessmentRun};
pub use grader::{Grade, Grader, GraderError, LlmGrader, Rubric};
pub use session::{ActivityKind, SessionCoordinator};
pub use messaging::{FrontEnd, LearnerIntent, Presentation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - English tutor", NAME, VERSION)
}
