//! Configuration management
//!
//! Manages progression policy, grader, storage, catalog and front-end settings.
//! Every policy constant the engine uses is tunable here rather than hard-coded.

use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Progression policy constants
    #[serde(default)]
    pub policy: PolicyConfig,
    /// External grader settings
    #[serde(default)]
    pub grader: GraderConfig,
    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Content catalog source
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Telegram front-end settings
    #[serde(default)]
    pub telegram: TelegramSettings,
}

/// Progression policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Questions in a placement assessment
    #[serde(default = "default_assessment_questions")]
    pub assessment_questions: usize,
    /// Minimum percentage for Advanced
    #[serde(default = "default_advanced_threshold")]
    pub advanced_threshold: f64,
    /// Minimum percentage for Intermediate
    #[serde(default = "default_intermediate_threshold")]
    pub intermediate_threshold: f64,
    /// Minimum percentage for Amateur
    #[serde(default = "default_amateur_threshold")]
    pub amateur_threshold: f64,
    /// Partial-credit floor applied to raw scores (0.0-1.0)
    #[serde(default = "default_floor_multiplier")]
    pub floor_multiplier: f64,
    /// Aggregate every tracked section needs before an upgrade
    #[serde(default = "default_upgrade_threshold")]
    pub upgrade_threshold: f64,
    /// Increment used when a section has no catalog items at a tier
    #[serde(default = "default_min_progress_bump")]
    pub min_progress_bump: f64,
    /// Vocabulary words served per batch
    #[serde(default = "default_vocab_batch_size")]
    pub vocab_batch_size: usize,
    /// Studied words per vocabulary quiz
    #[serde(default = "default_vocab_quiz_interval")]
    pub vocab_quiz_interval: usize,
    /// Exercises per grammar lesson
    #[serde(default = "default_grammar_exercises")]
    pub grammar_exercises: u32,
    /// Learner turns per conversation topic
    #[serde(default = "default_conversation_turns")]
    pub conversation_turns: u32,
    /// Partner replies the grader may add per conversation topic
    #[serde(default = "default_partner_replies")]
    pub conversation_partner_replies: u32,
    /// Similarity ratio above which a vocabulary sentence counts as copied
    #[serde(default = "default_similarity_limit")]
    pub similarity_limit: f64,
}

fn default_assessment_questions() -> usize {
    20
}

fn default_advanced_threshold() -> f64 {
    81.0
}

fn default_intermediate_threshold() -> f64 {
    50.0
}

fn default_amateur_threshold() -> f64 {
    25.0
}

fn default_floor_multiplier() -> f64 {
    0.6
}

fn default_upgrade_threshold() -> f64 {
    80.0
}

fn default_min_progress_bump() -> f64 {
    5.0
}

fn default_vocab_batch_size() -> usize {
    5
}

fn default_vocab_quiz_interval() -> usize {
    20
}

fn default_grammar_exercises() -> u32 {
    2
}

fn default_conversation_turns() -> u32 {
    4
}

fn default_partner_replies() -> u32 {
    3
}

fn default_similarity_limit() -> f64 {
    0.7
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            assessment_questions: default_assessment_questions(),
            advanced_threshold: default_advanced_threshold(),
            intermediate_threshold: default_intermediate_threshold(),
            amateur_threshold: default_amateur_threshold(),
            floor_multiplier: default_floor_multiplier(),
            upgrade_threshold: default_upgrade_threshold(),
            min_progress_bump: default_min_progress_bump(),
            vocab_batch_size: default_vocab_batch_size(),
            vocab_quiz_interval: default_vocab_quiz_interval(),
            grammar_exercises: default_grammar_exercises(),
            conversation_turns: default_conversation_turns(),
            conversation_partner_replies: default_partner_replies(),
            similarity_limit: default_similarity_limit(),
        }
    }
}

impl PolicyConfig {
    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.assessment_questions == 0 {
            anyhow::bail!("policy.assessment_questions must be at least 1");
        }
        if !(self.amateur_threshold <= self.intermediate_threshold
            && self.intermediate_threshold <= self.advanced_threshold)
        {
            anyhow::bail!("policy tier thresholds must be ordered amateur <= intermediate <= advanced");
        }
        if !(0.0..=1.0).contains(&self.floor_multiplier) {
            anyhow::bail!("policy.floor_multiplier must be within 0.0..=1.0");
        }
        if self.min_progress_bump <= 0.0 {
            anyhow::bail!("policy.min_progress_bump must be positive");
        }
        if self.vocab_batch_size == 0 || self.vocab_quiz_interval == 0 {
            anyhow::bail!("policy vocabulary batch and quiz sizes must be at least 1");
        }
        if self.grammar_exercises == 0 || self.conversation_turns == 0 {
            anyhow::bail!("policy exercise and turn counts must be at least 1");
        }
        Ok(())
    }
}

/// Grader settings (API key lives in the keyring or environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraderConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_grader_base_url")]
    pub base_url: String,
    /// Model used for grading
    #[serde(default = "default_grader_model")]
    pub model: String,
    /// Request timeout
    #[serde(default = "default_grader_timeout")]
    pub timeout_secs: u64,
    /// Token limit per grading call
    #[serde(default = "default_grader_max_tokens")]
    pub max_tokens: u32,
    /// Language the grader writes feedback in
    #[serde(default = "default_feedback_language")]
    pub feedback_language: String,
}

fn default_grader_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_grader_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_grader_timeout() -> u64 {
    30
}

fn default_grader_max_tokens() -> u32 {
    512
}

fn default_feedback_language() -> String {
    "English".to_string()
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            base_url: default_grader_base_url(),
            model: default_grader_model(),
            timeout_secs: default_grader_timeout(),
            max_tokens: default_grader_max_tokens(),
            feedback_language: default_feedback_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Attempts for idempotent writes before giving up
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,
    /// Delay between write attempts
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_database_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("progress.db")
}

fn default_write_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            write_attempts: default_write_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog file; the built-in seed content is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token (TELEGRAM_BOT_TOKEN takes precedence)
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Long-poll timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u32,
}

fn default_poll_timeout() -> u32 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        config.policy.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lingua-tutor", "lingua-tutor")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lingua-tutor", "lingua-tutor")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;
    let p = &config.policy;

    println!("Config file: {}", config_path()?.display());
    println!();
    println!("Placement");
    println!("  questions:            {}", p.assessment_questions);
    println!("  thresholds:           advanced >= {}, intermediate >= {}, amateur >= {}",
        p.advanced_threshold, p.intermediate_threshold, p.amateur_threshold);
    println!("Progress");
    println!("  floor multiplier:     {}", p.floor_multiplier);
    println!("  upgrade threshold:    {}", p.upgrade_threshold);
    println!("  minimum bump:         {}", p.min_progress_bump);
    println!("Activities");
    println!("  vocabulary batch:     {}", p.vocab_batch_size);
    println!("  quiz every:           {} words", p.vocab_quiz_interval);
    println!("  grammar exercises:    {}", p.grammar_exercises);
    println!("  conversation turns:   {}", p.conversation_turns);
    println!("Grader");
    println!("  endpoint:             {}", config.grader.base_url);
    println!("  model:                {}", config.grader.model);
    println!("  timeout:              {}s", config.grader.timeout_secs);
    println!("  feedback language:    {}", config.grader.feedback_language);
    println!("Storage");
    println!("  database:             {}", config.storage.database_path.display());
    println!("  write attempts:       {}", config.storage.write_attempts);
    println!("Catalog");
    match &config.catalog.path {
        Some(path) => println!("  source:               {}", path.display()),
        None => println!("  source:               built-in seed content"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.policy.validate().is_ok());
        assert_eq!(config.policy.assessment_questions, 20);
        assert_eq!(config.policy.advanced_threshold, 81.0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [policy]
            floor_multiplier = 0.5
            grammar_exercises = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.floor_multiplier, 0.5);
        assert_eq!(config.policy.grammar_exercises, 5);
        assert_eq!(config.policy.conversation_turns, 4);
        assert_eq!(config.storage.write_attempts, 3);
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let mut policy = PolicyConfig::default();
        policy.amateur_threshold = 60.0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[grader]\nmodel = \"test/model\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.grader.model, "test/model");
    }
}
