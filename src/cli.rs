//! CLI interface for lingua-tutor

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::catalog::{deduplicate, seed, CatalogFile, ContentCatalog};
use crate::config::Config;
use crate::grader::LlmGrader;
use crate::messaging::console::ConsoleFrontEnd;
use crate::messaging::telegram::{TelegramBot, TelegramConfig};
use crate::progress::ProgressTracker;
use crate::session::SessionCoordinator;
use crate::store::{LearningStore, RetryPolicy, SqliteStore};
use crate::types::{LearnerId, Section, Tier};

#[derive(Parser)]
#[command(name = "lingua-tutor")]
#[command(about = "English tutor that places learners by level and tracks their progress", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "LINGUA_TUTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot (long polling)
    Telegram,
    /// Practice in the terminal (default when no command given)
    Chat {
        /// Learner id for the local session
        #[arg(short, long, default_value = "1")]
        learner: LearnerId,
        /// Name shown in greetings
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// Inspect content catalogs
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Show a learner's progress report
    Progress {
        learner_id: LearnerId,
    },
    /// Manage configuration and credentials
    Config {
        /// Store the grader API key in the keyring
        #[arg(long)]
        set_api_key: Option<String>,
        /// Store the Telegram bot token in the keyring
        #[arg(long)]
        set_telegram_token: Option<String>,
        /// Display current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Report duplicate items and per-tier counts
    Check {
        /// Catalog JSON file (defaults to the configured catalog or the built-in seed)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        None => run_console(&config, 1, "").await,
        Some(Commands::Chat { learner, name }) => run_console(&config, learner, &name).await,
        Some(Commands::Telegram) => {
            let bot = TelegramBot::new(TelegramConfig::from_settings(&config.telegram)?)?;
            let coordinator = build_coordinator(&config).await?;
            bot.run(coordinator).await
        }
        Some(Commands::Catalog { command: CatalogCommands::Check { path } }) => {
            let path = path.or_else(|| config.catalog.path.clone());
            check_catalog(path.as_deref())
        }
        Some(Commands::Progress { learner_id }) => show_progress(&config, learner_id).await,
        Some(Commands::Config { set_api_key, set_telegram_token, show }) => {
            if let Some(key) = set_api_key {
                crate::security::set_api_key(&key)?;
                println!("Grader API key stored securely in keyring.");
            } else if let Some(token) = set_telegram_token {
                crate::security::set_telegram_token(&token)?;
                println!("Telegram bot token stored securely in keyring.");
            } else if show {
                crate::config::show_config()?;
            } else {
                println!("Configuration options:");
                println!("  --set-api-key <key>          Set the grader API key");
                println!("  --set-telegram-token <token> Set the Telegram bot token");
                println!("  --show                       Display current configuration");
            }
            Ok(())
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn LearningStore>> {
    let store = SqliteStore::new(&config.storage.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.storage.database_path.display()))?;
    Ok(Arc::new(store))
}

fn open_catalog(config: &Config, store: Arc<dyn LearningStore>) -> Result<Arc<ContentCatalog>> {
    let (catalog, _report) = ContentCatalog::load(config.catalog.path.as_deref(), store)?;
    Ok(Arc::new(catalog))
}

/// Wire store, catalog and grader into a coordinator
async fn build_coordinator(config: &Config) -> Result<Arc<SessionCoordinator>> {
    let store = open_store(config).await?;
    let catalog = open_catalog(config, store.clone())?;
    let grader = LlmGrader::from_config(&config.grader)
        .context("Grader not configured. Set LINGUA_GRADER_API_KEY or run: lingua-tutor config --set-api-key <key>")?;

    info!("Using grader model {}", config.grader.model);
    Ok(Arc::new(SessionCoordinator::new(
        store,
        catalog,
        Arc::new(grader),
        config.policy.clone(),
        RetryPolicy::from_config(&config.storage),
    )))
}

async fn run_console(config: &Config, learner_id: LearnerId, name: &str) -> Result<()> {
    let coordinator = build_coordinator(config).await?;
    ConsoleFrontEnd::new().run(coordinator, learner_id, name).await
}

async fn show_progress(config: &Config, learner_id: LearnerId) -> Result<()> {
    let store = open_store(config).await?;
    if store.learner(learner_id).await?.is_none() {
        println!("No learner with id {}.", learner_id);
        return Ok(());
    }
    let catalog = open_catalog(config, store.clone())?;
    let tracker = ProgressTracker::new(
        store,
        catalog,
        config.policy.clone(),
        RetryPolicy::from_config(&config.storage),
    );
    println!("{}", tracker.report(learner_id).await?);
    Ok(())
}

fn check_catalog(path: Option<&Path>) -> Result<()> {
    let file = match path {
        Some(path) => {
            println!("Checking {}", path.display());
            CatalogFile::read(path)?
        }
        None => {
            println!("Checking built-in seed content");
            seed::seed_catalog()?
        }
    };

    let (items, report) = deduplicate(file.into_items());
    println!("{}", report);

    println!();
    println!("{:<13} {:>9} {:>9} {:>13} {:>9}", "", "Beginner", "Amateur", "Intermediate", "Advanced");
    for section in Section::ALL {
        let counts: Vec<usize> = Tier::ALL
            .iter()
            .map(|tier| items.iter().filter(|i| i.section() == section && i.tier == *tier).count())
            .collect();
        println!(
            "{:<13} {:>9} {:>9} {:>13} {:>9}",
            section.as_str(), counts[0], counts[1], counts[2], counts[3]
        );
    }
    Ok(())
}
