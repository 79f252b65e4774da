//! Built-in content shipped with the binary

use anyhow::Result;

use super::{CatalogFile, ContentItem};

const SEED_CATALOG: &str = include_str!("seed.json");
const FALLBACK_QUESTIONS: &str = include_str!("fallback_questions.json");

/// Starter catalog used when no catalog file is configured
pub fn seed_catalog() -> Result<CatalogFile> {
    CatalogFile::from_json(SEED_CATALOG)
}

/// Static placement questions, five per tier
pub fn fallback_questions() -> Result<Vec<ContentItem>> {
    Ok(CatalogFile::from_json(FALLBACK_QUESTIONS)?.into_items())
}
