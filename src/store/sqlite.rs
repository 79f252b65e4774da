//! SQLite-based persistent storage for learners and progress

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::LearningStore;
use crate::types::{Learner, LearnerId, ScoreSample, Section, Tier};

/// SQLite-based learning store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        // WAL so the report command can read while a bot is running
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Store in a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS learners (
                id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL DEFAULT '',
                tier TEXT NOT NULL DEFAULT 'beginner',
                assessment_done INTEGER NOT NULL DEFAULT 0,
                last_active TEXT NOT NULL
            );

            -- Append-only; aggregates are derived from here
            CREATE TABLE IF NOT EXISTS score_samples (
                id TEXT PRIMARY KEY,
                learner_id INTEGER NOT NULL,
                section TEXT NOT NULL,
                tier TEXT NOT NULL,
                raw_score INTEGER NOT NULL,
                increment REAL NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS seen_content (
                learner_id INTEGER NOT NULL,
                section TEXT NOT NULL,
                tier TEXT NOT NULL,
                content_key TEXT NOT NULL,
                seen_at TEXT NOT NULL,
                PRIMARY KEY (learner_id, section, tier, content_key)
            );

            -- One row per graded word, repeats included
            CREATE TABLE IF NOT EXISTS word_studies (
                id TEXT PRIMARY KEY,
                learner_id INTEGER NOT NULL,
                word_key TEXT NOT NULL,
                studied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quiz_checkpoints (
                learner_id INTEGER PRIMARY KEY,
                batches INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_samples_lookup ON score_samples(learner_id, section, tier);
            CREATE INDEX IF NOT EXISTS idx_studies_learner ON word_studies(learner_id);
        "#)?;

        Ok(())
    }

    fn row_to_learner(row: &rusqlite::Row) -> rusqlite::Result<Learner> {
        let tier: String = row.get(2)?;
        let last_active: String = row.get(4)?;
        Ok(Learner {
            id: row.get(0)?,
            display_name: row.get(1)?,
            tier: Tier::parse(&tier).unwrap_or(Tier::Beginner),
            assessment_done: row.get::<_, i64>(3)? != 0,
            last_active: parse_timestamp(&last_active),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait::async_trait]
impl LearningStore for SqliteStore {
    async fn upsert_learner(&self, id: LearnerId, display_name: &str) -> Result<Learner> {
        let conn = self.conn.lock().await;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"INSERT INTO learners (id, display_name, last_active) VALUES (?1, ?2, ?3)
               ON CONFLICT(id) DO UPDATE SET
                   display_name = CASE WHEN ?2 = '' THEN display_name ELSE ?2 END,
                   last_active = ?3"#,
            params![id, display_name, now],
        )?;

        let learner = conn.query_row(
            "SELECT id, display_name, tier, assessment_done, last_active FROM learners WHERE id = ?1",
            params![id],
            Self::row_to_learner,
        )?;
        Ok(learner)
    }

    async fn learner(&self, id: LearnerId) -> Result<Option<Learner>> {
        let conn = self.conn.lock().await;
        let learner = conn
            .query_row(
                "SELECT id, display_name, tier, assessment_done, last_active FROM learners WHERE id = ?1",
                params![id],
                Self::row_to_learner,
            )
            .optional()?;
        Ok(learner)
    }

    async fn upsert_tier(&self, id: LearnerId, tier: Tier) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO learners (id, tier, last_active) VALUES (?1, ?2, ?3)
               ON CONFLICT(id) DO UPDATE SET tier = ?2"#,
            params![id, tier.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn set_assessment_done(&self, id: LearnerId, done: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO learners (id, assessment_done, last_active) VALUES (?1, ?2, ?3)
               ON CONFLICT(id) DO UPDATE SET assessment_done = ?2"#,
            params![id, done as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn append_score(&self, sample: &ScoreSample) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT OR IGNORE INTO score_samples
               (id, learner_id, section, tier, raw_score, increment, recorded_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                sample.id.to_string(),
                sample.learner_id,
                sample.section.as_str(),
                sample.tier.as_str(),
                sample.raw_score as i64,
                sample.increment,
                sample.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn samples(&self, id: LearnerId, section: Section, tier: Tier) -> Result<Vec<ScoreSample>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT id, raw_score, increment, recorded_at FROM score_samples
               WHERE learner_id = ?1 AND section = ?2 AND tier = ?3
               ORDER BY rowid"#,
        )?;

        let rows = stmt.query_map(params![id, section.as_str(), tier.as_str()], |row| {
            let sample_id: String = row.get(0)?;
            let raw: i64 = row.get(1)?;
            let recorded_at: String = row.get(3)?;
            Ok(ScoreSample {
                id: Uuid::parse_str(&sample_id).unwrap_or_else(|_| Uuid::new_v4()),
                learner_id: id,
                section,
                tier,
                raw_score: raw.clamp(0, 100) as u8,
                increment: row.get(2)?,
                recorded_at: parse_timestamp(&recorded_at),
            })
        })?;

        let mut samples = Vec::new();
        for row in rows {
            samples.push(row?);
        }
        Ok(samples)
    }

    async fn mark_content_seen(&self, id: LearnerId, section: Section, tier: Tier, keys: &[String]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare(
                r#"INSERT OR IGNORE INTO seen_content (learner_id, section, tier, content_key, seen_at)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )?;
            for key in keys {
                stmt.execute(params![id, section.as_str(), tier.as_str(), key, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn read_seen_content(&self, id: LearnerId, section: Section, tier: Tier) -> Result<HashSet<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT content_key FROM seen_content WHERE learner_id = ?1 AND section = ?2 AND tier = ?3",
        )?;
        let rows = stmt.query_map(params![id, section.as_str(), tier.as_str()], |row| row.get::<_, String>(0))?;

        let mut keys = HashSet::new();
        for row in rows {
            keys.insert(row?);
        }
        Ok(keys)
    }

    async fn clear_seen(&self, id: LearnerId, section: Section, tier: Tier) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM seen_content WHERE learner_id = ?1 AND section = ?2 AND tier = ?3",
            params![id, section.as_str(), tier.as_str()],
        )?;
        Ok(())
    }

    async fn record_word_studied(&self, id: LearnerId, study_id: Uuid, word_key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO word_studies (id, learner_id, word_key, studied_at) VALUES (?1, ?2, ?3, ?4)",
            params![study_id.to_string(), id, word_key, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn studied_word_count(&self, id: LearnerId) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM word_studies WHERE learner_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn recent_studied_words(&self, id: LearnerId, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"SELECT word_key FROM word_studies
               WHERE learner_id = ?1
               GROUP BY word_key
               ORDER BY MAX(rowid) DESC LIMIT ?2"#,
        )?;
        let rows = stmt.query_map(params![id, limit as i64], |row| row.get::<_, String>(0))?;

        let mut words = Vec::new();
        for row in rows {
            words.push(row?);
        }
        Ok(words)
    }

    async fn quiz_checkpoint(&self, id: LearnerId) -> Result<usize> {
        let conn = self.conn.lock().await;
        let batches: Option<i64> = conn
            .query_row(
                "SELECT batches FROM quiz_checkpoints WHERE learner_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(batches.unwrap_or(0) as usize)
    }

    async fn set_quiz_checkpoint(&self, id: LearnerId, batches: usize) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO quiz_checkpoints (learner_id, batches) VALUES (?1, ?2)
               ON CONFLICT(learner_id) DO UPDATE SET batches = MAX(batches, ?2)"#,
            params![id, batches as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_progress_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.db");

        {
            let store = SqliteStore::new(&path).await.unwrap();
            store.upsert_learner(42, "Ali").await.unwrap();
            store.upsert_tier(42, Tier::Amateur).await.unwrap();
            store.set_assessment_done(42, true).await.unwrap();
            store
                .append_score(&ScoreSample::new(42, Section::Vocabulary, Tier::Amateur, 90, 12.5))
                .await
                .unwrap();
            store
                .mark_content_seen(42, Section::Vocabulary, Tier::Amateur, &["car".into(), "tree".into()])
                .await
                .unwrap();
        }

        let store = SqliteStore::new(&path).await.unwrap();
        let learner = store.learner(42).await.unwrap().unwrap();
        assert_eq!(learner.tier, Tier::Amateur);
        assert!(learner.assessment_done);
        assert_eq!(learner.display_name, "Ali");

        let aggregate = store.read_aggregate(42, Section::Vocabulary, Tier::Amateur).await.unwrap();
        assert_eq!(aggregate, 12.5);

        let seen = store.read_seen_content(42, Section::Vocabulary, Tier::Amateur).await.unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_without_name_keeps_existing_name() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_learner(1, "Mina").await.unwrap();
        let learner = store.upsert_learner(1, "").await.unwrap();
        assert_eq!(learner.display_name, "Mina");
        assert_eq!(learner.tier, Tier::Beginner);
    }

    #[tokio::test]
    async fn test_assessment_aggregate_is_best_score() {
        let store = SqliteStore::in_memory().unwrap();
        for raw in [70, 40] {
            store
                .append_score(&ScoreSample::new(1, Section::Assessment, Tier::Intermediate, raw, 0.0))
                .await
                .unwrap();
        }
        let aggregate = store.read_aggregate(1, Section::Assessment, Tier::Intermediate).await.unwrap();
        assert_eq!(aggregate, 70.0);
    }

    #[tokio::test]
    async fn test_seen_ledger_idempotent_and_clearable() {
        let store = SqliteStore::in_memory().unwrap();
        let keys = vec!["apple".to_string()];
        store.mark_content_seen(1, Section::Vocabulary, Tier::Beginner, &keys).await.unwrap();
        store.mark_content_seen(1, Section::Vocabulary, Tier::Beginner, &keys).await.unwrap();
        assert_eq!(store.read_seen_content(1, Section::Vocabulary, Tier::Beginner).await.unwrap().len(), 1);

        store.clear_seen(1, Section::Vocabulary, Tier::Beginner).await.unwrap();
        assert!(store.read_seen_content(1, Section::Vocabulary, Tier::Beginner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_word_studies_and_quiz_checkpoint() {
        let store = SqliteStore::in_memory().unwrap();
        for word in ["apple", "book", "cat", "book"] {
            store.record_word_studied(3, Uuid::new_v4(), word).await.unwrap();
        }
        let retried = Uuid::new_v4();
        store.record_word_studied(3, retried, "dog").await.unwrap();
        store.record_word_studied(3, retried, "dog").await.unwrap();

        assert_eq!(store.studied_word_count(3).await.unwrap(), 5);
        assert_eq!(store.recent_studied_words(3, 3).await.unwrap(), vec!["dog", "book", "cat"]);

        store.set_quiz_checkpoint(3, 1).await.unwrap();
        store.set_quiz_checkpoint(3, 0).await.unwrap();
        assert_eq!(store.quiz_checkpoint(3).await.unwrap(), 1);
        assert_eq!(store.quiz_checkpoint(4).await.unwrap(), 0);
    }
}
