use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::log_db_operation;
use crate::models::*;
use crate::progress_store::ProgressStore;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to an in-memory database is a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progress_records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS words (
                id TEXT PRIMARY KEY,
                word TEXT NOT NULL,
                meaning TEXT NOT NULL,
                example_sentence TEXT,
                image_url TEXT,
                audio_url TEXT,
                level INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_words_level ON words(level)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS word_status (
                user_id TEXT NOT NULL,
                word_id TEXT NOT NULL,
                times_correct INTEGER NOT NULL DEFAULT 0,
                times_incorrect INTEGER NOT NULL DEFAULT 0,
                last_reviewed TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, word_id),
                FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        log_db_operation!(info, "migrate", "schema ready");
        Ok(())
    }

    // Word operations
    pub async fn create_word(&self, request: CreateWordRequest) -> Result<Word> {
        if self.get_word(&request.id).await?.is_some() {
            return Err(anyhow::anyhow!("Word '{}' already exists", request.id));
        }

        let word = Word {
            id: request.id,
            word: request.word,
            meaning: request.meaning,
            example_sentence: request.example_sentence,
            image_url: request.image_url,
            audio_url: request.audio_url,
            level: request.level,
        };

        sqlx::query(
            r#"
            INSERT INTO words (id, word, meaning, example_sentence, image_url, audio_url, level)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&word.id)
        .bind(&word.word)
        .bind(&word.meaning)
        .bind(&word.example_sentence)
        .bind(&word.image_url)
        .bind(&word.audio_url)
        .bind(word.level as i64)
        .execute(&self.pool)
        .await?;

        Ok(word)
    }

    pub async fn get_word(&self, id: &str) -> Result<Option<Word>> {
        let row = sqlx::query("SELECT * FROM words WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row_to_word(&row)))
    }

    pub async fn get_all_words(&self) -> Result<Vec<Word>> {
        let rows = sqlx::query("SELECT * FROM words ORDER BY level ASC, word ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_word).collect())
    }

    pub async fn get_words_by_level(&self, level: u32) -> Result<Vec<Word>> {
        let rows = sqlx::query("SELECT * FROM words WHERE level = ?1 ORDER BY word ASC")
            .bind(level as i64)
            .fetch_all(&self.pool)
            .await?;

        log_db_operation!(debug, "get_words_by_level", count = rows.len());
        Ok(rows.iter().map(row_to_word).collect())
    }

    pub async fn count_words(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM words")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count") as u64)
    }

    /// Insert the built-in sample words that are not present yet. Returns how
    /// many were inserted.
    pub async fn seed_sample_words(&self) -> Result<usize> {
        let mut inserted = 0;
        for request in sample_words() {
            if self.get_word(&request.id).await?.is_none() {
                self.create_word(request).await?;
                inserted += 1;
            }
        }

        log_db_operation!(debug, "seed_sample_words", count = inserted);
        Ok(inserted)
    }

    // Word status operations
    pub async fn get_word_status(&self, user_id: &str, word_id: &str) -> Result<Option<WordStatus>> {
        let row = sqlx::query("SELECT * FROM word_status WHERE user_id = ?1 AND word_id = ?2")
            .bind(user_id)
            .bind(word_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_word_status(&row)).transpose()
    }

    pub async fn get_word_statuses_for_user(&self, user_id: &str) -> Result<Vec<WordStatus>> {
        let rows = sqlx::query("SELECT * FROM word_status WHERE user_id = ?1 ORDER BY word_id ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_word_status).collect()
    }

    /// Record one quiz's per-word outcome: a correct count for every learned
    /// word and an incorrect count for every word to review.
    pub async fn record_word_results(
        &self,
        user_id: &str,
        learned: &[String],
        to_review: &[String],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let outcomes = learned
            .iter()
            .map(|id| (id, 1_i64, 0_i64))
            .chain(to_review.iter().map(|id| (id, 0_i64, 1_i64)));

        for (word_id, correct, incorrect) in outcomes {
            sqlx::query(
                r#"
                INSERT INTO word_status (user_id, word_id, times_correct, times_incorrect,
                                         last_reviewed, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)
                ON CONFLICT(user_id, word_id) DO UPDATE SET
                    times_correct = times_correct + excluded.times_correct,
                    times_incorrect = times_incorrect + excluded.times_incorrect,
                    last_reviewed = excluded.last_reviewed,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(user_id)
            .bind(word_id)
            .bind(correct)
            .bind(incorrect)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM progress_records WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        log_db_operation!(debug, "get_progress", key = key);
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO progress_records (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        log_db_operation!(debug, "put_progress", key = key);
        Ok(())
    }
}

fn row_to_word(row: &SqliteRow) -> Word {
    Word {
        id: row.get("id"),
        word: row.get("word"),
        meaning: row.get("meaning"),
        example_sentence: row.get("example_sentence"),
        image_url: row.get("image_url"),
        audio_url: row.get("audio_url"),
        level: row.get::<i64, _>("level") as u32,
    }
}

fn row_to_word_status(row: &SqliteRow) -> Result<WordStatus> {
    Ok(WordStatus {
        user_id: row.get("user_id"),
        word_id: row.get("word_id"),
        times_correct: row.get::<i64, _>("times_correct") as u32,
        times_incorrect: row.get::<i64, _>("times_incorrect") as u32,
        last_reviewed: row
            .get::<Option<String>, _>("last_reviewed")
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

/// The starter word bank shipped with the app.
pub fn sample_words() -> Vec<CreateWordRequest> {
    [
        ("apple_n_01", "apple", "사과", "I eat an apple every day."),
        ("book_n_01", "book", "책", "She is reading a book."),
        ("cat_n_01", "cat", "고양이", "The cat is sleeping."),
        ("dog_n_01", "dog", "개", "My dog likes to run."),
        ("elephant_n_01", "elephant", "코끼리", "The elephant is very big."),
        ("flower_n_01", "flower", "꽃", "This flower smells nice."),
        ("guitar_n_01", "guitar", "기타", "He plays the guitar."),
        ("house_n_01", "house", "집", "We live in a small house."),
    ]
    .into_iter()
    .map(|(id, word, meaning, sentence)| CreateWordRequest {
        id: id.to_string(),
        word: word.to_string(),
        meaning: meaning.to_string(),
        example_sentence: Some(sentence.to_string()),
        image_url: Some(format!("/images/{}.jpg", word)),
        audio_url: Some(format!("/audio/{}.mp3", word)),
        level: 1,
    })
    .collect()
}
