use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::messenger::ChatId;
use crate::types::Result;

/// Whether a journaled failure was mapped to a specific cause or fell
/// through to the catch-all handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Known,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Known => "known",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Append-only activity log of incoming traffic, feedback and failures.
///
/// Journaling failures are surfaced to the caller; the bot decides per
/// flow whether to keep going.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn record_message(
        &self,
        user: ChatId,
        kind: &str,
        content: &str,
        interaction: Option<i64>,
    ) -> Result<()>;

    async fn record_feedback(&self, user: ChatId, comment: &str) -> Result<()>;

    async fn record_error(&self, user: ChatId, kind: ErrorKind, details: &str) -> Result<()>;
}

/// One line of the file journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub time: DateTime<Utc>,
    /// Record family, one of `message`, `feedback` or `error`.
    pub record: String,
    pub user: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction: Option<i64>,
}

/// JSON-lines journal for single-process deployments.
pub struct FileJournal {
    path: PathBuf,
}

impl FileJournal {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl Journal for FileJournal {
    async fn record_message(
        &self,
        user: ChatId,
        kind: &str,
        content: &str,
        interaction: Option<i64>,
    ) -> Result<()> {
        self.append(&JournalEntry {
            time: Utc::now(),
            record: "message".to_string(),
            user,
            kind: Some(kind.to_string()),
            content: content.to_string(),
            interaction,
        })
        .await
    }

    async fn record_feedback(&self, user: ChatId, comment: &str) -> Result<()> {
        self.append(&JournalEntry {
            time: Utc::now(),
            record: "feedback".to_string(),
            user,
            kind: None,
            content: comment.to_string(),
            interaction: None,
        })
        .await
    }

    async fn record_error(&self, user: ChatId, kind: ErrorKind, details: &str) -> Result<()> {
        self.append(&JournalEntry {
            time: Utc::now(),
            record: "error".to_string(),
            user,
            kind: Some(kind.as_str().to_string()),
            content: details.to_string(),
            interaction: None,
        })
        .await
    }
}

/// Postgres journal, one table per record family.
pub struct PgJournal {
    pool: PgPool,
}

impl PgJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the journal tables when they do not exist yet.
    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat (
                message_time TIMESTAMPTZ NOT NULL,
                user_identity BIGINT NOT NULL,
                content_type TEXT NOT NULL,
                content TEXT NOT NULL,
                query_identity BIGINT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedbacks (
                message_time TIMESTAMPTZ NOT NULL,
                user_identity BIGINT NOT NULL,
                comment TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS errors (
                error_time TIMESTAMPTZ NOT NULL,
                user_identity BIGINT NOT NULL,
                error_type TEXT NOT NULL,
                details TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Journal for PgJournal {
    async fn record_message(
        &self,
        user: ChatId,
        kind: &str,
        content: &str,
        interaction: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat (message_time, user_identity, content_type, content, query_identity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Utc::now())
        .bind(user)
        .bind(kind)
        .bind(content)
        .bind(interaction)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_feedback(&self, user: ChatId, comment: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feedbacks (message_time, user_identity, comment)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(Utc::now())
        .bind(user)
        .bind(comment)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_error(&self, user: ChatId, kind: ErrorKind, details: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO errors (error_time, user_identity, error_type, details)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Utc::now())
        .bind(user)
        .bind(kind.as_str())
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
