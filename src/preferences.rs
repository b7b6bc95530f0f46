use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::path::PathBuf;
use tracing::debug;

use crate::messenger::ChatId;
use crate::types::Result;

/// Durable storage of each user's favourite category.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user: ChatId) -> Result<Option<String>>;

    /// Records `category` as the user's favourite, replacing any earlier
    /// choice.
    async fn set(&self, user: ChatId, category: &str) -> Result<()>;
}

/// Plain-text preference store, one `<user> <category>` line per user.
///
/// Suited to single-process deployments. Writes go through a sibling
/// temporary file and a rename, so a crash never leaves a half-written
/// store behind.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    async fn load_lines(&self) -> Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, user: ChatId) -> Result<Option<String>> {
        for line in self.load_lines().await? {
            if let Some((id, category)) = line.split_once(' ') {
                if id.parse::<i64>() == Ok(user) {
                    return Ok(Some(category.trim().to_string()));
                }
            }
        }
        Ok(None)
    }

    async fn set(&self, user: ChatId, category: &str) -> Result<()> {
        let mut lines = self.load_lines().await?;

        let entry = format!("{} {}", user, category);
        let mut replaced = false;
        for line in lines.iter_mut() {
            let id = line.split_once(' ').and_then(|(id, _)| id.parse::<i64>().ok());
            if id == Some(user) {
                *line = entry.clone();
                replaced = true;
                break;
            }
        }
        if !replaced {
            lines.push(entry);
        }

        let mut content = lines.join("\n");
        content.push('\n');
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Postgres preference store for deployments sharing state across
/// processes.
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the preferences table when it does not exist yet.
    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                user_identity BIGINT PRIMARY KEY,
                category TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn get(&self, user: ChatId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT category FROM preferences WHERE user_identity = $1")
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("category")))
    }

    async fn set(&self, user: ChatId, category: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (user_identity, category)
            VALUES ($1, $2)
            ON CONFLICT (user_identity) DO UPDATE SET category = EXCLUDED.category
            "#,
        )
        .bind(user)
        .bind(category)
        .execute(&self.pool)
        .await?;

        debug!("Stored category preference {} for user {}", category, user);
        Ok(())
    }
}
