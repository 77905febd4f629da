use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::core::errors::ApiError;

const SCHEMA_VERSION: i64 = 1;
const DEFAULT_TEMPERATURE: f64 = 0.3;
const MAX_PAGE_LIMIT: i64 = 200;

#[derive(Debug, Clone, Serialize)]
pub struct Bot {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub bot_id: String,
    pub filename: String,
    pub mime_type: String,
    pub status: String,
    pub chunk_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub bot_id: String,
    pub user_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub tokens_used: Option<i64>,
    pub created_at: String,
}

/// One page of messages in ascending creation order, plus the cursor for
/// the next (older) page when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub edges: Vec<StoredMessage>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let connect_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_db().await?;
        Ok(store)
    }

    async fn init_db(&self) -> Result<(), ApiError> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        if version != SCHEMA_VERSION {
            self.rebuild_schema().await?;
        }

        Ok(())
    }

    async fn rebuild_schema(&self) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for table in ["messages", "sessions", "documents", "bots"] {
            let drop = format!("DROP TABLE IF EXISTS {}", table);
            sqlx::query(&drop)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
        }

        sqlx::query(
            "\
            CREATE TABLE bots (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL,
                name TEXT NOT NULL CHECK(length(trim(name)) > 0),
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                temperature REAL NOT NULL DEFAULT 0.3,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "\
            CREATE TABLE documents (
                id TEXT PRIMARY KEY,
                bot_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('pending', 'completed', 'failed')),
                chunk_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (bot_id) REFERENCES bots(id) ON DELETE CASCADE
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "\
            CREATE TABLE sessions (
                id TEXT PRIMARY KEY,
                bot_id TEXT NOT NULL,
                user_id TEXT,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (bot_id) REFERENCES bots(id) ON DELETE CASCADE
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        // seq gives a stable creation order; id stays the public identifier
        // used as the opaque pagination cursor.
        sqlx::query(
            "\
            CREATE TABLE messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK(role IN ('system', 'user', 'assistant')),
                content TEXT NOT NULL,
                tokens_used INTEGER,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX idx_documents_bot_id ON documents(bot_id)")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query("CREATE INDEX idx_sessions_bot_id ON sessions(bot_id)")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query("CREATE INDEX idx_messages_session_id_seq ON messages(session_id, seq)")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        let pragma = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
        sqlx::query(&pragma)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn create_bot(
        &self,
        workspace_id: &str,
        name: &str,
        provider: &str,
        model: &str,
        temperature: Option<f64>,
    ) -> Result<Bot, ApiError> {
        let bot_id = Uuid::new_v4().to_string();
        let temperature = temperature.unwrap_or(DEFAULT_TEMPERATURE);

        sqlx::query(
            "\
            INSERT INTO bots (id, workspace_id, name, provider, model, temperature)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&bot_id)
        .bind(workspace_id)
        .bind(name)
        .bind(provider)
        .bind(model)
        .bind(temperature)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        self.get_bot(&bot_id)
            .await?
            .ok_or_else(|| ApiError::Internal("Bot missing after insert".to_string()))
    }

    pub async fn get_bot(&self, bot_id: &str) -> Result<Option<Bot>, ApiError> {
        let row = sqlx::query(
            "SELECT id, workspace_id, name, provider, model, temperature, created_at
             FROM bots WHERE id = ?1",
        )
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.map(bot_from_row).transpose().map_err(ApiError::internal)
    }

    pub async fn create_document(
        &self,
        bot_id: &str,
        filename: &str,
        mime_type: &str,
    ) -> Result<Document, ApiError> {
        let document_id = Uuid::new_v4().to_string();

        sqlx::query(
            "\
            INSERT INTO documents (id, bot_id, filename, mime_type, status)
            VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&document_id)
        .bind(bot_id)
        .bind(filename)
        .bind(mime_type)
        .bind(DocumentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        self.get_document(&document_id)
            .await?
            .ok_or_else(|| ApiError::Internal("Document missing after insert".to_string()))
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>, ApiError> {
        let row = sqlx::query(
            "SELECT id, bot_id, filename, mime_type, status, chunk_count, created_at, updated_at
             FROM documents WHERE id = ?1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.map(document_from_row)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn list_documents(&self, bot_id: &str) -> Result<Vec<Document>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, bot_id, filename, mime_type, status, chunk_count, created_at, updated_at
             FROM documents WHERE bot_id = ?1 ORDER BY created_at ASC",
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.into_iter()
            .map(document_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)
    }

    pub async fn set_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        chunk_count: i64,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "\
            UPDATE documents
            SET status = ?1, chunk_count = ?2,
                updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?3",
        )
        .bind(status.as_str())
        .bind(chunk_count)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_session(
        &self,
        bot_id: &str,
        user_id: Option<&str>,
    ) -> Result<Session, ApiError> {
        let session_id = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO sessions (id, bot_id, user_id) VALUES (?1, ?2, ?3)")
            .bind(&session_id)
            .bind(bot_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        self.get_session(&session_id)
            .await?
            .ok_or_else(|| ApiError::Internal("Session missing after insert".to_string()))
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, ApiError> {
        let row = sqlx::query(
            "SELECT id, bot_id, user_id, created_at, updated_at FROM sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.map(session_from_row)
            .transpose()
            .map_err(ApiError::internal)
    }

    pub async fn create_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        tokens_used: Option<i64>,
    ) -> Result<StoredMessage, ApiError> {
        let message_id = Uuid::new_v4().to_string();
        let role = normalize_role(role);

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query(
            "\
            INSERT INTO messages (id, session_id, role, content, tokens_used)
            VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&message_id)
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(tokens_used)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "UPDATE sessions SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;

        self.get_message(&message_id)
            .await?
            .ok_or_else(|| ApiError::Internal("Message missing after insert".to_string()))
    }

    pub async fn get_message(&self, message_id: &str) -> Result<Option<StoredMessage>, ApiError> {
        let row = sqlx::query(
            "SELECT id, session_id, role, content, tokens_used, created_at
             FROM messages WHERE id = ?1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.map(message_from_row)
            .transpose()
            .map_err(ApiError::internal)
    }

    /// The most recent `limit` messages, returned in ascending creation
    /// order for prompt construction.
    pub async fn get_messages(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let limit = sanitize_limit(limit);

        let rows = sqlx::query(
            "\
            SELECT id, session_id, role, content, tokens_used, created_at
            FROM (
                SELECT seq, id, session_id, role, content, tokens_used, created_at
                FROM messages
                WHERE session_id = ?1
                ORDER BY seq DESC
                LIMIT ?2
            )
            ORDER BY seq ASC",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.into_iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)
    }

    /// Cursor pagination over message history, newest page first. The
    /// cursor is a message id and is inclusive: the page ends at the cursor
    /// row. `limit + 1` rows are fetched descending; when the extra row
    /// exists it becomes the next cursor and is dropped, then the page is
    /// reversed to ascending order.
    pub async fn get_messages_paginated(
        &self,
        session_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<MessagePage, ApiError> {
        let limit = sanitize_limit(limit);

        let boundary_seq = match cursor {
            Some(cursor_id) => {
                let seq: Option<i64> = sqlx::query_scalar(
                    "SELECT seq FROM messages WHERE id = ?1 AND session_id = ?2",
                )
                .bind(cursor_id)
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

                match seq {
                    Some(seq) => Some(seq),
                    None => {
                        return Ok(MessagePage {
                            edges: Vec::new(),
                            next_cursor: None,
                        })
                    }
                }
            }
            None => None,
        };

        let rows = match boundary_seq {
            Some(seq) => {
                sqlx::query(
                    "\
                    SELECT id, session_id, role, content, tokens_used, created_at
                    FROM messages
                    WHERE session_id = ?1 AND seq <= ?2
                    ORDER BY seq DESC
                    LIMIT ?3",
                )
                .bind(session_id)
                .bind(seq)
                .bind(limit + 1)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "\
                    SELECT id, session_id, role, content, tokens_used, created_at
                    FROM messages
                    WHERE session_id = ?1
                    ORDER BY seq DESC
                    LIMIT ?2",
                )
                .bind(session_id)
                .bind(limit + 1)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(ApiError::internal)?;

        let mut edges = rows
            .into_iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::internal)?;

        let next_cursor = if edges.len() as i64 == limit + 1 {
            edges.pop().map(|extra| extra.id)
        } else {
            None
        };

        edges.reverse();

        Ok(MessagePage { edges, next_cursor })
    }
}

fn bot_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Bot, sqlx::Error> {
    Ok(Bot {
        id: row.try_get("id")?,
        workspace_id: row.try_get("workspace_id")?,
        name: row.try_get("name")?,
        provider: row.try_get("provider")?,
        model: row.try_get("model")?,
        temperature: row.try_get("temperature")?,
        created_at: row.try_get("created_at")?,
    })
}

fn document_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Document, sqlx::Error> {
    Ok(Document {
        id: row.try_get("id")?,
        bot_id: row.try_get("bot_id")?,
        filename: row.try_get("filename")?,
        mime_type: row.try_get("mime_type")?,
        status: row.try_get("status")?,
        chunk_count: row.try_get("chunk_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn session_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        id: row.try_get("id")?,
        bot_id: row.try_get("bot_id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: sqlx::sqlite::SqliteRow) -> Result<StoredMessage, sqlx::Error> {
    Ok(StoredMessage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        tokens_used: row.try_get("tokens_used")?,
        created_at: row.try_get("created_at")?,
    })
}

fn sanitize_limit(limit: i64) -> i64 {
    if limit <= 0 {
        return 1;
    }
    limit.min(MAX_PAGE_LIMIT)
}

fn normalize_role(role: &str) -> &'static str {
    match role {
        "system" => "system",
        "assistant" => "assistant",
        _ => "user",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, ChatStore) {
        let dir = TempDir::new().unwrap();
        let store = ChatStore::new(dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    async fn bot(store: &ChatStore) -> Bot {
        store
            .create_bot("ws-1", "Support Bot", "mock", "llama2", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn bot_temperature_defaults() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;
        assert!((bot.temperature - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn session_round_trip() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;

        let session = store.create_session(&bot.id, Some("user-9")).await.unwrap();
        let fetched = store.get_session(&session.id).await.unwrap().unwrap();

        assert_eq!(fetched.bot_id, bot.id);
        assert_eq!(fetched.user_id.as_deref(), Some("user-9"));
        assert!(store.get_messages(&session.id, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn document_status_transitions() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;

        let doc = store
            .create_document(&bot.id, "faq.md", "text/markdown")
            .await
            .unwrap();
        assert_eq!(doc.status, "pending");
        assert_eq!(doc.chunk_count, 0);

        let updated = store
            .set_document_status(&doc.id, DocumentStatus::Completed, 12)
            .await
            .unwrap();
        assert!(updated);

        let doc = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(doc.status, "completed");
        assert_eq!(doc.chunk_count, 12);
    }

    #[tokio::test]
    async fn recent_messages_come_back_ascending() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;
        let session = store.create_session(&bot.id, None).await.unwrap();

        for i in 1..=5 {
            store
                .create_message(&session.id, "user", &format!("m{}", i), None)
                .await
                .unwrap();
        }

        let recent = store.get_messages(&session.id, 3).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);
    }

    #[tokio::test]
    async fn pagination_walks_pages_backwards() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;
        let session = store.create_session(&bot.id, None).await.unwrap();

        let mut ids = Vec::new();
        for i in 1..=10 {
            let msg = store
                .create_message(&session.id, "user", &format!("M{}", i), None)
                .await
                .unwrap();
            ids.push(msg.id);
        }

        // First page: the three most recent, ascending.
        let page = store
            .get_messages_paginated(&session.id, 3, None)
            .await
            .unwrap();
        let contents: Vec<_> = page.edges.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["M8", "M9", "M10"]);
        assert_eq!(page.next_cursor.as_deref(), Some(ids[6].as_str()));

        // Second page from the cursor (inclusive).
        let page = store
            .get_messages_paginated(&session.id, 3, page.next_cursor.as_deref())
            .await
            .unwrap();
        let contents: Vec<_> = page.edges.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["M5", "M6", "M7"]);
        assert_eq!(page.next_cursor.as_deref(), Some(ids[3].as_str()));
    }

    #[tokio::test]
    async fn oversized_limit_returns_everything_without_cursor() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;
        let session = store.create_session(&bot.id, None).await.unwrap();

        for i in 1..=10 {
            store
                .create_message(&session.id, "user", &format!("M{}", i), None)
                .await
                .unwrap();
        }

        let page = store
            .get_messages_paginated(&session.id, 20, None)
            .await
            .unwrap();
        assert_eq!(page.edges.len(), 10);
        assert_eq!(page.edges[0].content, "M1");
        assert_eq!(page.edges[9].content, "M10");
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn unknown_cursor_yields_empty_page() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;
        let session = store.create_session(&bot.id, None).await.unwrap();

        store
            .create_message(&session.id, "user", "hello", None)
            .await
            .unwrap();

        let page = store
            .get_messages_paginated(&session.id, 3, Some("no-such-id"))
            .await
            .unwrap();
        assert!(page.edges.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn roles_are_normalized_on_insert() {
        let (_dir, store) = store().await;
        let bot = bot(&store).await;
        let session = store.create_session(&bot.id, None).await.unwrap();

        let msg = store
            .create_message(&session.id, "robot", "beep", Some(42))
            .await
            .unwrap();
        assert_eq!(msg.role, "user");
        assert_eq!(msg.tokens_used, Some(42));
    }
}
