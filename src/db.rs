//! Transcript persistence
//!
//! Stores conversations in SQLite. Saving is append-only: only turns past
//! the stored sequence are written. After every save the oldest
//! conversations beyond the retention limit are deleted.

mod schema;

pub use schema::*;

use crate::conversation::{Conversation, ConversationTurn};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Corrupt turn {seq} in conversation {conversation_id}: {source}")]
    CorruptTurn {
        conversation_id: String,
        seq: i64,
        source: serde_json::Error,
    },
    #[error("Failed to encode turn: {0}")]
    Encode(serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Default number of conversations kept
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// Conversations kept after each save; 0 keeps everything
    max_history: usize,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_history: DEFAULT_MAX_HISTORY,
        })
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Conversation Operations ====================

    /// Store turns not yet persisted, then apply retention
    pub fn save_conversation(&self, conversation: &Conversation) -> DbResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        tx.execute(
            "INSERT INTO conversations (id, started_at, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
            params![
                conversation.id,
                format_datetime(&conversation.started_at),
                now
            ],
        )?;

        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM turns WHERE conversation_id = ?1",
            params![conversation.id],
            |row| row.get(0),
        )?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO turns (conversation_id, seq, role, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (seq, turn) in (0_i64..).zip(&conversation.turns).skip_while(|(seq, _)| *seq < stored) {
                let payload = serde_json::to_string(turn).map_err(DbError::Encode)?;
                stmt.execute(params![conversation.id, seq, turn.role(), payload, now])?;
                inserted += 1;
            }
        }

        let trimmed = if self.max_history > 0 {
            let keep = i64::try_from(self.max_history).unwrap_or(i64::MAX);
            tx.execute(
                "DELETE FROM conversations WHERE id NOT IN (
                     SELECT id FROM conversations ORDER BY started_at DESC, rowid DESC LIMIT ?1
                 )",
                params![keep],
            )?
        } else {
            0
        };

        tx.commit()?;

        tracing::debug!(conv_id = %conversation.id, inserted, trimmed, "Conversation saved");
        if trimmed > 0 {
            tracing::info!(trimmed, max_history = self.max_history, "Trimmed old conversations");
        }
        Ok(())
    }

    /// Load a conversation with all of its turns
    pub fn load_conversation(&self, id: &str) -> DbResult<Conversation> {
        let conn = self.lock();
        let started_at: String = conn
            .query_row(
                "SELECT started_at FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::ConversationNotFound(id.to_string()),
                other => DbError::Sqlite(other),
            })?;

        let mut stmt =
            conn.prepare("SELECT seq, payload FROM turns WHERE conversation_id = ?1 ORDER BY seq")?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let turns = rows
            .into_iter()
            .map(|(seq, payload)| {
                serde_json::from_str::<ConversationTurn>(&payload).map_err(|source| {
                    DbError::CorruptTurn {
                        conversation_id: id.to_string(),
                        seq,
                        source,
                    }
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Conversation {
            id: id.to_string(),
            started_at: parse_datetime(&started_at),
            turns,
        })
    }

    /// Stored conversations, newest first
    pub fn list_conversations(&self) -> DbResult<Vec<ConversationSummary>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.started_at, c.updated_at, COUNT(t.seq)
             FROM conversations c LEFT JOIN turns t ON t.conversation_id = c.id
             GROUP BY c.id
             ORDER BY c.started_at DESC, c.rowid DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ConversationSummary {
                id: row.get(0)?,
                started_at: parse_datetime(&row.get::<_, String>(1)?),
                updated_at: parse_datetime(&row.get::<_, String>(2)?),
                turn_count: usize::try_from(row.get::<_, i64>(3)?).unwrap_or_default(),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCallRequest;

    fn sample() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::user("What's my balance?"));
        conversation.push(ConversationTurn::assistant_with_calls(
            "",
            vec![ToolCallRequest::new("c1", "get_account_balance", "{}")],
        ));
        conversation.push(ConversationTurn::tool_result("c1", "{\"total\": 1}"));
        conversation.push(ConversationTurn::assistant("You have $1."));
        conversation
    }

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let conversation = sample();
        db.save_conversation(&conversation).unwrap();

        let loaded = db.load_conversation(&conversation.id).unwrap();
        assert_eq!(loaded, conversation);
    }

    #[test]
    fn test_save_is_append_only() {
        let db = Database::open_in_memory().unwrap();
        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::user("hi"));
        db.save_conversation(&conversation).unwrap();
        db.save_conversation(&conversation).unwrap();

        conversation.push(ConversationTurn::assistant("hello"));
        db.save_conversation(&conversation).unwrap();

        let summaries = db.list_conversations().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].turn_count, 2);
        assert_eq!(db.load_conversation(&conversation.id).unwrap(), conversation);
    }

    #[test]
    fn test_missing_conversation() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.load_conversation("nope"),
            Err(DbError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_retention_drops_oldest() {
        let db = Database::open_in_memory().unwrap().with_max_history(2);
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut conversation = Conversation::new();
            conversation.push(ConversationTurn::user(format!("message {i}")));
            db.save_conversation(&conversation).unwrap();
            ids.push(conversation.id);
        }

        let kept: Vec<String> = db
            .list_conversations()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(kept, vec![ids[2].clone(), ids[1].clone()]);
        assert!(db.load_conversation(&ids[0]).is_err());

        // Turns of the dropped conversation went with it
        let orphans: i64 = db
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM turns WHERE conversation_id = ?1",
                params![ids[0]],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_zero_history_keeps_everything() {
        let db = Database::open_in_memory().unwrap().with_max_history(0);
        for _ in 0..3 {
            let mut conversation = Conversation::new();
            conversation.push(ConversationTurn::user("hi"));
            db.save_conversation(&conversation).unwrap();
        }
        assert_eq!(db.list_conversations().unwrap().len(), 3);
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let conversation = sample();
        {
            let db = Database::open(&path).unwrap();
            db.save_conversation(&conversation).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.load_conversation(&conversation.id).unwrap(), conversation);
    }
}
