//! SQLite-backed storage.
//!
//! Provides persistent storage for:
//! - Key-value lifecycle state (break mode, hyperfocus)
//! - Pending reminder triggers, so they survive restarts
//! - The nag log

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use super::kv::KvStore;
use crate::error::{CoreError, DatabaseError, Result};
use crate::events::{Event, LogKind};
use crate::trigger::{
    EntityId, ReminderTrigger, ScheduleRequest, TriggerHandle, TriggerKind, TriggerPayload,
    TriggerStore,
};

/// One persisted nag log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub at: DateTime<Utc>,
    pub kind: LogKind,
    pub text: String,
    pub entity_title: Option<String>,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database in the data directory (`remindloop.db`).
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("remindloop.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS triggers (
                handle      TEXT PRIMARY KEY,
                entity_id   TEXT NOT NULL,
                kind        TEXT NOT NULL,
                title       TEXT NOT NULL DEFAULT '',
                fire_at_us  INTEGER NOT NULL,
                payload     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS nag_log (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                at            TEXT NOT NULL,
                kind          TEXT NOT NULL,
                text          TEXT NOT NULL,
                entity_title  TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_triggers_entity ON triggers(entity_id);
            CREATE INDEX IF NOT EXISTS idx_triggers_fire_at ON triggers(fire_at_us);
            CREATE INDEX IF NOT EXISTS idx_triggers_kind ON triggers(kind);",
        )?;
        Ok(())
    }

    // ── kv ───────────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_remove(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── triggers ─────────────────────────────────────────────────────

    pub fn insert_trigger(&self, trigger: &ReminderTrigger) -> Result<()> {
        let payload = serde_json::to_string(&trigger.payload)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO triggers (handle, entity_id, kind, title, fire_at_us, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trigger.handle.to_string(),
                trigger.entity_id.as_str(),
                trigger.kind().as_str(),
                trigger.title,
                trigger.fire_at.timestamp_micros(),
                payload,
            ],
        )?;
        Ok(())
    }

    fn query_triggers(&self, where_clause: &str, param: Option<&dyn rusqlite::ToSql>) -> Result<Vec<ReminderTrigger>> {
        let sql = format!(
            "SELECT handle, entity_id, title, fire_at_us, payload FROM triggers {where_clause} ORDER BY fire_at_us, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = param.into_iter().collect();
        let rows = stmt.query_map(params.as_slice(), RawTriggerRow::from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    // ── nag log ──────────────────────────────────────────────────────

    /// Persist a log event. Other event kinds are ignored; returns whether
    /// anything was written.
    pub fn append_log(&self, event: &Event) -> Result<bool> {
        let Event::LogEvent {
            kind,
            text,
            entity_title,
            at,
        } = event
        else {
            return Ok(false);
        };
        let kind = match kind {
            LogKind::Nag => "nag",
            LogKind::Conversation => "conversation",
        };
        self.conn.execute(
            "INSERT INTO nag_log (at, kind, text, entity_title) VALUES (?1, ?2, ?3, ?4)",
            params![at.to_rfc3339(), kind, text, entity_title],
        )?;
        Ok(true)
    }

    /// Most recent log lines, newest first.
    pub fn recent_log(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, at, kind, text, entity_title FROM nag_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, at, kind, text, entity_title) = row?;
            let at = DateTime::parse_from_rfc3339(&at)
                .map_err(|e| corrupt("nag_log", e))?
                .with_timezone(&Utc);
            let kind = if kind == "nag" { LogKind::Nag } else { LogKind::Conversation };
            out.push(LogRecord {
                id,
                at,
                kind,
                text,
                entity_title,
            });
        }
        Ok(out)
    }
}

struct RawTriggerRow {
    handle: String,
    entity_id: String,
    title: String,
    fire_at_us: i64,
    payload: String,
}

impl RawTriggerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            handle: row.get(0)?,
            entity_id: row.get(1)?,
            title: row.get(2)?,
            fire_at_us: row.get(3)?,
            payload: row.get(4)?,
        })
    }

    fn decode(self) -> Result<ReminderTrigger> {
        let handle = Uuid::parse_str(&self.handle).map_err(|e| corrupt("triggers", e))?;
        let fire_at = DateTime::from_timestamp_micros(self.fire_at_us)
            .ok_or_else(|| corrupt("triggers", format!("fire_at out of range: {}", self.fire_at_us)))?;
        let payload: TriggerPayload =
            serde_json::from_str(&self.payload).map_err(|e| corrupt("triggers", e))?;
        Ok(ReminderTrigger {
            handle: TriggerHandle::from(handle),
            entity_id: EntityId::new(self.entity_id),
            title: self.title,
            fire_at,
            payload,
        })
    }
}

fn corrupt(table: &str, err: impl std::fmt::Display) -> CoreError {
    DatabaseError::CorruptRow {
        table: table.to_string(),
        message: err.to_string(),
    }
    .into()
}

impl KvStore for Database {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(Database::kv_get(self, key)?)
    }

    fn kv_set(&mut self, key: &str, value: &str) -> Result<()> {
        Ok(Database::kv_set(self, key, value)?)
    }

    fn kv_remove(&mut self, key: &str) -> Result<()> {
        Ok(Database::kv_remove(self, key)?)
    }
}

impl TriggerStore for Database {
    fn schedule(&mut self, request: ScheduleRequest, now: DateTime<Utc>) -> Result<TriggerHandle> {
        let trigger = request.into_trigger(now)?;
        self.insert_trigger(&trigger)?;
        Ok(trigger.handle)
    }

    fn cancel_all(&mut self, entity_id: &EntityId) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM triggers WHERE entity_id = ?1", params![entity_id.as_str()])?;
        Ok(removed)
    }

    fn pending(&self, entity_id: &EntityId) -> Result<Vec<ReminderTrigger>> {
        let id = entity_id.as_str();
        self.query_triggers("WHERE entity_id = ?1", Some(&id))
    }

    fn pending_of_kind(&self, kind: TriggerKind) -> Result<Vec<ReminderTrigger>> {
        let kind = kind.as_str();
        self.query_triggers("WHERE kind = ?1", Some(&kind))
    }

    fn all_pending(&self) -> Result<Vec<ReminderTrigger>> {
        self.query_triggers("", None)
    }

    fn take_due(&mut self, now: DateTime<Utc>) -> Result<Vec<ReminderTrigger>> {
        let cutoff = now.timestamp_micros();
        let tx = self.conn.transaction()?;
        let due = {
            let mut stmt = tx.prepare(
                "SELECT handle, entity_id, title, fire_at_us, payload FROM triggers
                 WHERE fire_at_us <= ?1 ORDER BY fire_at_us, rowid",
            )?;
            let rows = stmt.query_map(params![cutoff], RawTriggerRow::from_row)?;
            let mut due = Vec::new();
            for row in rows {
                due.push(row?.decode()?);
            }
            due
        };
        tx.execute("DELETE FROM triggers WHERE fire_at_us <= ?1", params![cutoff])?;
        tx.commit()?;
        Ok(due)
    }
}
