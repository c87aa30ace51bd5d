//! SQLite-backed learning store.

use crate::error::StoreError;
use crate::learning::LearningStore;
use crate::models::{FieldKey, LearnedMapping, MappingAction};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DECAY_PER_DAY: f64 = 0.023;
const FREQUENCY_BOOST: f64 = 0.05;
const MAX_LEARNED_CONFIDENCE: f64 = 0.95;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS learned_mappings (
        schema_hash TEXT NOT NULL,
        field_type TEXT NOT NULL,
        column_index INTEGER NOT NULL,
        column_letter TEXT NOT NULL,
        confidence REAL NOT NULL,
        usage_count INTEGER DEFAULT 1,
        last_used TEXT NOT NULL,
        PRIMARY KEY (schema_hash, field_type)
    );
";

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    /// Open (or create) the database file, creating parent folders as needed.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Forget everything learned; returns the number of rows removed.
    pub fn clear_learned_mappings(&self) -> Result<u64, StoreError> {
        let count = self.conn()?.execute("DELETE FROM learned_mappings", [])?;
        tracing::info!(count, "cleared learned mappings");
        Ok(count as u64)
    }
}

impl LearningStore for Db {
    fn get_learned_mapping(&self, fingerprint: &str, field: FieldKey) -> Result<Option<LearnedMapping>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT column_letter, confidence, last_used, usage_count FROM learned_mappings WHERE schema_hash = ? AND field_type = ?",
                params![fingerprint, field.as_str()],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, f64>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((column_letter, confidence, last_used, usage_count)) = row else {
            return Ok(None);
        };
        let now = Utc::now();
        // unparseable timestamps count as "used today"
        let last = DateTime::parse_from_rfc3339(&last_used)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        let age_days = (now - last).num_days() as f64;
        Ok(Some(LearnedMapping {
            column_letter,
            confidence: adjusted_confidence(confidence, usage_count, age_days),
        }))
    }

    fn upsert_learned_mapping(
        &self,
        fingerprint: &str,
        field: FieldKey,
        column_index: usize,
        column_letter: &str,
        action: MappingAction,
    ) -> Result<(), StoreError> {
        let confidence = stored_confidence(action);
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO learned_mappings (schema_hash, field_type, column_index, column_letter, confidence, usage_count, last_used)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
             ON CONFLICT(schema_hash, field_type) DO UPDATE SET
               column_index = excluded.column_index,
               column_letter = excluded.column_letter,
               confidence = excluded.confidence,
               usage_count = usage_count + 1,
               last_used = excluded.last_used",
            params![fingerprint, field.as_str(), column_index as i64, column_letter, confidence, now],
        )?;
        Ok(())
    }
}

/// Stored confidence decayed by age and boosted by how often it was confirmed.
pub fn adjusted_confidence(confidence: f64, usage_count: i64, age_days: f64) -> f64 {
    let decay = (-DECAY_PER_DAY * age_days.max(0.0)).exp();
    let freq_boost = (usage_count.max(0) as f64 + 1.0).ln() * FREQUENCY_BOOST;
    (confidence * decay + freq_boost).min(MAX_LEARNED_CONFIDENCE)
}

fn stored_confidence(action: MappingAction) -> f64 {
    let (reward, base) = match action {
        MappingAction::Accept => (1.0, 0.85),
        MappingAction::Reject | MappingAction::ManualSelect => (-0.5, 0.70),
        MappingAction::Edit => (-0.2, 0.75),
    };
    (base + reward * 0.1_f64).clamp(0.05, 0.95)
}
