//! Timer persistence

use std::{path::Path, sync::Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::{
    error::StoreError,
    state::{Timer, Tone},
};

/// Row store keyed by timer id
pub trait TimerStore: Send + Sync {
    fn get(&self, id: i64) -> Result<Option<Timer>, StoreError>;

    /// Every timer, ordered by id
    fn get_all(&self) -> Result<Vec<Timer>, StoreError>;

    /// Insert an unsaved timer (assigning its id) or update an existing row
    fn save(&self, timer: &mut Timer) -> Result<i64, StoreError>;

    /// Returns whether a row was deleted
    fn remove(&self, id: i64) -> Result<bool, StoreError>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS timers (
    _id        INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    enabled    INTEGER NOT NULL,
    next       INTEGER NOT NULL,
    interval   INTEGER NOT NULL,
    dayTone    TEXT,
    dayLED     INTEGER NOT NULL,
    dayWait    INTEGER NOT NULL,
    nightTone  TEXT,
    nightLED   INTEGER NOT NULL,
    nightWait  INTEGER NOT NULL,
    nightStart INTEGER NOT NULL,
    nightStop  INTEGER NOT NULL,
    nightNext  INTEGER NOT NULL,
    seen       INTEGER NOT NULL DEFAULT 0
)";

const COLUMNS: &str = "_id, name, enabled, next, interval, dayTone, dayLED, dayWait, \
     nightTone, nightLED, nightWait, nightStart, nightStop, nightNext, seen";

/// SQLite-backed store; the single connection serializes all writers
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

fn row_to_timer(row: &Row<'_>) -> rusqlite::Result<Timer> {
    Ok(Timer {
        id: row.get(0)?,
        name: row.get(1)?,
        enabled: row.get(2)?,
        next_fire_at: row.get(3)?,
        interval_secs: row.get(4)?,
        day_tone: row.get::<_, Option<String>>(5)?.map(Tone::from),
        day_led: row.get(6)?,
        day_wait: row.get(7)?,
        night_tone: row.get::<_, Option<String>>(8)?.map(Tone::from),
        night_led: row.get(9)?,
        night_wait: row.get(10)?,
        night_start: row.get(11)?,
        night_stop: row.get(12)?,
        night_next: row.get(13)?,
        seen: row.get(14)?,
    })
}

impl TimerStore for SqliteStore {
    fn get(&self, id: i64) -> Result<Option<Timer>, StoreError> {
        let conn = self.lock()?;
        let timer = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM timers WHERE _id = ?1"),
                params![id],
                row_to_timer,
            )
            .optional()?;
        Ok(timer)
    }

    fn get_all(&self) -> Result<Vec<Timer>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM timers ORDER BY _id"))?;
        let timers = stmt
            .query_map([], row_to_timer)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(timers)
    }

    fn save(&self, timer: &mut Timer) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let day_tone = timer.day_tone.as_ref().map(Tone::as_str);
        let night_tone = timer.night_tone.as_ref().map(Tone::as_str);

        if timer.is_saved() {
            conn.execute(
                "UPDATE timers SET name = ?2, enabled = ?3, next = ?4, interval = ?5,
                     dayTone = ?6, dayLED = ?7, dayWait = ?8, nightTone = ?9, nightLED = ?10,
                     nightWait = ?11, nightStart = ?12, nightStop = ?13, nightNext = ?14, seen = ?15
                 WHERE _id = ?1",
                params![
                    timer.id,
                    timer.name,
                    timer.enabled,
                    timer.next_fire_at,
                    timer.interval_secs,
                    day_tone,
                    timer.day_led,
                    timer.day_wait,
                    night_tone,
                    timer.night_led,
                    timer.night_wait,
                    timer.night_start,
                    timer.night_stop,
                    timer.night_next,
                    timer.seen,
                ],
            )?;
            debug!("Updated timer {}", timer.id);
        } else {
            conn.execute(
                "INSERT INTO timers (name, enabled, next, interval, dayTone, dayLED, dayWait,
                     nightTone, nightLED, nightWait, nightStart, nightStop, nightNext, seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    timer.name,
                    timer.enabled,
                    timer.next_fire_at,
                    timer.interval_secs,
                    day_tone,
                    timer.day_led,
                    timer.day_wait,
                    night_tone,
                    timer.night_led,
                    timer.night_wait,
                    timer.night_start,
                    timer.night_stop,
                    timer.night_next,
                    timer.seen,
                ],
            )?;
            timer.id = conn.last_insert_rowid();
            debug!("Inserted timer {}", timer.id);
        }
        Ok(timer.id)
    }

    fn remove(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM timers WHERE _id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
