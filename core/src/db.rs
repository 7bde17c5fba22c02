use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params, types::Type};
use tracing::{debug, warn};

use crate::models::{
    DATE_FORMAT, DailyLogEntry, Intensity, NewDailyEntry, NewProfile, Profile, validate_daily_entry,
    validate_profile,
};

/// SQLite-backed store for the single profile and the date-keyed daily log.
///
/// Every write is committed before the method returns.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS profile (
                        id INTEGER PRIMARY KEY,
                        start_date TEXT NOT NULL,
                        start_weight REAL NOT NULL,
                        target_weight REAL NOT NULL,
                        height REAL NOT NULL,
                        age REAL NOT NULL,
                        intensity REAL NOT NULL,
                        photo_start TEXT
                    );

                    CREATE TABLE IF NOT EXISTS daily_logs (
                        id INTEGER PRIMARY KEY,
                        date TEXT NOT NULL UNIQUE,
                        weight REAL NOT NULL DEFAULT 0,
                        waist REAL NOT NULL DEFAULT 0,
                        notes TEXT,
                        photo_path TEXT
                    );

                    PRAGMA user_version = 1;",
                )
                .context("Failed to create schema")?;
        }

        Ok(())
    }

    fn parse_date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
        let date_str: String = row.get(idx)?;
        NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
            warn!(value = %date_str, "unparseable date in database");
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        let intensity: f64 = row.get(6)?;
        let intensity = Intensity::try_from(intensity)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Real, Box::new(e)))?;
        Ok(Profile {
            id: row.get(0)?,
            start_date: Self::parse_date_column(row, 1)?,
            start_weight: row.get(2)?,
            target_weight: row.get(3)?,
            height: row.get(4)?,
            age: row.get(5)?,
            intensity,
            start_photo: row.get(7)?,
        })
    }

    fn daily_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyLogEntry> {
        Ok(DailyLogEntry {
            id: row.get(0)?,
            date: Self::parse_date_column(row, 1)?,
            weight: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            waist: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            notes: row.get(4)?,
            photo_path: row.get(5)?,
        })
    }

    // --- Profile ---

    /// Replace the stored profile with `profile`.
    ///
    /// A start photo already on record is kept; the new one is only written
    /// when none was set before.
    pub fn save_profile(&self, profile: &NewProfile) -> Result<Profile> {
        validate_profile(profile)?;

        let existing_photo = self
            .get_latest_profile()?
            .and_then(|p| p.start_photo);
        let start_photo = existing_photo.or_else(|| profile.start_photo.clone());

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM profile", [])?;
        tx.execute(
            "INSERT INTO profile (start_date, start_weight, target_weight, height, age, intensity, photo_start)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                profile.start_date.format(DATE_FORMAT).to_string(),
                profile.start_weight,
                profile.target_weight,
                profile.height,
                profile.age,
                profile.intensity.fraction(),
                start_photo,
            ],
        )?;
        tx.commit().context("Failed to save profile")?;
        debug!(
            start_weight = profile.start_weight,
            target_weight = profile.target_weight,
            intensity = profile.intensity.fraction(),
            "profile saved"
        );

        self.get_latest_profile()?
            .context("Profile not found after save")
    }

    pub fn get_latest_profile(&self) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, start_date, start_weight, target_weight, height, age, intensity, photo_start
                 FROM profile ORDER BY id DESC LIMIT 1",
                [],
                Self::profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    // --- Daily log ---

    /// Insert the entry for `entry.date`, or replace every field of the
    /// existing one.
    pub fn upsert_daily_entry(&self, entry: &NewDailyEntry) -> Result<DailyLogEntry> {
        validate_daily_entry(entry)?;

        let date_str = entry.date.format(DATE_FORMAT).to_string();
        self.conn.execute(
            "INSERT INTO daily_logs (date, weight, waist, notes, photo_path)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(date) DO UPDATE SET
                weight = excluded.weight,
                waist = excluded.waist,
                notes = excluded.notes,
                photo_path = excluded.photo_path",
            params![
                date_str,
                entry.weight,
                entry.waist,
                entry.notes,
                entry.photo_path
            ],
        )?;
        debug!(date = %date_str, weight = entry.weight, waist = entry.waist, "daily entry saved");

        self.get_daily_entry(entry.date)?
            .context("Daily entry not found after upsert")
    }

    pub fn get_daily_entry(&self, date: NaiveDate) -> Result<Option<DailyLogEntry>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, date, weight, waist, notes, photo_path
             FROM daily_logs WHERE date = ?1",
        )?;
        let mut rows = stmt.query(params![date_str])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::daily_entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// All entries, oldest first.
    pub fn list_daily_entries(&self) -> Result<Vec<DailyLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, weight, waist, notes, photo_path
             FROM daily_logs ORDER BY date ASC",
        )?;
        let entries = stmt
            .query_map([], Self::daily_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Weight of the most recent entry that has one recorded.
    pub fn get_latest_recorded_weight(&self) -> Result<Option<f64>> {
        let weight = self
            .conn
            .query_row(
                "SELECT weight FROM daily_logs WHERE weight > 0 ORDER BY date DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(weight)
    }

    /// Photo of the most recent entry that has one attached.
    pub fn get_latest_photo(&self) -> Result<Option<String>> {
        let photo = self
            .conn
            .query_row(
                "SELECT photo_path FROM daily_logs
                 WHERE photo_path IS NOT NULL AND photo_path != ''
                 ORDER BY date DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(photo)
    }

    pub fn delete_daily_entry(&self, date: NaiveDate) -> Result<bool> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let rows = self
            .conn
            .execute("DELETE FROM daily_logs WHERE date = ?1", params![date_str])?;
        debug!(date = %date_str, deleted = rows > 0, "daily entry delete");
        Ok(rows > 0)
    }
}
