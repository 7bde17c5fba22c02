use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;

use crate::db::Database;
use crate::metrics::MetricsEngine;
use crate::models::{
    ChartSeries, DailyEntryForm, DailyLogEntry, Dashboard, NewDailyEntry, NewProfile, Profile,
    ProfileForm,
};

/// Everything a front end needs: storage writes and reads plus the derived
/// metrics. Callers re-run [`Self::compute_dashboard`] and
/// [`Self::compute_chart_series`] after each write.
pub struct MetamorphService {
    db: Database,
}

impl MetamorphService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    fn engine(&self) -> MetricsEngine<'_> {
        MetricsEngine::new(&self.db)
    }

    // --- Profile ---

    pub fn save_profile(&self, profile: &NewProfile) -> Result<Profile> {
        self.db.save_profile(profile)
    }

    /// Parse raw form input and save it. Nothing is written when parsing fails.
    pub fn save_profile_form(&self, form: &ProfileForm) -> Result<Profile> {
        let profile = form.parse()?;
        self.db.save_profile(&profile)
    }

    pub fn get_latest_profile(&self) -> Result<Option<Profile>> {
        self.db.get_latest_profile()
    }

    // --- Daily log ---

    pub fn upsert_daily_entry(&self, entry: &NewDailyEntry) -> Result<DailyLogEntry> {
        self.db.upsert_daily_entry(entry)
    }

    pub fn upsert_daily_form(&self, form: &DailyEntryForm) -> Result<DailyLogEntry> {
        let entry = form.parse()?;
        self.db.upsert_daily_entry(&entry)
    }

    pub fn get_daily_entry(&self, date: NaiveDate) -> Result<Option<DailyLogEntry>> {
        self.db.get_daily_entry(date)
    }

    pub fn list_daily_entries(&self) -> Result<Vec<DailyLogEntry>> {
        self.db.list_daily_entries()
    }

    pub fn get_latest_recorded_weight(&self) -> Result<Option<f64>> {
        self.db.get_latest_recorded_weight()
    }

    pub fn delete_daily_entry(&self, date: NaiveDate) -> Result<bool> {
        self.db.delete_daily_entry(date)
    }

    // --- Metrics ---

    pub fn compute_dashboard(&self) -> Result<Option<Dashboard>> {
        self.engine().compute_dashboard()
    }

    pub fn compute_chart_series(&self, start_date: NaiveDate) -> Result<ChartSeries> {
        self.engine().compute_chart_series(start_date)
    }

    /// Chart relative to the profile's start date; `None` without a profile.
    pub fn compute_profile_chart(&self) -> Result<Option<ChartSeries>> {
        match self.db.get_latest_profile()? {
            Some(profile) => self.compute_chart_series(profile.start_date).map(Some),
            None => Ok(None),
        }
    }
}
