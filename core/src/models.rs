use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fractional caloric deficit applied while reducing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub enum Intensity {
    Safe,
    #[default]
    Natural,
    Aggressive,
}

impl Intensity {
    pub const ALL: [Intensity; 3] = [Self::Safe, Self::Natural, Self::Aggressive];

    #[must_use]
    pub fn fraction(self) -> f64 {
        match self {
            Self::Safe => 0.10,
            Self::Natural => 0.14,
            Self::Aggressive => 0.20,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Natural => "natural",
            Self::Aggressive => "aggressive",
        }
    }
}

impl From<Intensity> for f64 {
    fn from(intensity: Intensity) -> Self {
        intensity.fraction()
    }
}

impl TryFrom<f64> for Intensity {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|i| (i.fraction() - value).abs() < 1e-9)
            .ok_or_else(|| ValidationError::InvalidIntensity(value.to_string()))
    }
}

impl FromStr for Intensity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "natural" => Ok(Self::Natural),
            "aggressive" => Ok(Self::Aggressive),
            other => {
                let value: f64 = other
                    .parse()
                    .map_err(|_| ValidationError::InvalidIntensity(s.to_string()))?;
                Self::try_from(value).map_err(|_| ValidationError::InvalidIntensity(s.to_string()))
            }
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}% ({})", self.fraction() * 100.0, self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub start_date: NaiveDate,
    pub start_weight: f64,
    pub target_weight: f64,
    pub height: f64,
    pub age: f64,
    pub intensity: Intensity,
    pub start_photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub start_date: NaiveDate,
    pub start_weight: f64,
    pub target_weight: f64,
    pub height: f64,
    pub age: f64,
    pub intensity: Intensity,
    #[serde(default)]
    pub start_photo: Option<String>,
}

/// One day of the log. `weight`/`waist` of 0 mean "not recorded that day".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLogEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub weight: f64,
    pub waist: f64,
    pub notes: Option<String>,
    pub photo_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDailyEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub waist: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photo_path: Option<String>,
}

impl NewDailyEntry {
    #[must_use]
    pub fn has_weight(&self) -> bool {
        self.weight > 0.0
    }
}

impl DailyLogEntry {
    #[must_use]
    pub fn has_weight(&self) -> bool {
        self.weight > 0.0
    }
}

/// Profile fields exactly as typed by the user, before parsing.
#[derive(Debug, Clone)]
pub struct ProfileForm {
    pub start_date: NaiveDate,
    pub start_weight: Option<String>,
    pub target_weight: Option<String>,
    pub height: Option<String>,
    pub age: Option<String>,
    pub intensity: Option<String>,
    pub start_photo: Option<String>,
}

impl ProfileForm {
    /// All five numeric fields and the intensity must be present and numeric.
    pub fn parse(&self) -> Result<NewProfile, ValidationError> {
        let intensity = required("intensity", self.intensity.as_deref())?.parse()?;
        let profile = NewProfile {
            start_date: self.start_date,
            start_weight: required_number("start_weight", self.start_weight.as_deref())?,
            target_weight: required_number("target_weight", self.target_weight.as_deref())?,
            height: required_number("height", self.height.as_deref())?,
            age: required_number("age", self.age.as_deref())?,
            intensity,
            start_photo: non_empty(self.start_photo.as_deref()),
        };
        validate_profile(&profile)?;
        Ok(profile)
    }
}

/// Day-log fields exactly as typed by the user. Blank numbers mean "not recorded".
#[derive(Debug, Clone)]
pub struct DailyEntryForm {
    pub date: NaiveDate,
    pub weight: Option<String>,
    pub waist: Option<String>,
    pub notes: Option<String>,
    pub photo_path: Option<String>,
}

impl DailyEntryForm {
    pub fn parse(&self) -> Result<NewDailyEntry, ValidationError> {
        let entry = NewDailyEntry {
            date: self.date,
            weight: optional_number("weight", self.weight.as_deref())?,
            waist: optional_number("waist", self.waist.as_deref())?,
            notes: non_empty(self.notes.as_deref()),
            photo_path: non_empty(self.photo_path.as_deref()),
        };
        validate_daily_entry(&entry)?;
        Ok(entry)
    }
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::Missing { field }),
    }
}

fn required_number(field: &'static str, value: Option<&str>) -> Result<f64, ValidationError> {
    let raw = required(field, value)?;
    parse_number(field, raw)
}

fn optional_number(field: &'static str, value: Option<&str>) -> Result<f64, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(raw) => parse_number(field, raw),
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    // Accept a decimal comma ("82,5").
    let normalized = raw.replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::NotNumeric {
            field,
            value: raw.to_string(),
        })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn parse_iso_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

pub fn validate_profile(profile: &NewProfile) -> Result<(), ValidationError> {
    for (field, value) in [
        ("start_weight", profile.start_weight),
        ("target_weight", profile.target_weight),
        ("height", profile.height),
        ("age", profile.age),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "must be greater than 0",
            });
        }
    }
    Ok(())
}

pub fn validate_daily_entry(entry: &NewDailyEntry) -> Result<(), ValidationError> {
    for (field, value) in [("weight", entry.weight), ("waist", entry.waist)] {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "must not be negative",
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Reduction,
    #[serde(rename = "Mass gain")]
    MassGain,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reduction => f.write_str("Reduction"),
            Self::MassGain => f.write_str("Mass gain"),
        }
    }
}

/// How the calorie figure should be colored by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeColor {
    Green,
    Red,
    Blue,
}

impl fmt::Display for ModeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Green => f.write_str("green"),
            Self::Red => f.write_str("red"),
            Self::Blue => f.write_str("blue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub bmr: f64,
    pub tdee: f64,
    pub current_weight: f64,
    pub start_weight: f64,
    pub target_weight: f64,
    pub total_delta: f64,
    pub done_delta: f64,
    pub progress: f64,
    pub calories: i64,
    pub mode: Mode,
    pub mode_color: ModeColor,
    pub days_left: i64,
    pub start_photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_photo: Option<String>,
    pub goal_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub day_offset: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisScale {
    pub axis_min: f64,
    pub axis_max: f64,
    pub label_interval: f64,
}

/// Weight-over-time series. `scale` is `None` when there are no points, in
/// which case the caller keeps its previous axis bounds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    pub points: Vec<ChartPoint>,
    pub scale: Option<AxisScale>,
}
