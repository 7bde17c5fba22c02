//! Dashboard figures and chart series derived from the stored profile and log.
//!
//! Nothing here keeps state between calls: every figure, including
//! `goal_reached`, is recomputed from what the store returns.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

use crate::db::Database;
use crate::models::{
    AxisScale, ChartPoint, ChartSeries, Dashboard, DailyLogEntry, Mode, ModeColor, Profile,
};

/// Fixed activity multiplier applied to BMR.
pub const ACTIVITY_FACTOR: f64 = 1.4;
/// kcal per kg lost, below the 7700 of pure fat.
pub const KCAL_PER_KG_LOSS: f64 = 7000.0;
pub const KCAL_PER_KG_GAIN: f64 = 5000.0;
/// Surplus while gaining, regardless of the intensity setting.
pub const GAIN_SURPLUS: f64 = 0.10;
/// Intensities above this are flagged as aggressive.
pub const NATURAL_INTENSITY_LIMIT: f64 = 0.15;
/// Reported when a deficit or surplus of zero makes the estimate meaningless.
pub const DAYS_LEFT_UNKNOWN: i64 = 999;

const SMALL_RANGE_KG: f64 = 5.0;
const SMALL_RANGE_PAD_KG: f64 = 2.0;
const RANGE_PAD_FRACTION: f64 = 0.10;
const MAX_AXIS_LABELS: f64 = 5.0;
const MIN_LABEL_INTERVAL: f64 = 1.0;

/// Mifflin-St Jeor without the sex term.
#[must_use]
pub fn basal_metabolic_rate(weight: f64, height: f64, age: f64) -> f64 {
    10.0 * weight + 6.25 * height - 5.0 * age + 5.0
}

#[must_use]
pub fn goal_reached(start: f64, target: f64, current: f64) -> bool {
    (target < start && current <= target) || (target > start && current >= target)
}

#[must_use]
pub fn progress_fraction(start: f64, target: f64, current: f64) -> f64 {
    let total = (target - start).abs();
    if total > 0.0 {
        ((current - start).abs() / total).min(1.0)
    } else {
        0.0
    }
}

fn days_to_goal(kg_left: f64, kcal_per_kg: f64, daily_kcal: f64) -> i64 {
    if kg_left <= 0.0 {
        0
    } else if daily_kcal <= 0.0 {
        DAYS_LEFT_UNKNOWN
    } else {
        (kg_left * kcal_per_kg / daily_kcal).floor() as i64
    }
}

/// Dashboard for `profile` given the latest recorded weight, if any.
#[must_use]
pub fn dashboard_for(
    profile: &Profile,
    latest_weight: Option<f64>,
    latest_photo: Option<String>,
) -> Dashboard {
    let start = profile.start_weight;
    let target = profile.target_weight;
    let current = latest_weight.unwrap_or(start);

    let bmr = basal_metabolic_rate(current, profile.height, profile.age);
    let tdee = bmr * ACTIVITY_FACTOR;

    // Equal start and target falls through to mass gain with nothing left.
    let (calories, mode, mode_color, days_left) = if target < start {
        let intensity = profile.intensity.fraction();
        let deficit = tdee * intensity;
        let color = if intensity <= NATURAL_INTENSITY_LIMIT {
            ModeColor::Green
        } else {
            ModeColor::Red
        };
        (
            tdee - deficit,
            Mode::Reduction,
            color,
            days_to_goal(current - target, KCAL_PER_KG_LOSS, deficit),
        )
    } else {
        let surplus = tdee * GAIN_SURPLUS;
        (
            tdee + surplus,
            Mode::MassGain,
            ModeColor::Blue,
            days_to_goal(target - current, KCAL_PER_KG_GAIN, surplus),
        )
    };

    Dashboard {
        bmr,
        tdee,
        current_weight: current,
        start_weight: start,
        target_weight: target,
        total_delta: (start - target).abs(),
        done_delta: (start - current).abs(),
        progress: progress_fraction(start, target, current),
        calories: calories as i64,
        mode,
        mode_color,
        days_left,
        start_photo: profile.start_photo.clone(),
        latest_photo,
        goal_reached: goal_reached(start, target, current),
    }
}

/// Axis bounds for a set of weights, or `None` when there are none.
#[must_use]
pub fn axis_scale(weights: &[f64]) -> Option<AxisScale> {
    let min_w = weights.iter().copied().reduce(f64::min)?;
    let max_w = weights.iter().copied().reduce(f64::max)?;

    let range = max_w - min_w;
    let pad = if range < SMALL_RANGE_KG {
        SMALL_RANGE_PAD_KG
    } else {
        range * RANGE_PAD_FRACTION
    };

    let axis_min = (min_w - pad).max(0.0);
    let axis_max = max_w + pad;
    // At most ~5 labels so they don't overlap.
    let label_interval = ((axis_max - axis_min) / MAX_AXIS_LABELS).max(MIN_LABEL_INTERVAL);

    Some(AxisScale {
        axis_min,
        axis_max,
        label_interval,
    })
}

/// Chart points for the log relative to `start_date`, seeded with the start
/// weight at day 0 when one is known.
#[must_use]
pub fn chart_series_for(
    start_weight: Option<f64>,
    entries: &[DailyLogEntry],
    start_date: NaiveDate,
) -> ChartSeries {
    let mut points: Vec<ChartPoint> = start_weight
        .filter(|w| w.is_finite() && *w > 0.0)
        .map(|weight| ChartPoint {
            day_offset: 0,
            weight,
        })
        .into_iter()
        .collect();

    points.extend(entries.iter().filter(|e| e.has_weight()).filter_map(|e| {
        let day_offset = (e.date - start_date).num_days();
        (day_offset >= 0).then_some(ChartPoint {
            day_offset,
            weight: e.weight,
        })
    }));

    let weights: Vec<f64> = points.iter().map(|p| p.weight).collect();
    let scale = axis_scale(&weights);
    ChartSeries { points, scale }
}

/// Reads the store and computes the dashboard and chart.
pub struct MetricsEngine<'a> {
    db: &'a Database,
}

impl<'a> MetricsEngine<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// `None` when no profile has been saved yet.
    pub fn compute_dashboard(&self) -> Result<Option<Dashboard>> {
        let Some(profile) = self.db.get_latest_profile()? else {
            return Ok(None);
        };
        let latest_weight = self.db.get_latest_recorded_weight()?;
        let latest_photo = self.db.get_latest_photo()?;
        let dashboard = dashboard_for(&profile, latest_weight, latest_photo);
        debug!(
            current_weight = dashboard.current_weight,
            calories = dashboard.calories,
            days_left = dashboard.days_left,
            goal_reached = dashboard.goal_reached,
            "dashboard computed"
        );
        Ok(Some(dashboard))
    }

    pub fn compute_chart_series(&self, start_date: NaiveDate) -> Result<ChartSeries> {
        let start_weight = self.db.get_latest_profile()?.map(|p| p.start_weight);
        let entries = self.db.list_daily_entries()?;
        let series = chart_series_for(start_weight, &entries, start_date);
        debug!(points = series.points.len(), %start_date, "chart series computed");
        Ok(series)
    }
}
