use anyhow::Result;
use chrono::{Local, NaiveDate};

use metamorph_core::models::parse_iso_date;

const PROGRESS_BAR_WIDTH: usize = 20;

pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    match date_str {
        None | Some("today") => Ok(Local::now().date_naive()),
        Some("yesterday") => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
        Some("tomorrow") => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
        Some(s) => Ok(parse_iso_date(s)?),
    }
}

/// A weight or waist reading, or `-` when the day has none.
pub(crate) fn format_measure(value: f64) -> String {
    if value > 0.0 {
        format!("{value:.1}")
    } else {
        "-".to_string()
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(crate) fn progress_bar(fraction: f64) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * PROGRESS_BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        ".".repeat(PROGRESS_BAR_WIDTH - filled),
        (fraction * 100.0) as i64
    )
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
