use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use metamorph_core::models::DailyLogEntry;
use metamorph_core::service::MetamorphService;

use super::helpers::{format_measure, truncate};

const NOTES_WIDTH: usize = 30;

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Weight (kg)")]
    weight: String,
    #[tabled(rename = "Waist (cm)")]
    waist: String,
    #[tabled(rename = "Notes")]
    notes: String,
    #[tabled(rename = "Photo")]
    photo: String,
}

/// Newest first.
fn history_rows(entries: &[DailyLogEntry]) -> Vec<HistoryRow> {
    entries
        .iter()
        .rev()
        .map(|e| HistoryRow {
            date: e.date.format("%Y-%m-%d").to_string(),
            weight: format_measure(e.weight),
            waist: format_measure(e.waist),
            notes: e
                .notes
                .as_deref()
                .map(|n| truncate(n, NOTES_WIDTH))
                .unwrap_or_default(),
            photo: if e.photo_path.is_some() { "yes" } else { "" }.to_string(),
        })
        .collect()
}

pub(crate) fn cmd_history(service: &MetamorphService, json: bool) -> Result<()> {
    let entries = service.list_daily_entries()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No entries yet. Use `metamorph log` to record a day.");
    } else {
        let rows = history_rows(&entries);
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    Ok(())
}
