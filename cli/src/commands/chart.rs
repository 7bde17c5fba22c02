use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use metamorph_core::models::{AxisScale, ChartSeries};
use metamorph_core::service::MetamorphService;

use super::helpers::parse_date;

const BAR_WIDTH: f64 = 40.0;

pub(crate) fn cmd_chart(service: &MetamorphService, from: Option<&str>, json: bool) -> Result<()> {
    let start_date = match from {
        Some(s) => parse_date(Some(s))?,
        None => {
            let Some(profile) = service.get_latest_profile()? else {
                if json {
                    println!("{}", serde_json::json!({ "error": "No profile configured" }));
                } else {
                    eprintln!("No profile yet. Pass --from or run `metamorph profile set`.");
                }
                return Ok(());
            };
            profile.start_date
        }
    };

    let series = service.compute_chart_series(start_date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
        return Ok(());
    }

    let Some(scale) = series.scale else {
        eprintln!("Nothing to chart yet. Use `metamorph log --weight <KG>` to add weigh-ins.");
        return Ok(());
    };

    print_series(&series, &scale, start_date);
    Ok(())
}

fn print_series(series: &ChartSeries, scale: &AxisScale, start_date: chrono::NaiveDate) {
    #[derive(Tabled)]
    struct PointRow {
        #[tabled(rename = "Day")]
        day: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        weight: String,
        #[tabled(rename = "")]
        bar: String,
    }

    let rows: Vec<PointRow> = series
        .points
        .iter()
        .map(|p| PointRow {
            day: p.day_offset,
            date: (start_date + chrono::Duration::days(p.day_offset))
                .format("%Y-%m-%d")
                .to_string(),
            weight: format!("{:.1}", p.weight),
            bar: bar(p.weight, scale),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!(
        "Axis: {:.1} - {:.1} kg, label every {:.1} kg",
        scale.axis_min, scale.axis_max, scale.label_interval
    );
}

#[allow(clippy::cast_sign_loss)]
fn bar(weight: f64, scale: &AxisScale) -> String {
    let span = scale.axis_max - scale.axis_min;
    if span <= 0.0 {
        return String::new();
    }
    let len = ((weight - scale.axis_min) / span * BAR_WIDTH).round().max(0.0) as usize;
    "█".repeat(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_scales_between_axis_bounds() {
        let scale = AxisScale {
            axis_min: 90.0,
            axis_max: 100.0,
            label_interval: 2.0,
        };
        assert_eq!(bar(90.0, &scale).chars().count(), 0);
        assert_eq!(bar(95.0, &scale).chars().count(), 20);
        assert_eq!(bar(100.0, &scale).chars().count(), 40);
    }

    #[test]
    fn test_bar_degenerate_span() {
        let scale = AxisScale {
            axis_min: 0.0,
            axis_max: 0.0,
            label_interval: 1.0,
        };
        assert!(bar(10.0, &scale).is_empty());
    }
}
