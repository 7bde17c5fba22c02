use anyhow::Result;

use metamorph_core::models::{DailyEntryForm, DailyLogEntry};
use metamorph_core::service::MetamorphService;

use super::helpers::{format_measure, parse_date};

/// Raw `log` arguments. Blank weight/waist mean "not measured today".
pub(crate) struct LogArgs {
    pub date: Option<String>,
    pub weight: Option<String>,
    pub waist: Option<String>,
    pub notes: Option<String>,
    pub photo: Option<String>,
}

pub(crate) fn cmd_log(service: &MetamorphService, args: LogArgs, json: bool) -> Result<()> {
    let form = DailyEntryForm {
        date: parse_date(args.date.as_deref())?,
        weight: args.weight,
        waist: args.waist,
        notes: args.notes,
        photo_path: args.photo,
    };
    let entry = service.upsert_daily_form(&form)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("Saved entry for {}", entry.date.format("%Y-%m-%d"));
        print_entry(&entry);
    }
    Ok(())
}

pub(crate) fn cmd_day_show(service: &MetamorphService, date: Option<&str>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let entry = service.get_daily_entry(date)?;
    let date_str = date.format("%Y-%m-%d");

    match entry {
        Some(e) if json => println!("{}", serde_json::to_string_pretty(&e)?),
        Some(e) => {
            println!("{date_str}");
            print_entry(&e);
        }
        None if json => println!(
            "{}",
            serde_json::json!({ "error": format!("No entry for {date_str}") })
        ),
        None => eprintln!("No entry for {date_str}"),
    }
    Ok(())
}

pub(crate) fn cmd_day_delete(service: &MetamorphService, date: &str, json: bool) -> Result<()> {
    let date = parse_date(Some(date))?;
    let deleted = service.delete_daily_entry(date)?;
    let date_str = date.format("%Y-%m-%d");

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "date": date_str.to_string() }));
    } else if deleted {
        println!("Deleted entry for {date_str}");
    } else {
        eprintln!("No entry for {date_str}");
    }
    Ok(())
}

fn print_entry(e: &DailyLogEntry) {
    println!("  Weight: {} kg", format_measure(e.weight));
    println!("  Waist:  {} cm", format_measure(e.waist));
    if let Some(ref n) = e.notes {
        println!("  Notes:  {n}");
    }
    if let Some(ref p) = e.photo_path {
        println!("  Photo:  {p}");
    }
}
