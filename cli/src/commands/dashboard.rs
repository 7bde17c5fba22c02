use anyhow::Result;

use metamorph_core::metrics::DAYS_LEFT_UNKNOWN;
use metamorph_core::models::Dashboard;
use metamorph_core::service::MetamorphService;

use super::helpers::progress_bar;

pub(crate) fn cmd_dashboard(service: &MetamorphService, json: bool) -> Result<()> {
    let Some(dashboard) = service.compute_dashboard()? else {
        if json {
            println!("{}", serde_json::json!({ "error": "No profile configured" }));
        } else {
            eprintln!("Set up your profile first: `metamorph profile set --help`");
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else if dashboard.goal_reached {
        print_goal_panel(&dashboard);
    } else {
        print_standard_panel(&dashboard);
    }
    Ok(())
}

fn print_standard_panel(d: &Dashboard) {
    println!("YOUR TARGET FOR TODAY");
    println!("  {} kcal ({})", d.calories, d.mode_color);
    println!("  Mode: {} (TDEE: {})", d.mode, d.tdee as i64);
    println!();
    println!(
        "  {:.1} kg now, {:.1} of {:.1} kg done",
        d.current_weight, d.done_delta, d.total_delta
    );
    println!("  {}", progress_bar(d.progress));
    if d.days_left == DAYS_LEFT_UNKNOWN {
        println!("  Estimated time to goal: unknown");
    } else {
        println!("  Estimated time to goal: {} days", d.days_left);
    }
}

fn print_goal_panel(d: &Dashboard) {
    println!("CONGRATULATIONS! GOAL REACHED!");
    println!(
        "  {:.1} kg -> {:.1} kg (target {:.1} kg)",
        d.start_weight, d.current_weight, d.target_weight
    );
    println!();
    println!(
        "  START: {}",
        d.start_photo.as_deref().unwrap_or("(no start photo)")
    );
    match d.latest_photo.as_deref() {
        Some(photo) => println!("  NOW:   {photo}"),
        None => println!("  NOW:   add a final photo with `metamorph log --photo <PATH>`"),
    }
    println!();
    println!("  Maintenance: {} kcal", maintenance_calories(d));
}

/// Intake that holds the current weight: TDEE, with no deficit or surplus.
fn maintenance_calories(d: &Dashboard) -> i64 {
    d.tdee as i64
}
