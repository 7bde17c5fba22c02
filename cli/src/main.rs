mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    LogArgs, ProfileArgs, cmd_chart, cmd_dashboard, cmd_day_delete, cmd_day_show, cmd_history,
    cmd_log, cmd_profile_set, cmd_profile_show,
};
use crate::config::Config;
use metamorph_core::service::MetamorphService;

const LOG_ENV: &str = "METAMORPH_LOG";

#[derive(Parser)]
#[command(
    name = "metamorph",
    version,
    about = "A single-user weight tracker",
    long_about = "Track your weight, waist and photos day by day.\n\
                  Metamorph turns your profile into a daily calorie target,\n\
                  a progress estimate and a weight chart."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage your body profile and goal
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Record weight, waist, notes or a photo for a day
    Log {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Weight in kg (blank or 0 means not measured)
        #[arg(short, long)]
        weight: Option<String>,
        /// Waist circumference in cm
        #[arg(long)]
        waist: Option<String>,
        /// Free-form notes (training, how you felt)
        #[arg(short, long)]
        notes: Option<String>,
        /// Path to a progress photo
        #[arg(long, value_name = "PATH")]
        photo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or delete a single day
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },
    /// Show today's calorie target and progress
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the weight chart since the profile start date
    Chart {
        /// First day of the chart (YYYY-MM-DD, default: profile start date)
        #[arg(long)]
        from: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recorded days, newest first
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Create or replace the profile
    Set {
        /// Start date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        start_date: Option<String>,
        /// Starting weight in kg
        #[arg(long)]
        start_weight: Option<String>,
        /// Target weight in kg
        #[arg(long)]
        target_weight: Option<String>,
        /// Height in cm
        #[arg(long)]
        height: Option<String>,
        /// Age in years
        #[arg(long)]
        age: Option<String>,
        /// Diet intensity: safe (0.10), natural (0.14) or aggressive (0.20)
        #[arg(short, long, default_value = "0.14")]
        intensity: String,
        /// Path to a starting photo (kept if one is already set)
        #[arg(long, value_name = "PATH")]
        photo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DayCommands {
    /// Show the entry for a date (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the entry for a date
    Delete {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    });

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let service = MetamorphService::new(&config.db_path)?;

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                start_date,
                start_weight,
                target_weight,
                height,
                age,
                intensity,
                photo,
                json,
            } => cmd_profile_set(
                &service,
                ProfileArgs {
                    start_date,
                    start_weight,
                    target_weight,
                    height,
                    age,
                    intensity: Some(intensity),
                    photo,
                },
                json,
            ),
            ProfileCommands::Show { json } => cmd_profile_show(&service, json),
        },
        Commands::Log {
            date,
            weight,
            waist,
            notes,
            photo,
            json,
        } => cmd_log(
            &service,
            LogArgs {
                date,
                weight,
                waist,
                notes,
                photo,
            },
            json,
        ),
        Commands::Day { command } => match command {
            DayCommands::Show { date, json } => cmd_day_show(&service, date.as_deref(), json),
            DayCommands::Delete { date, json } => cmd_day_delete(&service, &date, json),
        },
        Commands::Dashboard { json } => cmd_dashboard(&service, json),
        Commands::Chart { from, json } => cmd_chart(&service, from.as_deref(), json),
        Commands::History { json } => cmd_history(&service, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            server::start_server(service, port, &bind, api_key).await
        }
    }
}
