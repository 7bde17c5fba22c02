mod chart;
mod dashboard;
mod day;
mod helpers;
mod history;
mod profile;

pub(crate) use chart::cmd_chart;
pub(crate) use dashboard::cmd_dashboard;
pub(crate) use day::{LogArgs, cmd_day_delete, cmd_day_show, cmd_log};
pub(crate) use history::cmd_history;
pub(crate) use profile::{ProfileArgs, cmd_profile_set, cmd_profile_show};
