use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

use crate::config::ConfigError;
use crate::monitoring::TimeWindow;

/// `--since` 입력 형식
pub const SINCE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// 리포트 최대 기간 (1년, 날짜 디렉토리 탐색 횟수 제한)
pub const MAX_REPORT_HOURS: u32 = 24 * 366;

#[derive(Debug, Parser)]
#[command(
    name = "log-notifier",
    about = "Turns ticketing backend logs into Slack notifications and reports"
)]
pub struct Cli {
    /// Print messages to stdout instead of sending them to Slack
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one aggregate report for a recent time window
    Report {
        /// Window start in local time, e.g. "2025-05-18 00:00"
        #[arg(long, conflicts_with = "hours")]
        since: Option<String>,
        /// Window length in hours, ending now
        #[arg(long, default_value_t = 1)]
        hours: u32,
    },
    /// Tail the log root and send a message per event until interrupted
    Watch,
}

/// Analysis window ending at `now`
pub fn report_window(
    since: Option<&str>,
    hours: u32,
    now: NaiveDateTime,
) -> Result<TimeWindow, ConfigError> {
    match since {
        Some(raw) => {
            let start = NaiveDateTime::parse_from_str(raw.trim(), SINCE_FORMAT)
                .map_err(|_| ConfigError::InvalidSince(raw.to_string()))?;
            let window = TimeWindow::new(start, now);
            if window.hours_ceil() > i64::from(MAX_REPORT_HOURS) {
                return Err(ConfigError::InvalidSince(raw.to_string()));
            }
            Ok(window)
        }
        None => {
            if hours == 0 || hours > MAX_REPORT_HOURS {
                return Err(ConfigError::InvalidHours(hours));
            }
            TimeWindow::last_hours(now, hours).ok_or(ConfigError::InvalidHours(hours))
        }
    }
}
