//! CLI argument parsing
//!
//! ```text
//! logscope [--config PATH] [--log-level LVL] [--json-logs] <command>
//!
//! COMMANDS:
//!   translate <QUERY>                 show the normalised search expression
//!   search [QUERY] [--from T] [--to T] [--kind logs|logs-volume] [--limit N]
//! ```
//!
//! Times are RFC 3339 or relative to now: `now`, `now-15m`, `now-2h`, `now-7d`.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::{Error, Result};
use crate::query::QueryKind;

#[derive(Debug, Clone, Parser)]
#[command(name = "logscope", version, about = "Search and chart logs from the command line")]
pub struct Cli {
    /// Configuration file (default: <config dir>/logscope/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `logscope_fetch=trace`
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the search expression a query translates to
    Translate {
        query: String,
    },

    /// Run a query and print the response as JSON
    Search {
        #[arg(default_value = "")]
        query: String,

        #[arg(long, default_value = "now-15m")]
        from: String,

        #[arg(long, default_value = "now")]
        to: String,

        #[arg(long, value_enum, default_value_t = QueryKind::Logs)]
        kind: QueryKind,

        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Parse an absolute or `now`-relative time
pub fn parse_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    let invalid = |reason: &str| Error::InvalidTime {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if trimmed == "now" {
        return Ok(now);
    }
    if let Some(offset) = trimmed.strip_prefix("now-") {
        let split = offset
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| invalid("missing unit (s, m, h or d)"))?;
        let (amount, unit) = offset.split_at(split);
        let amount: i64 = amount.parse().map_err(|_| invalid("expected a number after `now-`"))?;
        let offset = match unit {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            _ => return Err(invalid("unit must be one of s, m, h, d")),
        }
        .ok_or_else(|| invalid("offset too large"))?;
        return now
            .checked_sub_signed(offset)
            .ok_or_else(|| invalid("offset too large"));
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| invalid(&e.to_string()))
}
