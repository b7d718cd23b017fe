//! Schedule rule parsing.
//!
//! Raw `{mode, spec}` descriptors from config become normalized rules:
//! recurring cron expressions or one-shot UTC instants. Parsing is
//! all-or-nothing per task; one bad descriptor invalidates the task.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use postpilot_core::config::ScheduleSpec;
use postpilot_core::error::{PostPilotError, Result};

/// A normalized trigger specification.
#[derive(Debug, Clone)]
pub enum ScheduleRule {
    /// Recurring cron trigger.
    Cron {
        expression: String,
        schedule: cron::Schedule,
    },
    /// One-shot absolute trigger.
    Date { timestamp: DateTime<Utc> },
}

impl std::fmt::Display for ScheduleRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cron { expression, .. } => write!(f, "cron [{expression}]"),
            Self::Date { timestamp } => write!(f, "once at {}", timestamp.to_rfc3339()),
        }
    }
}

/// Parse a task's raw schedule descriptors, failing on the first bad one.
pub fn parse_rules(specs: &[ScheduleSpec]) -> Result<Vec<ScheduleRule>> {
    specs.iter().map(parse_rule).collect()
}

fn parse_rule(spec: &ScheduleSpec) -> Result<ScheduleRule> {
    match spec.mode.as_str() {
        "cron" => parse_cron(&spec.spec),
        "date" => parse_date(&spec.spec),
        other => Err(PostPilotError::InvalidScheduleMode(other.to_string())),
    }
}

/// The `cron` crate wants a seconds column; plain five-field specs get
/// one prepended so `0 * * * *` keeps meaning "top of every hour".
fn parse_cron(spec: &str) -> Result<ScheduleRule> {
    let expression = if spec.split_whitespace().count() == 5 {
        format!("0 {spec}")
    } else {
        spec.to_string()
    };

    let schedule = cron::Schedule::from_str(&expression)
        .map_err(|e| PostPilotError::Schedule(format!("invalid cron expression '{spec}': {e}")))?;

    Ok(ScheduleRule::Cron {
        expression,
        schedule,
    })
}

/// Absolute timestamps: RFC 3339, or a naive `YYYY-MM-DD HH:MM[:SS]`
/// read as UTC.
fn parse_date(spec: &str) -> Result<ScheduleRule> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(spec) {
        return Ok(ScheduleRule::Date {
            timestamp: timestamp.with_timezone(&Utc),
        });
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(spec, format) {
            return Ok(ScheduleRule::Date {
                timestamp: naive.and_utc(),
            });
        }
    }

    Err(PostPilotError::Schedule(format!("invalid date spec: {spec}")))
}
