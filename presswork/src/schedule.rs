//! Schedule expression parsing and next-occurrence arithmetic.
//!
//! Two forms are accepted:
//!
//! - an extended cron expression with a seconds field
//!   (`sec min hour day-of-month month day-of-week`, optional seventh year
//!   field), parsed by the `cron` crate. Five-field expressions are
//!   normalized by prepending a zero seconds field.
//! - the shorthand `@every <decimal><unit>` with unit `s`, `m` or `h`
//!   (e.g. `@every 10s`, `@every 1.5m`). Minimum resolution is one second.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::EngineError;

/// A parsed schedule.
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    /// Cron expression with second precision.
    Cron(Box<cron::Schedule>),
    /// Fixed interval.
    Every(Duration),
}

impl ScheduleSpec {
    /// Parses a schedule expression.
    ///
    /// Returns [`EngineError::InvalidSchedule`] when the expression is empty
    /// or unparseable.
    pub fn parse(expr: &str) -> Result<Self, EngineError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(EngineError::InvalidSchedule {
                detail: "empty schedule".to_string(),
            });
        }

        if let Some(rest) = expr.strip_prefix("@every") {
            return parse_every(rest.trim()).map(Self::Every);
        }

        let normalized = normalize_cron(expr);
        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| {
            EngineError::InvalidSchedule {
                detail: format!("{expr:?}: {e}"),
            }
        })?;
        Ok(Self::Cron(Box::new(schedule)))
    }

    /// The next fire time strictly after `after`, or `None` when the
    /// schedule is exhausted.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron(schedule) => schedule.after(&after).next(),
            Self::Every(interval) => {
                let step = chrono::Duration::from_std(*interval).ok()?;
                Some(after + step)
            }
        }
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending a seconds
/// field. The `cron` crate requires the seconds field; plain 5-field crontab
/// syntax is common enough to accept.
fn normalize_cron(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Parses the argument of `@every`: a decimal number followed by `s`, `m`
/// or `h`.
fn parse_every(arg: &str) -> Result<Duration, EngineError> {
    let invalid = |detail: String| EngineError::InvalidSchedule { detail };

    let Some(unit) = arg.chars().last() else {
        return Err(invalid("@every requires a duration".to_string()));
    };
    let scale = match unit {
        's' => 1.0,
        'm' => 60.0,
        'h' => 3600.0,
        _ => {
            return Err(invalid(format!(
                "@every unit must be s, m or h, got {unit:?}"
            )))
        }
    };

    let number = &arg[..arg.len() - unit.len_utf8()];
    let value: f64 = number
        .parse()
        .map_err(|_| invalid(format!("@every duration {arg:?} is not a number")))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(format!("@every duration {arg:?} must be positive")));
    }

    let secs = value * scale;
    if secs < 1.0 {
        return Err(invalid(format!(
            "@every duration {arg:?} is below the 1s minimum resolution"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}
