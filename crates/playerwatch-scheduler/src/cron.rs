//! Cron expressions for timer-triggered runs, evaluated in UTC.
//!
//! Five fields, `MIN HOUR DOM MON DOW`. Minute and hour take `*`, `*/N`,
//! `N`, `N-M` or a comma list of those. The last three fields must be `*`.

use chrono::{DateTime, Duration, Timelike, Utc};
use playerwatch_core::{PlayerwatchError, Result};

/// A validated cron expression.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let err = |msg: &str| PlayerwatchError::Config(format!("cron '{expression}': {msg}"));

        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(err("need 5 fields: MIN HOUR DOM MON DOW"));
        }
        if parts[2..].iter().any(|f| *f != "*") {
            return Err(err("only '*' is supported for day-of-month, month and day-of-week"));
        }

        let minutes = parse_field(parts[0], 0, 59).ok_or_else(|| err("invalid minute field"))?;
        let hours = parse_field(parts[1], 0, 23).ok_or_else(|| err("invalid hour field"))?;

        Ok(Self {
            expression: expression.to_string(),
            minutes,
            hours,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = after + Duration::minutes(1);
        candidate = candidate
            .with_second(0)
            .and_then(|c| c.with_nanosecond(0))
            .unwrap_or(candidate);

        // Every hour/minute pair recurs within a day.
        for _ in 0..(24 * 60) {
            if self.minutes.contains(&candidate.minute()) && self.hours.contains(&candidate.hour()) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

/// Parse a simple cron expression and compute the next run time.
pub fn next_run_from_cron(expression: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match Schedule::parse(expression) {
        Ok(schedule) => schedule.next_after(after),
        Err(e) => {
            tracing::warn!("Invalid cron expression: {e}");
            None
        }
    }
}

/// Values matched by one cron field, or `None` if it does not parse.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let in_range = |n: u32| (min..=max).contains(&n);
    let mut values = Vec::new();

    for part in field.split(',').map(str::trim) {
        if part == "*" {
            values.extend(min..=max);
        } else if let Some(step) = part.strip_prefix("*/") {
            let step: usize = step.parse().ok().filter(|s| *s > 0)?;
            values.extend((min..=max).step_by(step));
        } else if let Some((lo, hi)) = part.split_once('-') {
            let lo: u32 = lo.parse().ok()?;
            let hi: u32 = hi.parse().ok()?;
            if lo > hi || !in_range(lo) || !in_range(hi) {
                return None;
            }
            values.extend(lo..=hi);
        } else {
            let n: u32 = part.parse().ok()?;
            if !in_range(n) {
                return None;
            }
            values.push(n);
        }
    }

    values.sort_unstable();
    values.dedup();
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, min, sec).unwrap()
    }

    #[test]
    fn test_morning_report() {
        let schedule = Schedule::parse("0 8 * * *").unwrap();
        assert_eq!(schedule.next_after(at(10, 6, 45, 0)), Some(at(10, 8, 0, 0)));
        assert_eq!(schedule.next_after(at(10, 8, 0, 0)), Some(at(11, 8, 0, 0)));
    }

    #[test]
    fn test_business_hours_half_hourly() {
        let schedule = Schedule::parse("*/30 6-20 * * *").unwrap();
        assert_eq!(schedule.next_after(at(10, 6, 10, 0)), Some(at(10, 6, 30, 0)));
        assert_eq!(schedule.next_after(at(10, 20, 30, 0)), Some(at(11, 6, 0, 0)));
    }

    #[test]
    fn test_twice_daily_list() {
        let schedule = Schedule::parse("15 9,17 * * *").unwrap();
        assert_eq!(schedule.next_after(at(10, 9, 15, 1)), Some(at(10, 17, 15, 0)));
        assert_eq!(schedule.next_after(at(10, 23, 59, 59)), Some(at(11, 9, 15, 0)));
    }

    #[test]
    fn test_seconds_are_dropped() {
        let schedule = Schedule::parse("* * * * *").unwrap();
        assert_eq!(schedule.next_after(at(10, 12, 0, 42)), Some(at(10, 12, 1, 0)));
    }

    #[test]
    fn test_expression_is_kept() {
        let schedule = Schedule::parse("0 8 * * *").unwrap();
        assert_eq!(schedule.expression(), "0 8 * * *");
    }

    #[test]
    fn test_rejected_expressions() {
        for bad in [
            "",
            "0 8 * *",
            "0 8 1 * *",
            "0 8 * * MON",
            "60 * * * *",
            "0 24 * * *",
            "*/0 * * * *",
            "0 17-8 * * *",
            "0 8,x * * *",
        ] {
            assert!(Schedule::parse(bad).is_err(), "accepted '{bad}'");
        }
        assert!(next_run_from_cron("0 8 1 * *", at(10, 0, 0, 0)).is_none());
    }
}
