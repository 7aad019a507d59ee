use chrono::{Datelike, Local, Month};

use super::types::StartPeriod;

/// Supplies the calendar month a freshly computed schedule starts at.
pub trait Clock: Send + Sync {
    fn current_period(&self) -> StartPeriod;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_period(&self) -> StartPeriod {
        let now = Local::now();
        StartPeriod {
            year: now.year(),
            month: now.month(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub StartPeriod);

impl Clock for FixedClock {
    fn current_period(&self) -> StartPeriod {
        self.0
    }
}

/// Three-letter English abbreviation for a 1-based month number.
pub fn month_abbreviation(month: u32) -> Option<&'static str> {
    let month = u8::try_from(month).ok()?;
    Month::try_from(month).ok().map(|m| &m.name()[..3])
}

/// Parses `YYYY-MM` as used by the CLI `--start` flag.
pub fn parse_start_period(raw: &str) -> Result<StartPeriod, String> {
    let (year, month) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| format!("--start must look like YYYY-MM, got {raw:?}"))?;
    let year = year
        .parse::<i32>()
        .map_err(|_| format!("--start year is not a number: {year:?}"))?;
    let month = month
        .parse::<u32>()
        .map_err(|_| format!("--start month is not a number: {month:?}"))?;
    if !(1..=12).contains(&month) {
        return Err("--start month must be between 1 and 12".to_string());
    }
    Ok(StartPeriod { year, month })
}
