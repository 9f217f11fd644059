use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DurationParseError;

/// ISO-8601 duration (`PnYnMnDTnHnMnS`) with whole-second precision.
///
/// Components are kept as written so the textual form round-trips; [`Duration::add_seconds`]
/// carries seconds into minutes, hours and days but never into months or years.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Duration {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Duration {
    pub const ZERO: Duration = Duration {
        years: 0,
        months: 0,
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    pub fn from_seconds(secs: u64) -> Self {
        let mut d = Duration::ZERO;
        d.add_seconds(secs);
        d
    }

    pub fn is_zero(&self) -> bool {
        *self == Duration::ZERO
    }

    /// Total length in seconds for the day-time part. `None` if years or months are set,
    /// since those have no fixed length.
    pub fn as_seconds(&self) -> Option<u64> {
        if self.years != 0 || self.months != 0 {
            return None;
        }
        Some(
            u64::from(self.days) * 86_400
                + u64::from(self.hours) * 3_600
                + u64::from(self.minutes) * 60
                + u64::from(self.seconds),
        )
    }

    /// Accumulate elapsed time, normalising the day-time components.
    pub fn add_seconds(&mut self, secs: u64) {
        let total = u64::from(self.seconds)
            + u64::from(self.minutes) * 60
            + u64::from(self.hours) * 3_600
            + u64::from(self.days) * 86_400
            + secs;
        self.seconds = (total % 60) as u32;
        self.minutes = ((total / 60) % 60) as u32;
        self.hours = ((total / 3_600) % 24) as u32;
        self.days = u32::try_from(total / 86_400).unwrap_or(u32::MAX);
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }
        f.write_str("P")?;
        for (v, unit) in [(self.years, 'Y'), (self.months, 'M'), (self.days, 'D')] {
            if v != 0 {
                write!(f, "{v}{unit}")?;
            }
        }
        if self.hours != 0 || self.minutes != 0 || self.seconds != 0 {
            f.write_str("T")?;
            for (v, unit) in [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')] {
                if v != 0 {
                    write!(f, "{v}{unit}")?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DurationParseError(s.to_string());
        let rest = s.strip_prefix('P').ok_or_else(err)?;
        if rest.is_empty() {
            return Err(err());
        }
        let (date, time) = match rest.split_once('T') {
            Some((_, "")) => return Err(err()),
            Some((date, time)) => (date, Some(time)),
            None => (rest, None),
        };

        let mut d = Duration::ZERO;
        // Each designator may appear at most once and in order.
        let parse_part = |part: &str, units: &[char], slots: &mut [&mut u32]| {
            let mut next_unit = 0usize;
            let mut digits = String::new();
            for c in part.chars() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    continue;
                }
                let idx = units[next_unit..]
                    .iter()
                    .position(|u| *u == c)
                    .map(|i| i + next_unit)
                    .ok_or_else(err)?;
                if digits.is_empty() {
                    return Err(err());
                }
                *slots[idx] = digits.parse().map_err(|_| err())?;
                digits.clear();
                next_unit = idx + 1;
            }
            if !digits.is_empty() {
                return Err(err());
            }
            Ok(())
        };

        parse_part(
            date,
            &['Y', 'M', 'D'],
            &mut [&mut d.years, &mut d.months, &mut d.days],
        )?;
        if let Some(time) = time {
            parse_part(
                time,
                &['H', 'M', 'S'],
                &mut [&mut d.hours, &mut d.minutes, &mut d.seconds],
            )?;
        }
        Ok(d)
    }
}

impl TryFrom<String> for Duration {
    type Error = DurationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Duration> for String {
    fn from(value: Duration) -> Self {
        value.to_string()
    }
}
