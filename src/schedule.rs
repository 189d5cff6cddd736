//! Schedule expressions for heartbeat pings.
//!
//! A schedule tells the collector how often a ping is expected. Callers
//! write it the way they would say it: `"daily"`, `"every 30 minutes"`,
//! `"3 days"`. Anything that does not parse is dropped without complaint.

use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Unit of a schedule period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    fn from_noun(noun: &str) -> Option<Self> {
        match noun {
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "minutely" => Some(Self::Minute),
            "hourly" => Some(Self::Hour),
            "daily" => Some(Self::Day),
            "weekly" => Some(Self::Week),
            "monthly" => Some(Self::Month),
            "yearly" => Some(Self::Year),
            _ => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected cadence of a ping: `count` repetitions of `period`.
///
/// Serializes as the `schedule_number` / `schedule_period` pair the
/// collector expects, so it can be flattened into a ping body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Schedule {
    #[serde(rename = "schedule_period")]
    pub period: Period,
    #[serde(rename = "schedule_number")]
    pub count: u32,
}

impl Schedule {
    pub fn new(period: Period, count: u32) -> Option<Self> {
        (count > 0).then_some(Self { period, count })
    }

    /// Parse a schedule expression.
    ///
    /// Input is trimmed and lowercased, then matched against the six
    /// keywords (`minutely` .. `yearly`) and finally against
    /// `[every] <n> <period>[s]`. Returns `None` when neither matches or
    /// when `n` is zero or does not fit in a `u32`.
    pub fn parse(expression: &str) -> Option<Self> {
        let normalized = expression.trim().to_lowercase();

        if let Some(period) = Period::from_keyword(&normalized) {
            return Some(Self { period, count: 1 });
        }

        let caps = pattern().captures(&normalized)?;
        let count = caps[1].parse::<u32>().ok()?;
        let period = Period::from_noun(&caps[2])?;
        Self::new(period, count)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.count == 1 { "" } else { "s" };
        write!(f, "every {} {}{plural}", self.count, self.period)
    }
}

fn pattern() -> &'static regex::Regex {
    static SCHEDULE_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    SCHEDULE_REGEX.get_or_init(|| {
        regex::Regex::new(r"^(?:every\s+)?(\d+)\s*(minute|hour|day|week|month|year)s?$")
            .expect("failed to compile schedule regex")
    })
}
