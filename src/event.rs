//! Report events: the three things a caller can tell the collector.
//!
//! Each event knows which collector endpoint it belongs to and how to turn
//! itself into a JSON body. Optional fields that were never set are left
//! out of the body entirely rather than sent as `null`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::schedule::Schedule;

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Numeric input accepted by counts and measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Convert to an integer by truncating toward zero.
    ///
    /// `3.9` becomes `3` and `-3.9` becomes `-3`. NaN, infinities and
    /// floats outside the `i64` range are rejected.
    pub fn truncate(self) -> Result<i64> {
        match self {
            Self::Int(value) => Ok(value),
            Self::Float(value) => {
                // 2^63 is exactly representable; i64::MAX is not.
                const LIMIT: f64 = 9_223_372_036_854_775_808.0;
                let truncated = value.trunc();
                if truncated.is_finite() && (-LIMIT..LIMIT).contains(&truncated) {
                    Ok(truncated as i64)
                } else {
                    Err(Error::InvalidEvent(format!(
                        "{value} cannot be converted to an integer"
                    )))
                }
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Self::Int(_) => true,
            Self::Float(value) => value.is_finite(),
        }
    }
}

macro_rules! number_from {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for Number {
                fn from(value: $source) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

number_from!(Int as i64: i8, i16, i32, i64, u8, u16, u32);
number_from!(Float as f64: f32, f64);

// Values beyond i64 fall back to a float; counts then reject them as out of
// range instead of wrapping.
macro_rules! number_from_wide {
    ($($source:ty),+) => {
        $(
            impl From<$source> for Number {
                fn from(value: $source) -> Self {
                    i64::try_from(value).map_or(Self::Float(value as f64), Self::Int)
                }
            }
        )+
    };
}

number_from_wide!(u64, usize, isize);

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A heartbeat: "this recurring job just ran".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ping {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<u64>,
    #[serde(flatten)]
    pub schedule: Option<Schedule>,
}

impl Ping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grace_period: None,
            schedule: None,
        }
    }

    /// Attach a schedule expression. Expressions that do not parse are
    /// ignored and the ping goes out without a schedule.
    pub fn schedule(mut self, expression: &str) -> Self {
        self.schedule = Schedule::parse(expression);
        self
    }

    /// Attach an already-parsed schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// How late the next ping may arrive before the collector alerts.
    /// Sent as whole seconds.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = Some(grace.as_secs());
        self
    }
}

impl From<&str> for Ping {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Ping {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A named integer tally.
#[derive(Debug, Clone, PartialEq)]
pub struct Count {
    pub name: String,
    pub value: Number,
    /// Kept on the event for callers that inspect it; never transmitted.
    pub range: Option<String>,
}

impl Count {
    pub fn new(name: impl Into<String>, value: impl Into<Number>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            range: None,
        }
    }

    pub fn range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

#[derive(Serialize)]
struct CountBody<'a> {
    name: &'a str,
    count: i64,
}

/// A timestamped gauge sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub name: String,
    pub value: Number,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Measure {
    /// A measurement stamped with the current UTC time.
    pub fn new(name: impl Into<String>, value: impl Into<Number>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: None,
            timestamp: Utc::now(),
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Any event the client can report.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Ping(Ping),
    Count(Count),
    Measure(Measure),
}

impl ReportEvent {
    /// Collector endpoint name, as in `/api/{endpoint}.json`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Ping(_) => "ping",
            Self::Count(_) => "count",
            Self::Measure(_) => "measurements",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Ping(ping) => &ping.name,
            Self::Count(count) => &count.name,
            Self::Measure(measure) => &measure.name,
        }
    }

    /// Validate the event and build its JSON body.
    pub fn payload(&self) -> Result<serde_json::Value> {
        if self.name().trim().is_empty() {
            return Err(Error::InvalidEvent("event name is empty".to_string()));
        }

        let body = match self {
            Self::Ping(ping) => serde_json::to_value(ping)?,
            Self::Count(count) => serde_json::to_value(CountBody {
                name: &count.name,
                count: count.value.truncate()?,
            })?,
            Self::Measure(measure) => {
                if !measure.value.is_finite() {
                    return Err(Error::InvalidEvent(format!(
                        "measurement {:?} is not a finite number",
                        measure.name
                    )));
                }
                serde_json::to_value(measure)?
            }
        };
        Ok(body)
    }
}

impl From<Ping> for ReportEvent {
    fn from(ping: Ping) -> Self {
        Self::Ping(ping)
    }
}

impl From<Count> for ReportEvent {
    fn from(count: Count) -> Self {
        Self::Count(count)
    }
}

impl From<Measure> for ReportEvent {
    fn from(measure: Measure) -> Self {
        Self::Measure(measure)
    }
}
