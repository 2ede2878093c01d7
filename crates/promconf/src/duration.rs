//! Prometheus duration strings (`5m`, `1h30m`, `90d`, `0`).

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

static RE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)y)?(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$")
        .unwrap()
});

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: u64 = 7 * MS_PER_DAY;
const MS_PER_YEAR: u64 = 365 * MS_PER_DAY;

/// Unit multipliers in the order the capture groups appear.
const UNITS: [u64; 7] = [
    MS_PER_YEAR,
    MS_PER_WEEK,
    MS_PER_DAY,
    MS_PER_HOUR,
    MS_PER_MINUTE,
    MS_PER_SECOND,
    1,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration string")]
    Empty,

    #[error("not a valid duration string: {0:?}")]
    Invalid(String),

    #[error("duration out of range: {0:?}")]
    OutOfRange(String),
}

/// A millisecond-precision duration with Prometheus text syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromDuration(Duration);

impl PromDuration {
    pub const ZERO: PromDuration = PromDuration(Duration::ZERO);

    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn parse(s: &str) -> Result<Self, DurationError> {
        if s.is_empty() {
            return Err(DurationError::Empty);
        }
        if s == "0" {
            return Ok(Self::ZERO);
        }

        let caps = RE_DURATION
            .captures(s)
            .ok_or_else(|| DurationError::Invalid(s.to_string()))?;

        let mut total: u64 = 0;
        for (i, unit) in UNITS.iter().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                let n: u64 = m
                    .as_str()
                    .parse()
                    .map_err(|_| DurationError::OutOfRange(s.to_string()))?;
                total = n
                    .checked_mul(*unit)
                    .and_then(|v| total.checked_add(v))
                    .ok_or_else(|| DurationError::OutOfRange(s.to_string()))?;
            }
        }

        Ok(Self::from_millis(total))
    }
}

impl From<Duration> for PromDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl std::str::FromStr for PromDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PromDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ms = self.0.as_millis() as u64;
        if ms == 0 {
            return f.write_str("0s");
        }

        // Years and weeks are only used when they divide evenly; 90d reads
        // better than 12w6d.
        let parts: [(&str, u64, bool); 7] = [
            ("y", MS_PER_YEAR, true),
            ("w", MS_PER_WEEK, true),
            ("d", MS_PER_DAY, false),
            ("h", MS_PER_HOUR, false),
            ("m", MS_PER_MINUTE, false),
            ("s", MS_PER_SECOND, false),
            ("ms", 1, false),
        ];
        for (unit, mult, exact) in parts {
            if exact && ms % mult != 0 {
                continue;
            }
            let v = ms / mult;
            if v > 0 {
                write!(f, "{}{}", v, unit)?;
                ms -= v * mult;
            }
        }
        Ok(())
    }
}

impl Serialize for PromDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct PromDurationVisitor;

impl Visitor<'_> for PromDurationVisitor {
    type Value = PromDuration;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a duration string such as \"1m\" or \"1h30m\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PromDuration, E> {
        PromDuration::parse(v).map_err(E::custom)
    }

    // A bare `0` arrives as an integer from YAML.
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PromDuration, E> {
        if v == 0 {
            Ok(PromDuration::ZERO)
        } else {
            Err(E::custom(DurationError::Invalid(v.to_string())))
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PromDuration, E> {
        if v == 0 {
            Ok(PromDuration::ZERO)
        } else {
            Err(E::custom(DurationError::Invalid(v.to_string())))
        }
    }
}

impl<'de> Deserialize<'de> for PromDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PromDurationVisitor)
    }
}
