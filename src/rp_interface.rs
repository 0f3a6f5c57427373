// Shared types for the replica placement model.
//
// Everything here is plain data: time grid primitives, the member identifier
// and the tree construction policy. Behaviour lives in the rp_* modules.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One cell of a dataset: how many times this grid point was observed/received
pub type Count = u32;

/// Grid points are naive wall-clock timestamps (no timezone in the model)
pub type Timestamp = NaiveDateTime;

/// Unique member name within a network; also the assignment tree value
pub type MemberName = String;

/// Column (dataset) name; owned by exactly one member of a network
pub type ColumnName = String;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid frequency '{0}' (expected e.g. 30s, 15min, 1h, 1d, 1w)")]
    InvalidFrequency(String),

    #[error("invalid timestamp '{0}' (expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)")]
    InvalidTimestamp(String),
}

// ============================================================================
// Frequency
// ============================================================================

/// Step between two consecutive grid points.
///
/// Stored as whole milliseconds so that grid arithmetic stays in integers.
/// Always strictly positive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Frequency {
    millis: i64,
}

impl Frequency {
    pub const MILLISECOND: i64 = 1;
    pub const SECOND: i64 = 1_000;
    pub const MINUTE: i64 = 60 * Self::SECOND;
    pub const HOUR: i64 = 60 * Self::MINUTE;
    pub const DAY: i64 = 24 * Self::HOUR;
    pub const WEEK: i64 = 7 * Self::DAY;

    /// Returns None for zero or negative steps
    pub fn from_millis(millis: i64) -> Option<Self> {
        (millis > 0).then_some(Self { millis })
    }

    // Zero counts are bumped to one step.
    pub fn seconds(n: u32) -> Self {
        Self { millis: i64::from(n.max(1)) * Self::SECOND }
    }

    pub fn minutes(n: u32) -> Self {
        Self { millis: i64::from(n.max(1)) * Self::MINUTE }
    }

    pub fn hours(n: u32) -> Self {
        Self { millis: i64::from(n.max(1)) * Self::HOUR }
    }

    pub fn days(n: u32) -> Self {
        Self { millis: i64::from(n.max(1)) * Self::DAY }
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    pub fn as_duration(&self) -> Duration {
        Duration::milliseconds(self.millis)
    }

    /// Number of whole steps between `from` and `to`, rounded towards -inf,
    /// plus whether `to` sits exactly on the grid anchored at `from`.
    pub fn steps_between(&self, from: Timestamp, to: Timestamp) -> (i64, bool) {
        let offset = (to - from).num_milliseconds();
        (offset.div_euclid(self.millis), offset.rem_euclid(self.millis) == 0)
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::hours(1)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = [
            (Self::WEEK, "w"),
            (Self::DAY, "d"),
            (Self::HOUR, "h"),
            (Self::MINUTE, "min"),
            (Self::SECOND, "s"),
        ];
        for (size, suffix) in units {
            if self.millis % size == 0 {
                return write!(f, "{}{}", self.millis / size, suffix);
            }
        }
        write!(f, "{}ms", self.millis)
    }
}

impl FromStr for Frequency {
    type Err = ParseError;

    /// Accepts pandas-like offsets: an optional count followed by a unit
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (count, unit) = trimmed.split_at(split);

        let count: i64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| ParseError::InvalidFrequency(s.to_string()))?
        };

        let unit = match unit.trim() {
            "ms" | "L" => Self::MILLISECOND,
            "s" | "S" | "sec" => Self::SECOND,
            "min" | "T" => Self::MINUTE,
            "h" | "H" => Self::HOUR,
            "d" | "D" => Self::DAY,
            "w" | "W" => Self::WEEK,
            _ => return Err(ParseError::InvalidFrequency(s.to_string())),
        };

        count
            .checked_mul(unit)
            .and_then(Self::from_millis)
            .ok_or_else(|| ParseError::InvalidFrequency(s.to_string()))
    }
}

impl<'de> serde::Deserialize<'de> for Frequency {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` or the `T`-separated variant
pub fn parse_timestamp(s: &str) -> Result<Timestamp, ParseError> {
    let s = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ParseError::InvalidTimestamp(s.to_string()))
}

// ============================================================================
// Time ranges
// ============================================================================

/// Contiguous span of time. The start is always inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
    pub end_inclusive: bool,
}

impl TimeRange {
    /// `[start, end]`
    pub fn closed(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
            end_inclusive: true,
        }
    }

    /// `[start, end)`
    pub fn half_open(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
            end_inclusive: false,
        }
    }

    pub fn point(at: Timestamp) -> Self {
        Self::closed(at, at)
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        t >= self.start && (t < self.end || (self.end_inclusive && t == self.end))
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start || (self.end == self.start && !self.end_inclusive)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let close = if self.end_inclusive { ']' } else { ')' };
        write!(f, "[{}, {}{}", self.start, self.end, close)
    }
}

// ============================================================================
// Tree construction policy
// ============================================================================

/// How the assignment tree is laid out over the insertion-ordered members
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, serde::Deserialize)]
pub enum TreePolicy {
    /// breadth-first from right to left
    #[serde(rename = "ordered_rtol")]
    OrderedRtoL,
    /// breadth-first from left to right
    #[serde(rename = "ordered_ltor")]
    OrderedLtoR,
    /// shallowest branch first from right to left
    #[serde(rename = "balanced_rtol")]
    BalancedRtoL,
    /// shallowest branch first from left to right
    #[default]
    #[serde(rename = "balanced_ltor")]
    BalancedLtoR,
    /// shallowest branch first, randomly chosen direction per insertion
    #[serde(rename = "balanced_random")]
    BalancedRandom,
}

impl TreePolicy {
    pub const ALL: [TreePolicy; 5] = [
        TreePolicy::OrderedRtoL,
        TreePolicy::OrderedLtoR,
        TreePolicy::BalancedRtoL,
        TreePolicy::BalancedLtoR,
        TreePolicy::BalancedRandom,
    ];
}

impl fmt::Display for TreePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TreePolicy::OrderedRtoL => "ordered_rtol",
            TreePolicy::OrderedLtoR => "ordered_ltor",
            TreePolicy::BalancedRtoL => "balanced_rtol",
            TreePolicy::BalancedLtoR => "balanced_ltor",
            TreePolicy::BalancedRandom => "balanced_random",
        };
        f.write_str(name)
    }
}
