use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Time unit of a repeating interval (`every(3).minutes()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
}

impl IntervalUnit {
    /// Length of a single unit.
    pub fn as_duration(self) -> Duration {
        match self {
            IntervalUnit::Seconds => Duration::from_secs(1),
            IntervalUnit::Minutes => Duration::from_secs(60),
            IntervalUnit::Hours => Duration::from_secs(60 * 60),
        }
    }

    /// `count` units as a duration. `None` on overflow.
    pub fn times(self, count: u32) -> Option<Duration> {
        self.as_duration().checked_mul(count)
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntervalUnit::Seconds => "seconds",
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for IntervalUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "seconds" | "second" | "s" => Ok(IntervalUnit::Seconds),
            "minutes" | "minute" | "m" => Ok(IntervalUnit::Minutes),
            "hours" | "hour" | "h" => Ok(IntervalUnit::Hours),
            other => Err(format!("unknown interval unit: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_scale_by_count() {
        assert_eq!(IntervalUnit::Seconds.times(5), Some(Duration::from_secs(5)));
        assert_eq!(IntervalUnit::Minutes.times(2), Some(Duration::from_secs(120)));
        assert_eq!(IntervalUnit::Hours.times(1), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn unit_parses_long_and_short_forms() {
        assert_eq!("minutes".parse::<IntervalUnit>(), Ok(IntervalUnit::Minutes));
        assert_eq!("h".parse::<IntervalUnit>(), Ok(IntervalUnit::Hours));
        assert!("fortnights".parse::<IntervalUnit>().is_err());
    }

    #[test]
    fn display_matches_serde_name() {
        assert_eq!(IntervalUnit::Seconds.to_string(), "seconds");
    }
}
