use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling interval of a candle series.
///
/// Forecast timestamps advance by exactly one interval per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1m")]
    OneMin,
    #[serde(rename = "5m")]
    FiveMin,
    #[serde(rename = "15m")]
    FifteenMin,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    /// Returns the duration in seconds
    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    /// Returns the duration in milliseconds (candle timestamps are epoch millis)
    pub fn to_millis(&self) -> i64 {
        self.to_seconds() * 1000
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Timestamp `steps` intervals after `timestamp_ms`.
    pub fn advance(&self, timestamp_ms: i64, steps: usize) -> i64 {
        timestamp_ms + self.to_millis() * steps as i64
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" | "onemin" => Ok(Timeframe::OneMin),
            "5m" | "5min" | "fivemin" => Ok(Timeframe::FiveMin),
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "1h" | "1hour" | "onehour" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "oneday" => Ok(Timeframe::OneDay),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: 1m, 5m, 15m, 1h, 4h, 1d",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(Timeframe::OneMin.to_minutes(), 1);
        assert_eq!(Timeframe::FiveMin.to_minutes(), 5);
        assert_eq!(Timeframe::FifteenMin.to_minutes(), 15);
        assert_eq!(Timeframe::OneHour.to_minutes(), 60);
        assert_eq!(Timeframe::FourHour.to_minutes(), 240);
        assert_eq!(Timeframe::OneDay.to_minutes(), 1440);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Timeframe::from_str("1m").unwrap(), Timeframe::OneMin);
        assert_eq!(Timeframe::from_str("1Min").unwrap(), Timeframe::OneMin);
        assert_eq!(Timeframe::from_str("5m").unwrap(), Timeframe::FiveMin);
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::OneHour);
        assert_eq!(Timeframe::from_str("4Hour").unwrap(), Timeframe::FourHour);
        assert_eq!(Timeframe::from_str("1d").unwrap(), Timeframe::OneDay);
        assert!(Timeframe::from_str("invalid").is_err());
    }

    #[test]
    fn test_advance() {
        assert_eq!(Timeframe::OneMin.advance(0, 3), 180_000);
        assert_eq!(Timeframe::OneHour.advance(1_000, 1), 3_601_000);
    }
}
