use crate::domain::errors::ForecastError;
use crate::domain::market::candle::OhlcvBar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One candle plus its technical indicators.
///
/// Indicator fields are `NaN` while their window still lacks history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRow {
    pub bar: OhlcvBar,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub ema_50: f64,
    pub ema_200: f64,
    pub doji: f64,
    pub engulfing: f64,
    pub avg_volume_10: f64,
    pub avg_volume_50: f64,
    pub volume_ratio: f64,
    pub rolling_high_252: f64,
    pub distance_from_high: f64,
    pub rs_line: f64,
    pub rs_rating: f64,
    pub master_score: f64,
}

impl IndicatorRow {
    /// Row with every indicator undefined.
    pub fn undefined(bar: OhlcvBar) -> Self {
        Self {
            bar,
            rsi: f64::NAN,
            macd: f64::NAN,
            macd_signal: f64::NAN,
            macd_hist: f64::NAN,
            ema_50: f64::NAN,
            ema_200: f64::NAN,
            doji: f64::NAN,
            engulfing: f64::NAN,
            avg_volume_10: f64::NAN,
            avg_volume_50: f64::NAN,
            volume_ratio: f64::NAN,
            rolling_high_252: f64::NAN,
            distance_from_high: f64::NAN,
            rs_line: f64::NAN,
            rs_rating: f64::NAN,
            master_score: f64::NAN,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.bar.timestamp
    }

    pub fn get(&self, column: IndicatorColumn) -> f64 {
        match column {
            IndicatorColumn::Rsi => self.rsi,
            IndicatorColumn::Macd => self.macd,
            IndicatorColumn::MacdSignal => self.macd_signal,
            IndicatorColumn::MacdHist => self.macd_hist,
            IndicatorColumn::Ema50 => self.ema_50,
            IndicatorColumn::Ema200 => self.ema_200,
            IndicatorColumn::Doji => self.doji,
            IndicatorColumn::Engulfing => self.engulfing,
            IndicatorColumn::AvgVolume10 => self.avg_volume_10,
            IndicatorColumn::AvgVolume50 => self.avg_volume_50,
            IndicatorColumn::VolumeRatio => self.volume_ratio,
            IndicatorColumn::RollingHigh252 => self.rolling_high_252,
            IndicatorColumn::DistanceFromHigh => self.distance_from_high,
            IndicatorColumn::RsLine => self.rs_line,
            IndicatorColumn::RsRating => self.rs_rating,
            IndicatorColumn::MasterScore => self.master_score,
        }
    }
}

/// Named indicator slots of an [`IndicatorRow`].
///
/// Column names are fixed; the periods behind them come from `IndicatorConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorColumn {
    Rsi,
    Macd,
    MacdSignal,
    MacdHist,
    #[serde(rename = "ema_50")]
    Ema50,
    #[serde(rename = "ema_200")]
    Ema200,
    Doji,
    Engulfing,
    #[serde(rename = "avg_volume_10")]
    AvgVolume10,
    #[serde(rename = "avg_volume_50")]
    AvgVolume50,
    VolumeRatio,
    #[serde(rename = "rolling_high_252")]
    RollingHigh252,
    DistanceFromHigh,
    RsLine,
    RsRating,
    MasterScore,
}

impl IndicatorColumn {
    /// Columns computed from the candle series alone.
    pub const ALL: [IndicatorColumn; 13] = [
        IndicatorColumn::Rsi,
        IndicatorColumn::Macd,
        IndicatorColumn::MacdSignal,
        IndicatorColumn::MacdHist,
        IndicatorColumn::Ema50,
        IndicatorColumn::Ema200,
        IndicatorColumn::Doji,
        IndicatorColumn::Engulfing,
        IndicatorColumn::AvgVolume10,
        IndicatorColumn::AvgVolume50,
        IndicatorColumn::VolumeRatio,
        IndicatorColumn::RollingHigh252,
        IndicatorColumn::DistanceFromHigh,
    ];

    /// Relative strength against a benchmark index; need a benchmark series.
    pub const RELATIVE: [IndicatorColumn; 3] = [
        IndicatorColumn::RsLine,
        IndicatorColumn::RsRating,
        IndicatorColumn::MasterScore,
    ];

    pub fn needs_benchmark(&self) -> bool {
        Self::RELATIVE.contains(self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorColumn::Rsi => "rsi",
            IndicatorColumn::Macd => "macd",
            IndicatorColumn::MacdSignal => "macd_signal",
            IndicatorColumn::MacdHist => "macd_hist",
            IndicatorColumn::Ema50 => "ema_50",
            IndicatorColumn::Ema200 => "ema_200",
            IndicatorColumn::Doji => "doji",
            IndicatorColumn::Engulfing => "engulfing",
            IndicatorColumn::AvgVolume10 => "avg_volume_10",
            IndicatorColumn::AvgVolume50 => "avg_volume_50",
            IndicatorColumn::VolumeRatio => "volume_ratio",
            IndicatorColumn::RollingHigh252 => "rolling_high_252",
            IndicatorColumn::DistanceFromHigh => "distance_from_high",
            IndicatorColumn::RsLine => "rs_line",
            IndicatorColumn::RsRating => "rs_rating",
            IndicatorColumn::MasterScore => "master_score",
        }
    }
}

impl FromStr for IndicatorColumn {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndicatorColumn::ALL
            .iter()
            .chain(IndicatorColumn::RELATIVE.iter())
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| ForecastError::UnknownColumn(s.to_string()))
    }
}

impl fmt::Display for IndicatorColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
