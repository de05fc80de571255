//! CSV files in and out: candle history, scored news, forecast export.

use crate::domain::market::candle::{Candle, CandleStore};
use crate::domain::ml::forecast::Forecast;
use crate::domain::sentiment::SentimentSeries;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Extra columns (indicators written by other tools, etc.) are ignored.
#[derive(Debug, Deserialize)]
struct CandleRecord {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

#[derive(Debug, Deserialize)]
struct SentimentRecord {
    date: String,
    sentiment: Option<f64>,
}

/// Parses the timestamp layouts found in broker exports.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` with or without an offset, bare
/// dates, and integer epoch milliseconds. Values without an offset are UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let utc = FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid UTC offset"))?;

    if let Ok(ms) = raw.parse::<i64>() {
        return utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| anyhow!("epoch millis out of range: {}", raw));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    for format in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc().with_timezone(&utc));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date: {}", raw))?;
        return Ok(naive.and_utc().with_timezone(&utc));
    }
    Err(anyhow!("Unrecognized timestamp format: {}", raw))
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .with_context(|| format!("Invalid {} value '{}'", field, raw))
}

impl CandleRecord {
    fn into_candle(self, symbol: &str) -> Result<Candle> {
        Ok(Candle {
            symbol: symbol.to_string(),
            open: parse_decimal("open", &self.open)?,
            high: parse_decimal("high", &self.high)?,
            low: parse_decimal("low", &self.low)?,
            close: parse_decimal("close", &self.close)?,
            volume: parse_decimal("volume", &self.volume)?,
            timestamp: parse_timestamp(&self.timestamp)?.timestamp_millis(),
        })
    }
}

/// Reads `timestamp,open,high,low,close,volume` rows into an ordered store.
///
/// Duplicate timestamps keep the last row; candles failing validation are
/// skipped with a warning.
pub fn read_candles<R: Read>(reader: R, symbol: &str) -> Result<CandleStore> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut store = CandleStore::new(symbol);
    let mut rejected = 0;

    for (line, result) in rdr.deserialize::<CandleRecord>().enumerate() {
        let record = result.with_context(|| format!("Malformed candle row {}", line + 1))?;
        let candle = record
            .into_candle(symbol)
            .with_context(|| format!("Invalid candle row {}", line + 1))?;
        if !store.upsert(candle) {
            rejected += 1;
        }
    }

    if rejected > 0 {
        warn!("Rejected {} invalid candle(s) for {}", rejected, symbol);
    }
    Ok(store)
}

pub fn load_candles(path: impl AsRef<Path>, symbol: &str) -> Result<CandleStore> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open candle file {}", path.display()))?;
    let store = read_candles(BufReader::new(file), symbol)
        .with_context(|| format!("Failed to load candles from {}", path.display()))?;
    info!(
        "Loaded {} candles for {} from {:?}",
        store.len(),
        symbol,
        path
    );
    Ok(store)
}

/// Reads `date,sentiment` rows (one per scored item) and averages them per
/// calendar date. Rows with an empty score are skipped.
pub fn read_sentiment<R: Read>(reader: R) -> Result<SentimentSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut items = Vec::new();

    for (line, result) in rdr.deserialize::<SentimentRecord>().enumerate() {
        let record = result.with_context(|| format!("Malformed sentiment row {}", line + 1))?;
        let Some(score) = record.sentiment else {
            continue;
        };
        let date = parse_timestamp(&record.date)
            .with_context(|| format!("Invalid date on sentiment row {}", line + 1))?
            .date_naive();
        items.push((date, score));
    }

    Ok(SentimentSeries::from_scored_items(items))
}

pub fn load_sentiment(path: impl AsRef<Path>) -> Result<SentimentSeries> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open sentiment file {}", path.display()))?;
    let series = read_sentiment(BufReader::new(file))
        .with_context(|| format!("Failed to load sentiment from {}", path.display()))?;
    info!("Loaded sentiment for {} dates from {:?}", series.len(), path);
    Ok(series)
}

/// Writes `timestamp` (RFC 3339, UTC) plus one column per forecast field.
pub fn write_forecast<W: Write>(writer: W, forecast: &Forecast) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["timestamp".to_string()];
    header.extend(forecast.fields.iter().cloned());
    wtr.write_record(&header)
        .context("Failed to write forecast header")?;

    for point in &forecast.points {
        let timestamp = Utc
            .timestamp_millis_opt(point.timestamp)
            .single()
            .ok_or_else(|| anyhow!("Forecast timestamp out of range: {}", point.timestamp))?;
        let mut record = vec![timestamp.to_rfc3339()];
        record.extend(point.values.iter().map(|v| v.to_string()));
        wtr.write_record(&record)
            .context("Failed to write forecast row")?;
    }

    wtr.flush().context("Failed to flush forecast CSV")?;
    Ok(())
}

pub fn write_forecast_csv(path: impl AsRef<Path>, forecast: &Forecast) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create forecast file {}", path.display()))?;
    write_forecast(file, forecast)?;
    info!(
        "Saved {} forecast points for {} to {:?}",
        forecast.len(),
        forecast.symbol,
        path
    );
    Ok(())
}
