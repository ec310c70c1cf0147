use crate::{error::FetchError, model::trade::DATE_FORMAT};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Column-oriented response of `/pair_candles`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PairCandlesResponse {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

/// One OHLCV bar keyed by its open time.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

struct ColumnIndex {
    date_ts: Option<usize>,
    date: Option<usize>,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl ColumnIndex {
    fn from_columns(columns: &[String]) -> Result<Self, FetchError> {
        let find = |name: &str| columns.iter().position(|column| column == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                FetchError::malformed("/api/v1/pair_candles", format!("missing column {name}"))
            })
        };

        let index = Self {
            date_ts: find("__date_ts"),
            date: find("date"),
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        };

        if index.date_ts.is_none() && index.date.is_none() {
            return Err(FetchError::malformed(
                "/api/v1/pair_candles",
                "missing date column",
            ));
        }
        Ok(index)
    }

    fn candle(&self, row: &[Value]) -> Option<Candle> {
        let time = self
            .date_ts
            .and_then(|index| row.get(index)?.as_i64())
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| {
                let date = row.get(self.date?)?.as_str()?;
                NaiveDateTime::parse_from_str(date, DATE_FORMAT)
                    .ok()
                    .map(|naive| naive.and_utc())
            })?;

        Some(Candle {
            time,
            open: row.get(self.open)?.as_f64()?,
            high: row.get(self.high)?.as_f64()?,
            low: row.get(self.low)?.as_f64()?,
            close: row.get(self.close)?.as_f64()?,
            volume: self
                .volume
                .and_then(|index| row.get(index)?.as_f64())
                .unwrap_or_default(),
        })
    }
}

impl PairCandlesResponse {
    /// Normalize into ascending bars, skipping rows with missing prices.
    pub fn into_candles(self) -> Result<Vec<Candle>, FetchError> {
        if self.data.is_empty() {
            return Ok(Vec::new());
        }

        let index = ColumnIndex::from_columns(&self.columns)?;
        let mut candles: Vec<Candle> = self
            .data
            .iter()
            .filter_map(|row| index.candle(row))
            .collect();
        candles.sort_by_key(|candle| candle.time);
        Ok(candles)
    }
}
