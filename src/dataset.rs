//! Dataset - the tabular input shared by every analytic component.
//!
//! Wraps a polars `DataFrame` and answers capability queries ("is there a
//! `Revenue` column?", "give me `Date` as calendar dates"). Column presence is
//! never guaranteed, so nothing here fails just because a column is missing.

use crate::error::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::debug;

pub const DATE: &str = "Date";
pub const REVENUE: &str = "Revenue";
pub const EXPENSES: &str = "Expenses";
pub const SALES_VOLUME: &str = "Sales_Volume";
pub const PROFIT: &str = "Profit";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Semantic type of a column, as seen by the analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Datetime,
    Numeric,
    Text,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Date | DataType::Datetime(_, _) => ColumnKind::Datetime,
            dt if dt.is_numeric() => ColumnKind::Numeric,
            _ => ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.frame.column(name).ok().map(|s| ColumnKind::of(s.dtype()))
    }

    /// Names of all numeric columns, in column order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .filter(|s| ColumnKind::of(s.dtype()) == ColumnKind::Numeric)
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Column values as `f64`, one entry per row. Nulls, NaN and text that
    /// does not parse as a number come back as `None`.
    ///
    /// Returns `Ok(None)` when the column is absent or holds dates.
    pub fn numeric_values(&self, name: &str) -> Result<Option<Vec<Option<f64>>>> {
        let series = match self.frame.column(name) {
            Ok(s) => s,
            Err(_) => return Ok(None),
        };
        if ColumnKind::of(series.dtype()) == ColumnKind::Datetime {
            return Ok(None);
        }

        let casted = series.cast(&DataType::Float64)?;
        let values = casted
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Ok(Some(values))
    }

    /// Column values as calendar dates, one entry per row.
    ///
    /// Accepts `Date`, `Datetime` and string columns; anything that cannot be
    /// read as a date is `None`.
    pub fn dates(&self, name: &str) -> Option<Vec<Option<NaiveDate>>> {
        let series = self.frame.column(name).ok()?;
        let dates = (0..series.len())
            .map(|idx| series.get(idx).ok().and_then(|v| any_value_to_date(&v)))
            .collect();
        Some(dates)
    }

    /// Re-types the `Date` column as a polars `Date`, truncating any time of
    /// day. Returns the dataset unchanged when there is no `Date` column.
    pub fn normalize_dates(self) -> Result<Self> {
        let dtype = match self.frame.column(DATE) {
            Ok(series) => series.dtype().clone(),
            Err(_) => return Ok(self),
        };
        if dtype == DataType::Date {
            return Ok(self);
        }

        let dates = self.dates(DATE).unwrap_or_default();
        let unparsed = dates.iter().filter(|d| d.is_none()).count();
        if unparsed > 0 {
            debug!("{} value(s) in '{}' could not be read as dates", unparsed, DATE);
        }

        let mut frame = self.into_frame();
        frame.with_column(Series::new(DATE, dates))?;
        Ok(Self { frame })
    }

    /// Derives `Profit = Revenue - Expenses` as a new column.
    ///
    /// An existing `Profit` column is kept as is; without both inputs the
    /// dataset is returned unchanged.
    pub fn with_profit(self) -> Result<Self> {
        if self.has_column(PROFIT) || !self.has_column(REVENUE) || !self.has_column(EXPENSES) {
            return Ok(self);
        }

        let frame = self
            .frame
            .lazy()
            .with_columns([(col(REVENUE).cast(DataType::Float64)
                - col(EXPENSES).cast(DataType::Float64))
            .alias(PROFIT)])
            .collect()?;
        Ok(Self { frame })
    }

    /// Rows where `mask` is true, as a new dataset.
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("mask", mask);
        Ok(Self::new(self.frame.filter(&mask)?))
    }
}

impl From<DataFrame> for Dataset {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.frame)
    }
}

/// Parses the date formats commonly found in exported business sheets.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
}

fn any_value_to_date(value: &AnyValue) -> Option<NaiveDate> {
    match value {
        AnyValue::Date(days) => DateTime::UNIX_EPOCH
            .date_naive()
            .checked_add_signed(Duration::days(i64::from(*days))),
        AnyValue::Datetime(ts, unit, _) => {
            let millis = match unit {
                TimeUnit::Nanoseconds => ts.div_euclid(1_000_000),
                TimeUnit::Microseconds => ts.div_euclid(1_000),
                TimeUnit::Milliseconds => *ts,
            };
            DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
        }
        AnyValue::String(text) => parse_date(text),
        _ => None,
    }
}
