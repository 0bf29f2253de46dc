//! Aggregation Step - date filtering and resampling that run before the
//! analytics, so every component sees the same rows.

use crate::dataset::{Dataset, DATE};
use crate::error::{DashboardError, Result};
use chrono::{Datelike, Days, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// The date that labels the period containing `date`: the date itself,
    /// the Sunday closing its week, or the last day of its month.
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => {
                let to_sunday = 6 - date.weekday().num_days_from_monday();
                date.checked_add_days(Days::new(u64::from(to_sunday)))
                    .unwrap_or(date)
            }
            Granularity::Monthly => month_end(date),
        }
    }

    fn next_period_end(self, period_end: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Daily => period_end.succ_opt(),
            Granularity::Weekly => period_end.checked_add_days(Days::new(7)),
            Granularity::Monthly => period_end.succ_opt().map(month_end),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Granularity::Daily => "Daily",
            Granularity::Weekly => "Weekly",
            Granularity::Monthly => "Monthly",
        };
        f.write_str(label)
    }
}

impl FromStr for Granularity {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "d" => Ok(Granularity::Daily),
            "weekly" | "w" => Ok(Granularity::Weekly),
            "monthly" | "m" => Ok(Granularity::Monthly),
            other => Err(DashboardError::InvalidInput(format!(
                "Unknown granularity '{}' (expected daily, weekly or monthly)",
                other
            ))),
        }
    }
}

/// Keeps rows dated within `[start, end]`, both bounds optional and
/// inclusive. Rows without a readable date are dropped once a bound is set.
/// Without a `Date` column the dataset comes back unchanged.
pub fn filter_date_range(
    dataset: &Dataset,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Dataset> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(DashboardError::InvalidInput(format!(
                "Start date {} is after end date {}",
                s, e
            )));
        }
    }
    if start.is_none() && end.is_none() {
        return Ok(dataset.clone());
    }
    let Some(dates) = dataset.dates(DATE) else {
        return Ok(dataset.clone());
    };

    let mask: Vec<bool> = dates
        .into_iter()
        .map(|date| {
            date.is_some_and(|d| start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e))
        })
        .collect();
    let filtered = dataset.filter(&mask)?;
    debug!(
        "Date filter kept {} of {} rows",
        filtered.height(),
        dataset.height()
    );
    Ok(filtered)
}

/// Resamples to `granularity` by summing every numeric column per period.
///
/// `Daily` is the identity. Coarser levels return `Date` (the period end)
/// followed by the numeric columns as `f64`; text columns are dropped and
/// periods with no rows between the first and last one are filled with
/// zeros.
pub fn aggregate(dataset: &Dataset, granularity: Granularity) -> Result<Dataset> {
    if granularity == Granularity::Daily {
        return Ok(dataset.clone());
    }
    let Some(dates) = dataset.dates(DATE) else {
        debug!("No '{}' column, skipping {} aggregation", DATE, granularity);
        return Ok(dataset.clone());
    };

    let names = dataset.numeric_columns();
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(dataset.numeric_values(name)?.unwrap_or_default());
    }

    let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (row, date) in dates.iter().enumerate() {
        let Some(date) = date else { continue };
        let sums = buckets
            .entry(granularity.period_end(*date))
            .or_insert_with(|| vec![0.0; names.len()]);
        for (sum, values) in sums.iter_mut().zip(&columns) {
            *sum += values.get(row).copied().flatten().unwrap_or(0.0);
        }
    }

    if let (Some(first), Some(last)) = (
        buckets.keys().next().copied(),
        buckets.keys().next_back().copied(),
    ) {
        let mut period = Some(first);
        while let Some(end) = period.filter(|p| *p <= last) {
            buckets.entry(end).or_insert_with(|| vec![0.0; names.len()]);
            period = granularity.next_period_end(end);
        }
    }

    let period_dates: Vec<NaiveDate> = buckets.keys().copied().collect();
    let mut series = Vec::with_capacity(names.len() + 1);
    series.push(Series::new(DATE, period_dates));
    for (idx, name) in names.iter().enumerate() {
        let sums: Vec<f64> = buckets.values().map(|sums| sums[idx]).collect();
        series.push(Series::new(name, sums));
    }

    let frame = DataFrame::new(series)?;
    info!(
        "{} aggregation: {} rows -> {} periods",
        granularity,
        dataset.height(),
        frame.height()
    );
    Ok(Dataset::new(frame))
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}
