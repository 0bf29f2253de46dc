//! Trend Analyzer - revenue summed per date.

use super::TimeSeries;
use crate::dataset::{Dataset, DATE, EXPENSES, REVENUE};
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Revenue and expenses booked on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonPoint {
    pub date: NaiveDate,
    pub revenue: f64,
    pub expenses: f64,
}

/// Revenue per date, ascending. Empty when `Date` or `Revenue` is missing.
pub fn revenue_trend(dataset: &Dataset) -> Result<TimeSeries> {
    match totals_by_date(dataset, REVENUE)? {
        Some(totals) => Ok(totals.into_iter().collect()),
        None => {
            debug!("No '{}'/'{}' columns, revenue trend is empty", DATE, REVENUE);
            Ok(TimeSeries::default())
        }
    }
}

/// Revenue next to expenses per date. Empty unless both columns and `Date`
/// are present.
pub fn revenue_vs_expenses(dataset: &Dataset) -> Result<Vec<ComparisonPoint>> {
    let (Some(revenue), Some(expenses)) = (
        totals_by_date(dataset, REVENUE)?,
        totals_by_date(dataset, EXPENSES)?,
    ) else {
        return Ok(Vec::new());
    };

    // Both maps are keyed by the same date column, so the key sets match.
    Ok(revenue
        .into_iter()
        .map(|(date, revenue)| ComparisonPoint {
            date,
            revenue,
            expenses: expenses.get(&date).copied().unwrap_or(0.0),
        })
        .collect())
}

/// Sums `column` per date. Rows without a readable date are skipped and a
/// missing value counts as zero.
pub(crate) fn totals_by_date(
    dataset: &Dataset,
    column: &str,
) -> Result<Option<BTreeMap<NaiveDate, f64>>> {
    let Some(dates) = dataset.dates(DATE) else {
        return Ok(None);
    };
    let Some(values) = dataset.numeric_values(column)? else {
        return Ok(None);
    };

    let mut totals = BTreeMap::new();
    for (date, value) in dates.into_iter().zip(values) {
        if let Some(date) = date {
            *totals.entry(date).or_insert(0.0) += value.unwrap_or(0.0);
        }
    }
    Ok(Some(totals))
}
