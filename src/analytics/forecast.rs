//! Forecast Engine - straight-line revenue projection.
//!
//! Fits ordinary least squares of revenue against day offset over every
//! historical row, then extends the line one calendar day at a time past the
//! last observed date. No seasonality, no confidence interval.

use super::{mean, TimePoint, TimeSeries};
use crate::dataset::{Dataset, DATE, REVENUE};
use crate::error::Result;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_FORECAST_PERIODS: usize = 30;

/// Degree-1 least-squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares over paired samples.
///
/// `None` with fewer than two points, mismatched lengths, or when every `x`
/// is identical (the slope is undefined).
pub fn fit_linear_trend(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxx += (x - mean_x).powi(2);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Projects revenue `periods` days past the last historical date.
///
/// Returns `Ok(None)` ("not enough data to forecast") when `Date` or
/// `Revenue` is missing, there are fewer than two usable rows, or all rows
/// fall on the same day. Predictions are floored at zero.
pub fn generate_forecast(dataset: &Dataset, periods: usize) -> Result<Option<TimeSeries>> {
    if dataset.height() < 2 {
        return Ok(None);
    }
    let Some(dates) = dataset.dates(DATE) else {
        debug!("No '{}' column, skipping forecast", DATE);
        return Ok(None);
    };
    let Some(revenue) = dataset.numeric_values(REVENUE)? else {
        debug!("No '{}' column, skipping forecast", REVENUE);
        return Ok(None);
    };

    let mut history: Vec<(NaiveDate, f64)> = dates
        .into_iter()
        .zip(revenue)
        .filter_map(|(date, value)| Some((date?, value?)))
        .collect();
    if history.len() < 2 {
        return Ok(None);
    }
    history.sort_by_key(|(date, _)| *date);

    let first = history[0].0;
    let last = history[history.len() - 1].0;
    let day_offset = |date: NaiveDate| (date - first).num_days() as f64;

    let xs: Vec<f64> = history.iter().map(|(date, _)| day_offset(*date)).collect();
    let ys: Vec<f64> = history.iter().map(|(_, value)| *value).collect();
    let Some(fit) = fit_linear_trend(&xs, &ys) else {
        debug!("All revenue rows share one date, skipping forecast");
        return Ok(None);
    };
    debug!(
        "Revenue trend fit: slope={:.4}, intercept={:.4}",
        fit.slope, fit.intercept
    );

    let points = (1..=periods as u64)
        .filter_map(|step| last.checked_add_days(Days::new(step)))
        .map(|date| TimePoint {
            date,
            value: fit.predict(day_offset(date)).max(0.0),
        })
        .collect();
    Ok(Some(TimeSeries::new(points)))
}

/// Historical trend followed by the forecast, for a single continuous chart.
pub fn combine_with_history(history: &TimeSeries, forecast: &TimeSeries) -> TimeSeries {
    TimeSeries::new(
        history
            .iter()
            .chain(forecast.iter())
            .copied()
            .collect(),
    )
}
