//! Analytics pipeline
//!
//! Pure functions over a [`Dataset`](crate::dataset::Dataset): each one takes
//! an immutable snapshot and returns a freshly computed result.

pub mod aggregation;
pub mod anomaly;
pub mod correlation;
pub mod forecast;
pub mod kpi;
pub mod quality;
pub mod scenario;
pub mod trend;

use chrono::NaiveDate;
use serde::Serialize;

/// One point of a date-keyed series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Date-ordered series of values (revenue trend, forecast).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSeries {
    points: Vec<TimePoint>,
}

impl TimeSeries {
    /// Builds a series from points already in ascending date order.
    pub fn new(points: Vec<TimePoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.iter().find(|p| p.date == date).map(|p| p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimePoint> {
        self.points.iter()
    }
}

impl FromIterator<(NaiveDate, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(date, value)| TimePoint { date, value })
                .collect(),
        )
    }
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (N - 1 denominator); `None` below two values.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sq_diff: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sq_diff / (values.len() - 1) as f64).sqrt())
}
