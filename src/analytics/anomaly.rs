//! Anomaly Detector - Z-score outliers in a single numeric column.

use super::{mean, sample_std};
use crate::dataset::{Dataset, DATE, EXPENSES, PROFIT, REVENUE, SALES_VOLUME};
use crate::error::{DashboardError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

/// Fewer rows than this never produce anomalies.
pub const MIN_ROWS: usize = 3;

/// The business metrics offered for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyTarget {
    Revenue,
    Expenses,
    Profit,
    SalesVolume,
}

impl AnomalyTarget {
    pub const ALL: [AnomalyTarget; 4] = [
        AnomalyTarget::Revenue,
        AnomalyTarget::Expenses,
        AnomalyTarget::Profit,
        AnomalyTarget::SalesVolume,
    ];

    pub fn column(self) -> &'static str {
        match self {
            AnomalyTarget::Revenue => REVENUE,
            AnomalyTarget::Expenses => EXPENSES,
            AnomalyTarget::Profit => PROFIT,
            AnomalyTarget::SalesVolume => SALES_VOLUME,
        }
    }
}

impl fmt::Display for AnomalyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for AnomalyTarget {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        AnomalyTarget::ALL
            .into_iter()
            .find(|t| t.column().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DashboardError::InvalidInput(format!("Unknown anomaly target: {}", s)))
    }
}

/// A flagged row, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyRow {
    pub row: usize,
    pub date: Option<NaiveDate>,
    pub value: f64,
    pub z_score: f64,
}

/// Per-row |z| for `column`, or `None` when the column cannot yield
/// anomalies: absent, fewer than [`MIN_ROWS`] rows, or zero variance.
/// Missing cells get `None`.
pub fn z_scores(dataset: &Dataset, column: &str) -> Result<Option<Vec<Option<f64>>>> {
    if dataset.height() < MIN_ROWS {
        return Ok(None);
    }
    let Some(values) = dataset.numeric_values(column)? else {
        debug!("Column '{}' not found, no anomalies", column);
        return Ok(None);
    };

    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let (Some(mu), Some(sigma)) = (mean(&present), sample_std(&present)) else {
        return Ok(None);
    };
    if sigma == 0.0 || !sigma.is_finite() {
        debug!("Column '{}' has no variance, no anomalies", column);
        return Ok(None);
    }

    Ok(Some(
        values
            .into_iter()
            .map(|v| v.map(|x| ((x - mu) / sigma).abs()))
            .collect(),
    ))
}

/// One flag per row, true where |value - mean| / std exceeds `threshold`.
///
/// All false for the degenerate cases described on [`z_scores`]. The
/// threshold is used as given.
pub fn detect_anomalies(dataset: &Dataset, column: &str, threshold: f64) -> Result<Vec<bool>> {
    let flags = match z_scores(dataset, column)? {
        Some(scores) => scores
            .into_iter()
            .map(|z| z.is_some_and(|z| z > threshold))
            .collect(),
        None => vec![false; dataset.height()],
    };
    Ok(flags)
}

/// The flagged rows as a new dataset, independent of the source.
pub fn get_anomaly_summary(dataset: &Dataset, column: &str, threshold: f64) -> Result<Dataset> {
    let flags = detect_anomalies(dataset, column, threshold)?;
    dataset.filter(&flags)
}

/// Position, date, value and score of every flagged row.
pub fn flagged_rows(dataset: &Dataset, column: &str, threshold: f64) -> Result<Vec<AnomalyRow>> {
    let Some(scores) = z_scores(dataset, column)? else {
        return Ok(Vec::new());
    };
    let values = dataset.numeric_values(column)?.unwrap_or_default();
    let dates = dataset
        .dates(DATE)
        .unwrap_or_else(|| vec![None; dataset.height()]);

    Ok(scores
        .into_iter()
        .zip(values)
        .zip(dates)
        .enumerate()
        .filter_map(|(row, ((z, value), date))| match (z, value) {
            (Some(z_score), Some(value)) if z_score > threshold => Some(AnomalyRow {
                row,
                date,
                value,
                z_score,
            }),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn revenue(values: &[f64]) -> Dataset {
        Dataset::new(df!("Revenue" => values).unwrap())
    }

    #[test]
    fn test_flags_single_outlier() {
        let mut values = vec![100.0; 9];
        values.push(10000.0);
        let flags = detect_anomalies(&revenue(&values), REVENUE, 2.0).unwrap();

        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        assert!(flags[9]);
    }

    #[test]
    fn test_small_sample_outlier_stays_below_threshold() {
        // z of the 1000 is ~1.79 with the sample std
        let flags = detect_anomalies(&revenue(&[100.0, 100.0, 100.0, 100.0, 1000.0]), REVENUE, 2.0)
            .unwrap();
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn test_degenerate_inputs_are_all_false() {
        let two_rows = revenue(&[1.0, 1000.0]);
        assert_eq!(detect_anomalies(&two_rows, REVENUE, 0.0).unwrap(), vec![false, false]);

        let flat = revenue(&[5.0, 5.0, 5.0, 5.0]);
        assert_eq!(detect_anomalies(&flat, REVENUE, -1.0).unwrap(), vec![false; 4]);

        let other = revenue(&[1.0, 2.0, 30.0]);
        assert_eq!(detect_anomalies(&other, "Expenses", 0.5).unwrap(), vec![false; 3]);
    }

    #[test]
    fn test_non_positive_threshold_flags_everything_off_mean() {
        let flags = detect_anomalies(&revenue(&[1.0, 2.0, 3.0, 4.0]), REVENUE, 0.0).unwrap();
        assert_eq!(flags, vec![true; 4]);
    }

    #[test]
    fn test_missing_cells_are_never_flagged() {
        let df = df!("Revenue" => [Some(1.0), None, Some(1.0), Some(1.0), Some(50.0)]).unwrap();
        let flags = detect_anomalies(&Dataset::new(df), REVENUE, 0.5).unwrap();
        assert!(!flags[1]);
        assert!(flags[4]);
    }

    #[test]
    fn test_summary_matches_flags() {
        let mut values = vec![100.0; 9];
        values.push(10000.0);
        let dataset = revenue(&values);
        let summary = get_anomaly_summary(&dataset, REVENUE, 2.0).unwrap();

        assert_eq!(summary.height(), 1);
        assert_eq!(summary.numeric_values(REVENUE).unwrap().unwrap(), vec![Some(10000.0)]);
        assert_eq!(dataset.height(), 10);
    }

    #[test]
    fn test_flagged_rows_carry_position_and_score() {
        let mut values = vec![100.0; 9];
        values.push(10000.0);
        let rows = flagged_rows(&revenue(&values), REVENUE, 2.0).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 9);
        assert_eq!(rows[0].date, None);
        assert!(rows[0].z_score > 2.8 && rows[0].z_score < 2.9);
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("sales_volume".parse::<AnomalyTarget>().unwrap(), AnomalyTarget::SalesVolume);
        assert_eq!(AnomalyTarget::Profit.to_string(), "Profit");
        assert!("Margin".parse::<AnomalyTarget>().is_err());
    }
}
