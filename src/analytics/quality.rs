//! Data Quality Auditor
//!
//! Counts missing cells and duplicate rows, describes each column, and folds
//! the counts into a 0-100 score.

use crate::dataset::Dataset;
use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Per-column audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column: String,
    /// Declared type, as polars names it (`f64`, `str`, `date`, ...)
    pub dtype: String,
    pub missing: usize,
    /// Distinct non-missing values
    pub unique_values: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityAudit {
    pub total_rows: usize,
    pub missing_values: usize,
    /// Rows identical to an earlier row; first occurrences are not counted
    pub duplicate_rows: usize,
    pub column_info: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityVerdict {
    Excellent,
    Healthy,
    NeedsAttention,
}

impl QualityVerdict {
    pub fn from_score(score: f64) -> Self {
        if score > 90.0 {
            QualityVerdict::Excellent
        } else if score > 70.0 {
            QualityVerdict::Healthy
        } else {
            QualityVerdict::NeedsAttention
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            QualityVerdict::Excellent => "Your data is in excellent shape!",
            QualityVerdict::Healthy => "Your data is healthy, but has minor gaps.",
            QualityVerdict::NeedsAttention => {
                "Data quality issues detected. Please clean your dataset for better insights."
            }
        }
    }
}

pub fn audit_dataset(dataset: &Dataset) -> Result<QualityAudit> {
    let frame = dataset.frame();
    let total_rows = frame.height();

    let mut row_keys: Vec<Vec<String>> = vec![Vec::with_capacity(frame.width()); total_rows];
    let mut column_info = Vec::with_capacity(frame.width());
    let mut missing_values = 0;

    for series in frame.get_columns() {
        let mut missing = 0;
        let mut distinct = HashSet::new();
        for (idx, key) in row_keys.iter_mut().enumerate() {
            let value = series.get(idx)?;
            let cell = cell_key(&value);
            if is_missing(&value) {
                missing += 1;
            } else {
                distinct.insert(cell.clone());
            }
            key.push(cell);
        }

        missing_values += missing;
        column_info.push(ColumnInfo {
            column: series.name().to_string(),
            dtype: series.dtype().to_string(),
            missing,
            unique_values: distinct.len(),
        });
    }

    let mut seen = HashSet::with_capacity(total_rows);
    let duplicate_rows = row_keys.iter().filter(|key| !seen.insert(*key)).count();

    debug!(
        "Audit: {} rows, {} missing cells, {} duplicate rows",
        total_rows, missing_values, duplicate_rows
    );
    Ok(QualityAudit {
        total_rows,
        missing_values,
        duplicate_rows,
        column_info,
    })
}

/// Comparison key for one cell; `-0.0` and `0.0` compare equal.
fn cell_key(value: &AnyValue) -> String {
    match value {
        AnyValue::Float64(v) if *v == 0.0 => format!("{:?}", AnyValue::Float64(0.0)),
        AnyValue::Float32(v) if *v == 0.0 => format!("{:?}", AnyValue::Float32(0.0)),
        other => format!("{:?}", other),
    }
}

/// `100 * (1 - (missing_ratio + duplicate_ratio))`, clamped to `[0, 100]`.
/// An audit with no cells scores 0.
pub fn get_quality_score(audit: &QualityAudit) -> f64 {
    let total_cells = audit.total_rows * audit.column_info.len();
    if total_cells == 0 {
        return 0.0;
    }

    let missing_ratio = audit.missing_values as f64 / total_cells as f64;
    let duplicate_ratio = if audit.total_rows > 0 {
        audit.duplicate_rows as f64 / audit.total_rows as f64
    } else {
        0.0
    };

    (100.0 * (1.0 - (missing_ratio + duplicate_ratio))).clamp(0.0, 100.0)
}

fn is_missing(value: &AnyValue) -> bool {
    match value {
        AnyValue::Null => true,
        AnyValue::Float64(v) => v.is_nan(),
        AnyValue::Float32(v) => v.is_nan(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_duplicate_in_ten_rows() {
        let df = df!(
            "Date" => ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04", "2025-01-05",
                       "2025-01-06", "2025-01-07", "2025-01-08", "2025-01-09", "2025-01-01"],
            "Revenue" => [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 10.0],
            "Expenses" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1.0],
            "Sales_Volume" => [1i64, 2, 3, 4, 5, 6, 7, 8, 9, 1]
        )
        .unwrap();
        let audit = audit_dataset(&Dataset::new(df)).unwrap();

        assert_eq!(audit.total_rows, 10);
        assert_eq!(audit.duplicate_rows, 1);
        assert_eq!(audit.missing_values, 0);
        assert!((get_quality_score(&audit) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_signed_zero_is_one_value() {
        let df = df!("Revenue" => [0.0, -0.0], "Region" => ["a", "a"]).unwrap();
        let audit = audit_dataset(&Dataset::new(df)).unwrap();

        assert_eq!(audit.duplicate_rows, 1);
        assert_eq!(audit.column_info[0].unique_values, 1);
    }

    #[test]
    fn test_clean_dataset_scores_100() {
        let df = df!("Revenue" => [1.0, 2.0, 3.0], "Region" => ["a", "b", "c"]).unwrap();
        let audit = audit_dataset(&Dataset::new(df)).unwrap();

        assert_eq!(get_quality_score(&audit), 100.0);
        assert_eq!(QualityVerdict::from_score(100.0), QualityVerdict::Excellent);
    }

    #[test]
    fn test_missing_cells_and_column_info() {
        let df = df!(
            "Revenue" => [Some(1.0), None, Some(1.0), Some(f64::NAN)],
            "Region" => [Some("a"), Some("b"), None, Some("b")]
        )
        .unwrap();
        let audit = audit_dataset(&Dataset::new(df)).unwrap();

        assert_eq!(audit.missing_values, 3);
        assert_eq!(audit.column_info[0].column, "Revenue");
        assert_eq!(audit.column_info[0].missing, 2);
        assert_eq!(audit.column_info[0].unique_values, 1);
        assert_eq!(audit.column_info[1].missing, 1);
        assert_eq!(audit.column_info[1].unique_values, 2);
        // 3 of 8 cells missing
        assert!((get_quality_score(&audit) - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_rows_with_nulls_in_same_place_are_duplicates() {
        let df = df!("A" => [None, None, Some(1i64)], "B" => ["x", "x", "x"]).unwrap();
        let audit = audit_dataset(&Dataset::new(df)).unwrap();
        assert_eq!(audit.duplicate_rows, 1);
    }

    #[test]
    fn test_empty_dataset_scores_zero() {
        let audit = audit_dataset(&Dataset::new(DataFrame::empty())).unwrap();
        assert_eq!(audit.total_rows, 0);
        assert_eq!(get_quality_score(&audit), 0.0);
    }

    #[test]
    fn test_score_is_clamped() {
        let audit = QualityAudit {
            total_rows: 4,
            missing_values: 6,
            duplicate_rows: 3,
            column_info: vec![
                ColumnInfo {
                    column: "A".to_string(),
                    dtype: "f64".to_string(),
                    missing: 3,
                    unique_values: 1,
                },
                ColumnInfo {
                    column: "B".to_string(),
                    dtype: "f64".to_string(),
                    missing: 3,
                    unique_values: 1,
                },
            ],
        };
        assert_eq!(get_quality_score(&audit), 0.0);
        assert_eq!(QualityVerdict::from_score(75.0), QualityVerdict::Healthy);
        assert_eq!(QualityVerdict::from_score(70.0), QualityVerdict::NeedsAttention);
    }
}
