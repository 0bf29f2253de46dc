//! Pearson correlation between the numeric columns of a dataset.

use crate::dataset::Dataset;
use crate::error::Result;
use itertools::Itertools;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `values[i][j]` pairs `columns[i]` with `columns[j]`; `None` where
    /// either side has no variance over the shared rows.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Correlates every pair of numeric columns over the rows where both values
/// are present.
pub fn correlation_matrix(dataset: &Dataset) -> Result<CorrelationMatrix> {
    let columns = dataset.numeric_columns();
    let mut series = Vec::with_capacity(columns.len());
    for name in &columns {
        series.push(dataset.numeric_values(name)?.unwrap_or_default());
    }

    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        values[i][i] = pearson(&series[i], &series[i]);
    }
    for (i, j) in (0..n).tuple_combinations() {
        let r = pearson(&series[i], &series[j]);
        values[i][j] = r;
        values[j][i] = r;
    }

    Ok(CorrelationMatrix { columns, values })
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x).powi(2);
        syy += (y - mean_y).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_perfect_and_inverse_correlation() {
        let df = df!(
            "Date" => ["2025-01-01", "2025-01-02", "2025-01-03"],
            "Revenue" => [1.0, 2.0, 3.0],
            "Expenses" => [2.0, 4.0, 6.0],
            "Churn" => [3.0, 2.0, 1.0]
        )
        .unwrap();
        let matrix = correlation_matrix(&Dataset::new(df)).unwrap();

        assert_eq!(matrix.columns, vec!["Revenue", "Expenses", "Churn"]);
        assert!((matrix.get("Revenue", "Expenses").unwrap() - 1.0).abs() < 1e-12);
        assert!((matrix.get("Churn", "Revenue").unwrap() + 1.0).abs() < 1e-12);
        assert!((matrix.get("Churn", "Churn").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_has_no_correlation() {
        let df = df!("A" => [1.0, 1.0, 1.0], "B" => [1.0, 2.0, 3.0]).unwrap();
        let matrix = correlation_matrix(&Dataset::new(df)).unwrap();
        assert_eq!(matrix.get("A", "B"), None);
        assert_eq!(matrix.get("A", "A"), None);
    }
}
