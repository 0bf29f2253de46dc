//! KPI Engine - aggregate business metrics.
//!
//! A metric only appears in the [`KpiSet`] when its inputs exist; consumers
//! treat an absent metric as "hide it" or zero.

use crate::dataset::{Dataset, EXPENSES, PROFIT, REVENUE, SALES_VOLUME};
use crate::error::{DashboardError, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kpi {
    TotalRevenue,
    AverageRevenue,
    TotalProfit,
    ProfitMargin,
    TotalExpenses,
    RevenuePerSale,
    ProfitPerSale,
}

impl Kpi {
    pub fn label(self) -> &'static str {
        match self {
            Kpi::TotalRevenue => "Total Revenue",
            Kpi::AverageRevenue => "Average Revenue",
            Kpi::TotalProfit => "Total Profit",
            Kpi::ProfitMargin => "Profit Margin (%)",
            Kpi::TotalExpenses => "Total Expenses",
            Kpi::RevenuePerSale => "Revenue per Sale",
            Kpi::ProfitPerSale => "Profit per Sale",
        }
    }

    /// Whether the value is a currency amount (as opposed to a percentage).
    pub fn is_currency(self) -> bool {
        !matches!(self, Kpi::ProfitMargin)
    }
}

impl fmt::Display for Kpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metric name to value; entries exist only when they could be computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiSet {
    values: BTreeMap<Kpi, f64>,
}

impl KpiSet {
    pub fn get(&self, kpi: Kpi) -> Option<f64> {
        self.values.get(&kpi).copied()
    }

    pub fn get_or_zero(&self, kpi: Kpi) -> f64 {
        self.get(kpi).unwrap_or(0.0)
    }

    pub fn contains(&self, kpi: Kpi) -> bool {
        self.values.contains_key(&kpi)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Kpi, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    fn insert(&mut self, kpi: Kpi, value: f64) {
        self.values.insert(kpi, value);
    }
}

impl Serialize for KpiSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (kpi, value) in &self.values {
            map.serialize_entry(kpi.label(), value)?;
        }
        map.end()
    }
}

/// Computes the KPI set for a dataset.
///
/// `Revenue` is required; every other metric is optional.
pub fn calculate_kpis(dataset: &Dataset) -> Result<KpiSet> {
    let revenue = present(dataset.numeric_values(REVENUE)?)
        .ok_or_else(|| DashboardError::MissingColumn(REVENUE.to_string()))?;

    let mut kpis = KpiSet::default();
    let total_revenue: f64 = revenue.iter().sum();
    kpis.insert(Kpi::TotalRevenue, total_revenue);
    kpis.insert(
        Kpi::AverageRevenue,
        super::mean(&revenue).unwrap_or(0.0),
    );

    if let Some(profit) = present(dataset.numeric_values(PROFIT)?) {
        let total_profit: f64 = profit.iter().sum();
        kpis.insert(Kpi::TotalProfit, total_profit);
        if total_revenue > 0.0 {
            kpis.insert(Kpi::ProfitMargin, total_profit / total_revenue * 100.0);
        }
    }

    if let Some(expenses) = present(dataset.numeric_values(EXPENSES)?) {
        kpis.insert(Kpi::TotalExpenses, expenses.iter().sum());
    }

    if let Some(volume) = present(dataset.numeric_values(SALES_VOLUME)?) {
        let total_sales: f64 = volume.iter().sum();
        if total_revenue > 0.0 && total_sales > 0.0 {
            kpis.insert(Kpi::RevenuePerSale, total_revenue / total_sales);
            if let Some(total_profit) = kpis.get(Kpi::TotalProfit) {
                kpis.insert(Kpi::ProfitPerSale, total_profit / total_sales);
            }
        }
    }

    Ok(kpis)
}

/// Drops missing cells; `None` when the column itself is absent.
fn present(values: Option<Vec<Option<f64>>>) -> Option<Vec<f64>> {
    values.map(|v| v.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_full_kpi_set() {
        let df = df!(
            "Revenue" => [1000.0, 3000.0],
            "Expenses" => [600.0, 1400.0],
            "Profit" => [400.0, 1600.0],
            "Sales_Volume" => [10i64, 30]
        )
        .unwrap();
        let kpis = calculate_kpis(&Dataset::new(df)).unwrap();

        assert_eq!(kpis.get(Kpi::TotalRevenue), Some(4000.0));
        assert_eq!(kpis.get(Kpi::AverageRevenue), Some(2000.0));
        assert_eq!(kpis.get(Kpi::TotalProfit), Some(2000.0));
        assert_eq!(kpis.get(Kpi::ProfitMargin), Some(50.0));
        assert_eq!(kpis.get(Kpi::TotalExpenses), Some(2000.0));
        assert_eq!(kpis.get(Kpi::RevenuePerSale), Some(100.0));
        assert_eq!(kpis.get(Kpi::ProfitPerSale), Some(50.0));
    }

    #[test]
    fn test_no_sales_volume_means_no_unit_economics() {
        let df = df!(
            "Revenue" => [100.0, 200.0],
            "Profit" => [10.0, 20.0]
        )
        .unwrap();
        let kpis = calculate_kpis(&Dataset::new(df)).unwrap();

        assert!(!kpis.contains(Kpi::RevenuePerSale));
        assert!(!kpis.contains(Kpi::ProfitPerSale));
        assert!(kpis.contains(Kpi::ProfitMargin));
    }

    #[test]
    fn test_margin_requires_positive_revenue() {
        let df = df!(
            "Revenue" => [0.0, 0.0],
            "Profit" => [-5.0, -5.0],
            "Sales_Volume" => [3.0, 4.0]
        )
        .unwrap();
        let kpis = calculate_kpis(&Dataset::new(df)).unwrap();

        assert_eq!(kpis.get(Kpi::TotalProfit), Some(-10.0));
        assert!(!kpis.contains(Kpi::ProfitMargin));
        assert!(!kpis.contains(Kpi::RevenuePerSale));
    }

    #[test]
    fn test_margin_absent_without_profit() {
        let df = df!("Revenue" => [100.0], "Sales_Volume" => [4.0]).unwrap();
        let kpis = calculate_kpis(&Dataset::new(df)).unwrap();

        assert!(!kpis.contains(Kpi::ProfitMargin));
        assert!(!kpis.contains(Kpi::ProfitPerSale));
        assert_eq!(kpis.get(Kpi::RevenuePerSale), Some(25.0));
        assert_eq!(kpis.get_or_zero(Kpi::TotalProfit), 0.0);
    }

    #[test]
    fn test_missing_revenue_is_an_error() {
        let df = df!("Expenses" => [1.0]).unwrap();
        let err = calculate_kpis(&Dataset::new(df)).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn(ref c) if c == "Revenue"));
    }

    #[test]
    fn test_serializes_with_display_labels() {
        let df = df!("Revenue" => [10.0, 30.0]).unwrap();
        let kpis = calculate_kpis(&Dataset::new(df)).unwrap();
        let json = serde_json::to_value(&kpis).unwrap();

        assert_eq!(json["Total Revenue"], 40.0);
        assert_eq!(json["Average Revenue"], 20.0);
        assert!(json.get("Total Profit").is_none());
    }
}
