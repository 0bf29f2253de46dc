//! What-if simulator: profit under an expense cut and sales growth.

use super::kpi::{Kpi, KpiSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub simulated_revenue: f64,
    pub simulated_expenses: f64,
    pub simulated_profit: f64,
    /// Simulated profit minus actual `Total Profit` (zero when absent)
    pub profit_delta: f64,
    /// Percentage; 0 when simulated revenue is not positive
    pub simulated_margin: f64,
}

/// Applies `sales_growth_pct` to total revenue and `expense_reduction_pct`
/// to total expenses. Missing KPIs count as zero.
pub fn simulate(
    kpis: &KpiSet,
    expense_reduction_pct: f64,
    sales_growth_pct: f64,
) -> ScenarioOutcome {
    let simulated_revenue = kpis.get_or_zero(Kpi::TotalRevenue) * (1.0 + sales_growth_pct / 100.0);
    let simulated_expenses =
        kpis.get_or_zero(Kpi::TotalExpenses) * (1.0 - expense_reduction_pct / 100.0);
    let simulated_profit = simulated_revenue - simulated_expenses;

    ScenarioOutcome {
        simulated_revenue,
        simulated_expenses,
        simulated_profit,
        profit_delta: simulated_profit - kpis.get_or_zero(Kpi::TotalProfit),
        simulated_margin: if simulated_revenue > 0.0 {
            simulated_profit / simulated_revenue * 100.0
        } else {
            0.0
        },
    }
}
