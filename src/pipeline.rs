//! One dashboard render: prepare, filter, aggregate, then run every analytic
//! component on the same rows and bundle the results.

use crate::analytics::aggregation::{aggregate, filter_date_range, Granularity};
use crate::analytics::anomaly::{
    detect_anomalies, flagged_rows, AnomalyRow, AnomalyTarget, DEFAULT_Z_THRESHOLD,
};
use crate::analytics::correlation::{correlation_matrix, CorrelationMatrix};
use crate::analytics::forecast::{
    combine_with_history, generate_forecast, DEFAULT_FORECAST_PERIODS,
};
use crate::analytics::kpi::{calculate_kpis, KpiSet};
use crate::analytics::quality::{audit_dataset, get_quality_score, QualityAudit, QualityVerdict};
use crate::analytics::scenario::{simulate, ScenarioOutcome};
use crate::analytics::trend::{revenue_trend, revenue_vs_expenses, ComparisonPoint};
use crate::analytics::TimeSeries;
use crate::dataset::{Dataset, DATE, REVENUE};
use crate::error::Result;
use crate::narrative::{NarrativeGenerator, NarrativeOutcome};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// User selections for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub granularity: Granularity,
    pub anomaly_column: String,
    pub z_threshold: f64,
    pub forecast_periods: usize,
    pub expense_reduction_pct: f64,
    pub sales_growth_pct: f64,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            granularity: Granularity::Daily,
            anomaly_column: REVENUE.to_string(),
            z_threshold: DEFAULT_Z_THRESHOLD,
            forecast_periods: DEFAULT_FORECAST_PERIODS,
            expense_reduction_pct: 0.0,
            sales_growth_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    pub column: String,
    pub threshold: f64,
    pub rows: Vec<AnomalyRow>,
    /// Flag counts for each standard metric at the same threshold
    pub counts_by_metric: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub rows: usize,
    pub granularity: Granularity,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub kpis: KpiSet,
    pub revenue_trend: TimeSeries,
    pub revenue_vs_expenses: Vec<ComparisonPoint>,
    pub forecast: Option<TimeSeries>,
    pub forecast_periods: usize,
    /// Revenue trend followed by the forecast, as one chart
    pub revenue_outlook: TimeSeries,
    pub scenario: ScenarioOutcome,
    pub anomalies: AnomalyReport,
    pub correlation: CorrelationMatrix,
    pub quality: QualityAudit,
    pub quality_score: f64,
    pub quality_verdict: QualityVerdict,
    pub narrative: Option<NarrativeOutcome>,
}

impl DashboardReport {
    /// Runs the narrative generator on this report's KPIs and trend.
    pub async fn with_narrative(mut self, generator: &dyn NarrativeGenerator) -> Self {
        let outcome = generator.generate(&self.kpis, &self.revenue_trend).await;
        self.narrative = Some(outcome);
        self
    }
}

/// Post-load derivations, done once before any analytics: dates are
/// normalized and `Profit` is attached.
pub fn prepare(raw: Dataset) -> Result<Dataset> {
    raw.normalize_dates()?.with_profit()
}

/// Applies the date filter and then the aggregation level.
pub fn select_rows(prepared: &Dataset, request: &RenderRequest) -> Result<Dataset> {
    let filtered = filter_date_range(prepared, request.start, request.end)?;
    aggregate(&filtered, request.granularity)
}

/// Runs every analytic component on `dataset` (already filtered and
/// aggregated).
pub fn render(dataset: &Dataset, request: &RenderRequest) -> Result<DashboardReport> {
    let kpis = if dataset.has_column(REVENUE) {
        calculate_kpis(dataset)?
    } else {
        warn!("No '{}' column, KPIs are empty", REVENUE);
        KpiSet::default()
    };

    let mut counts_by_metric = BTreeMap::new();
    for target in AnomalyTarget::ALL {
        if dataset.has_column(target.column()) {
            let flags = detect_anomalies(dataset, target.column(), request.z_threshold)?;
            counts_by_metric.insert(
                target.column().to_string(),
                flags.iter().filter(|f| **f).count(),
            );
        }
    }
    let anomalies = AnomalyReport {
        column: request.anomaly_column.clone(),
        threshold: request.z_threshold,
        rows: flagged_rows(dataset, &request.anomaly_column, request.z_threshold)?,
        counts_by_metric,
    };

    let quality = audit_dataset(dataset)?;
    let quality_score = get_quality_score(&quality);

    let dates: Vec<NaiveDate> = dataset
        .dates(DATE)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect();

    let trend = revenue_trend(dataset)?;
    let forecast = generate_forecast(dataset, request.forecast_periods)?;
    let revenue_outlook = match &forecast {
        Some(forecast) => combine_with_history(&trend, forecast),
        None => trend.clone(),
    };

    let report = DashboardReport {
        rows: dataset.height(),
        granularity: request.granularity,
        first_date: dates.iter().min().copied(),
        last_date: dates.iter().max().copied(),
        scenario: simulate(&kpis, request.expense_reduction_pct, request.sales_growth_pct),
        kpis,
        revenue_trend: trend,
        revenue_vs_expenses: revenue_vs_expenses(dataset)?,
        forecast,
        forecast_periods: request.forecast_periods,
        revenue_outlook,
        anomalies,
        correlation: correlation_matrix(dataset)?,
        quality_verdict: QualityVerdict::from_score(quality_score),
        quality,
        quality_score,
        narrative: None,
    };
    info!(
        "Rendered dashboard: {} rows, {} KPIs, {} anomalies, quality {:.1}",
        report.rows,
        report.kpis.len(),
        report.anomalies.rows.len(),
        report.quality_score
    );
    Ok(report)
}

/// `$1,234.56` style formatting.
pub fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = (value.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

impl fmt::Display for DashboardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => writeln!(
                f,
                "{} rows ({}), {} to {}",
                self.rows, self.granularity, first, last
            )?,
            _ => writeln!(f, "{} rows ({})", self.rows, self.granularity)?,
        }

        writeln!(f, "\n=== Key Performance Indicators ===")?;
        if self.kpis.is_empty() {
            writeln!(f, "No revenue data to summarize.")?;
        }
        for (kpi, value) in self.kpis.iter() {
            let shown = if kpi.is_currency() {
                format_currency(value)
            } else {
                format!("{:.1}%", value)
            };
            writeln!(f, "{:<20}{}", kpi.label(), shown)?;
        }

        writeln!(f, "\n=== Revenue Trend ===")?;
        if self.revenue_trend.is_empty() {
            writeln!(f, "No dated revenue to chart.")?;
        }
        for point in self.revenue_trend.iter() {
            writeln!(f, "{}  {}", point.date, format_currency(point.value))?;
        }

        if !self.revenue_vs_expenses.is_empty() {
            writeln!(f, "\n=== Revenue vs Expenses ===")?;
            for point in &self.revenue_vs_expenses {
                writeln!(
                    f,
                    "{}  {:>16}  {:>16}",
                    point.date,
                    format_currency(point.revenue),
                    format_currency(point.expenses)
                )?;
            }
        }

        writeln!(f, "\n=== {}-Day Revenue Forecast ===", self.forecast_periods)?;
        match &self.forecast {
            Some(forecast) => {
                for point in forecast.iter() {
                    writeln!(f, "{}  {}", point.date, format_currency(point.value))?;
                }
            }
            None => writeln!(f, "Not enough data to generate a forecast.")?,
        }

        writeln!(f, "\n=== What-If Scenario ===")?;
        writeln!(
            f,
            "Simulated Profit    {} (delta {})",
            format_currency(self.scenario.simulated_profit),
            format_currency(self.scenario.profit_delta)
        )?;
        writeln!(f, "Simulated Margin    {:.1}%", self.scenario.simulated_margin)?;

        writeln!(f, "\n=== Anomaly Detection ===")?;
        if self.anomalies.rows.is_empty() {
            writeln!(
                f,
                "No significant anomalies detected in {} at this sensitivity level.",
                self.anomalies.column
            )?;
        } else {
            writeln!(
                f,
                "Found {} anomalies in {} (z > {})!",
                self.anomalies.rows.len(),
                self.anomalies.column,
                self.anomalies.threshold
            )?;
            for row in &self.anomalies.rows {
                let date = row.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
                writeln!(f, "row {:<5} {}  {:.2}  z={:.2}", row.row, date, row.value, row.z_score)?;
            }
        }
        for (column, count) in &self.anomalies.counts_by_metric {
            writeln!(f, "  {:<16}{} flagged", column, count)?;
        }

        if !self.correlation.is_empty() {
            writeln!(f, "\n=== Factor Correlation ===")?;
            for (i, column) in self.correlation.columns.iter().enumerate() {
                let cells: Vec<String> = self.correlation.values[i]
                    .iter()
                    .map(|v| match v {
                        Some(r) => format!("{:>6.2}", r),
                        None => format!("{:>6}", "-"),
                    })
                    .collect();
                writeln!(f, "{:<24}{}", column, cells.join(" "))?;
            }
        }

        writeln!(f, "\n=== Data Health Audit ===")?;
        writeln!(f, "Data Quality Score  {:.1}%", self.quality_score)?;
        writeln!(f, "Missing Cells       {}", self.quality.missing_values)?;
        writeln!(f, "Duplicate Rows      {}", self.quality.duplicate_rows)?;
        writeln!(f, "{}", self.quality_verdict.message())?;
        writeln!(f, "{:<24}{:<10}{:>8}{:>15}", "Column", "Type", "Missing", "Unique Values")?;
        for info in &self.quality.column_info {
            writeln!(
                f,
                "{:<24}{:<10}{:>8}{:>15}",
                info.column, info.dtype, info.missing, info.unique_values
            )?;
        }

        if let Some(narrative) = &self.narrative {
            writeln!(f, "\n=== Strategic LLM Insights ===")?;
            writeln!(f, "{}", narrative.text())?;
        }
        Ok(())
    }
}
