use business_pulse::analytics::anomaly::{
    detect_anomalies, get_anomaly_summary, DEFAULT_Z_THRESHOLD,
};
use business_pulse::analytics::forecast::generate_forecast;
use business_pulse::analytics::kpi::{calculate_kpis, Kpi};
use business_pulse::analytics::quality::{audit_dataset, get_quality_score};
use business_pulse::analytics::trend::revenue_trend;
use business_pulse::dataset::{Dataset, REVENUE};
use business_pulse::{prepare, render, select_rows, RenderRequest};
use chrono::NaiveDate;
use polars::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn january(day: u32) -> String {
    format!("2025-01-{:02}", day)
}

#[test]
fn test_single_outlier_is_flagged() -> TestResult {
    let mut revenue = vec![100.0; 9];
    revenue.push(10000.0);
    let dataset = Dataset::new(df! [ "Revenue" => revenue ]?);

    let flags = detect_anomalies(&dataset, REVENUE, DEFAULT_Z_THRESHOLD)?;
    assert_eq!(flags.len(), 10);
    assert_eq!(flags.iter().filter(|f| **f).count(), 1);
    assert!(flags[9]);
    Ok(())
}

#[test]
fn test_anomaly_summary_is_independent() -> TestResult {
    let mut revenue = vec![100.0; 9];
    revenue.push(10000.0);
    let dataset = Dataset::new(df! [ "Revenue" => revenue.clone() ]?);

    let summary = get_anomaly_summary(&dataset, REVENUE, DEFAULT_Z_THRESHOLD)?;
    assert_eq!(summary.height(), 1);
    assert_eq!(dataset.height(), 10);

    let expected: Vec<Option<f64>> = revenue.into_iter().map(Some).collect();
    assert_eq!(dataset.numeric_values(REVENUE)?, Some(expected));
    Ok(())
}

#[test]
fn test_editing_anomaly_summary_leaves_source_alone() -> TestResult {
    let mut revenue = vec![100.0; 9];
    revenue.push(10000.0);
    let dataset = Dataset::new(df! [
        "Date" => (1..=10).map(january).collect::<Vec<_>>(),
        "Revenue" => revenue
    ]?);

    let mut edited = get_anomaly_summary(&dataset, REVENUE, DEFAULT_Z_THRESHOLD)?.into_frame();
    edited.with_column(Series::new(REVENUE, [0.0]))?;
    edited.drop_in_place("Date")?;
    let edited = Dataset::new(edited);
    assert_eq!(edited.numeric_values(REVENUE)?, Some(vec![Some(0.0)]));

    assert_eq!(dataset.height(), 10);
    assert!(dataset.has_column("Date"));
    let source = dataset.numeric_values(REVENUE)?.ok_or("source keeps Revenue")?;
    assert_eq!(source[9], Some(10000.0));
    assert!(source[..9].iter().all(|v| *v == Some(100.0)));
    Ok(())
}

#[test]
fn test_perfectly_linear_forecast() -> TestResult {
    let dates: Vec<String> = (1..=30).map(january).collect();
    let revenue: Vec<f64> = (0..30).map(|i| 4000.0 + 100.0 * i as f64).collect();
    let dataset = prepare(Dataset::new(df! [
        "Date" => dates,
        "Revenue" => revenue
    ]?))?;

    let forecast = generate_forecast(&dataset, 30)?.ok_or("expected a forecast")?;
    assert_eq!(forecast.len(), 30);

    let day_31 = forecast.points()[0];
    assert_eq!(day_31.date, NaiveDate::from_ymd_opt(2025, 1, 31).ok_or("date")?);
    assert!((day_31.value - 7000.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_one_duplicate_out_of_ten() -> TestResult {
    let dataset = Dataset::new(df! [
        "Date" => ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04", "2025-01-05",
                   "2025-01-06", "2025-01-07", "2025-01-08", "2025-01-09", "2025-01-09"],
        "Revenue" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 9.0],
        "Expenses" => [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        "Region" => ["N", "S", "E", "W", "N", "S", "E", "W", "N", "N"]
    ]?);

    let audit = audit_dataset(&dataset)?;
    assert_eq!(audit.duplicate_rows, 1);
    assert_eq!(audit.missing_values, 0);
    assert!((get_quality_score(&audit) - 90.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_per_sale_kpis_need_sales_volume() -> TestResult {
    let dataset = prepare(Dataset::new(df! [
        "Date" => ["2025-01-01", "2025-01-02"],
        "Revenue" => [500.0, 700.0],
        "Expenses" => [300.0, 400.0]
    ]?))?;

    let kpis = calculate_kpis(&dataset)?;
    assert!(!kpis.contains(Kpi::RevenuePerSale));
    assert!(!kpis.contains(Kpi::ProfitPerSale));
    assert!(kpis.contains(Kpi::ProfitMargin));
    assert!((kpis.get_or_zero(Kpi::TotalProfit) - 500.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_missing_inputs_degrade_quietly() -> TestResult {
    let no_date = Dataset::new(df! [ "Revenue" => [1.0, 2.0, 3.0] ]?);
    assert!(revenue_trend(&no_date)?.is_empty());
    assert!(generate_forecast(&no_date, 30)?.is_none());

    let no_revenue = Dataset::new(df! [
        "Date" => ["2025-01-01", "2025-01-02", "2025-01-03"],
        "Expenses" => [1.0, 2.0, 3.0]
    ]?);
    assert!(revenue_trend(&no_revenue)?.is_empty());
    assert!(generate_forecast(&no_revenue, 30)?.is_none());
    assert!(calculate_kpis(&no_revenue).is_err());
    Ok(())
}

#[test]
fn test_quality_score_stays_in_range() -> TestResult {
    let dataset = Dataset::new(df! [
        "Date" => [None::<&str>, None, None],
        "Revenue" => [None::<f64>, None, None]
    ]?);

    let score = get_quality_score(&audit_dataset(&dataset)?);
    assert!((0.0..=100.0).contains(&score));
    Ok(())
}

#[test]
fn test_render_weekly_window() -> TestResult {
    let dates: Vec<String> = (1..=28).map(january).collect();
    let revenue: Vec<f64> = vec![1000.0; 28];
    let expenses: Vec<f64> = vec![600.0; 28];
    let volume: Vec<i64> = vec![10; 28];
    let prepared = prepare(Dataset::new(df! [
        "Date" => dates,
        "Revenue" => revenue,
        "Expenses" => expenses,
        "Sales_Volume" => volume
    ]?))?;

    let request = RenderRequest {
        start: NaiveDate::from_ymd_opt(2025, 1, 6),
        end: NaiveDate::from_ymd_opt(2025, 1, 19),
        granularity: "weekly".parse()?,
        ..RenderRequest::default()
    };
    let selected = select_rows(&prepared, &request)?;
    let report = render(&selected, &request)?;

    // 2025-01-06 is a Monday, so the window is exactly two full weeks.
    assert_eq!(report.rows, 2);
    assert_eq!(report.revenue_trend.values(), vec![7000.0, 7000.0]);
    assert!((report.kpis.get_or_zero(Kpi::TotalRevenue) - 14000.0).abs() < 1e-9);
    assert!((report.kpis.get_or_zero(Kpi::ProfitMargin) - 40.0).abs() < 1e-9);
    assert!((report.kpis.get_or_zero(Kpi::RevenuePerSale) - 100.0).abs() < 1e-9);
    assert!(report.anomalies.rows.is_empty());
    Ok(())
}
