//! Synthetic business dataset for demos and tests.
//!
//! The caller owns the random generator, so a seeded `StdRng` gives the same
//! dataset every time.

use crate::dataset::{Dataset, DATE, EXPENSES, REVENUE, SALES_VOLUME};
use crate::error::Result;
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use rand::Rng;

pub const SAMPLE_DAYS: usize = 30;
pub const CUSTOMER_SATISFACTION: &str = "Customer_Satisfaction";

pub fn sample_start() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 1, 1)
}

/// One row per day from `start`: revenue 4000-7999, expenses 3000-4999,
/// sales volume 80-149, satisfaction 3.5-5.0, plus derived `Profit`.
pub fn generate_sample_data<R: Rng>(rng: &mut R, start: NaiveDate, days: usize) -> Result<Dataset> {
    let dates: Vec<NaiveDate> = (0..days as u64)
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .collect();
    let n = dates.len();

    let revenue: Vec<i64> = (0..n).map(|_| rng.gen_range(4000..8000)).collect();
    let expenses: Vec<i64> = (0..n).map(|_| rng.gen_range(3000..5000)).collect();
    let volume: Vec<i64> = (0..n).map(|_| rng.gen_range(80..150)).collect();
    let satisfaction: Vec<f64> = (0..n)
        .map(|_| (rng.gen_range(3.5..5.0_f64) * 10.0).round() / 10.0)
        .collect();

    let frame = DataFrame::new(vec![
        Series::new(DATE, dates),
        Series::new(REVENUE, revenue),
        Series::new(EXPENSES, expenses),
        Series::new(SALES_VOLUME, volume),
        Series::new(CUSTOMER_SATISFACTION, satisfaction),
    ])?;
    Dataset::new(frame).with_profit()
}
