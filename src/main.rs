use anyhow::{bail, Result};
use business_pulse::analytics::aggregation::Granularity;
use business_pulse::analytics::anomaly::{get_anomaly_summary, DEFAULT_Z_THRESHOLD};
use business_pulse::analytics::forecast::DEFAULT_FORECAST_PERIODS;
use business_pulse::config::NarrativeConfig;
use business_pulse::dataset::{parse_date, REVENUE};
use business_pulse::ingestion::{export_csv_file, load_dataset};
use business_pulse::sample_data::{generate_sample_data, sample_start, SAMPLE_DAYS};
use business_pulse::{prepare, render, select_rows, RenderRequest};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "business-pulse")]
#[command(about = "Business dashboard: KPIs, trends, forecast, anomalies and data health")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a CSV or Excel business dataset
    Analyze(AnalyzeArgs),

    /// Write a synthetic daily business dataset as CSV
    Sample {
        /// Output CSV path
        output: PathBuf,

        /// Seed for the random generator
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of days to generate
        #[arg(long, default_value_t = SAMPLE_DAYS)]
        days: usize,
    },
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Dataset to analyze (.csv, .xls or .xlsx)
    file: PathBuf,

    /// First date to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    from: Option<NaiveDate>,

    /// Last date to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    to: Option<NaiveDate>,

    /// Aggregation level: daily, weekly or monthly
    #[arg(short, long, default_value = "daily", value_parser = parse_granularity)]
    granularity: Granularity,

    /// Metric to audit for anomalies
    #[arg(long, default_value = REVENUE)]
    anomaly_column: String,

    /// Z-score sensitivity; lower flags more rows
    #[arg(long, default_value_t = DEFAULT_Z_THRESHOLD)]
    threshold: f64,

    /// Days to forecast past the last date
    #[arg(long, default_value_t = DEFAULT_FORECAST_PERIODS)]
    periods: usize,

    /// What-if: expense reduction in percent (0-50)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=50))]
    expense_reduction: u8,

    /// What-if: sales growth in percent (0-100)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    sales_growth: u8,

    /// Generate strategic LLM insights
    #[arg(long)]
    insights: bool,

    /// Use mock insights instead of calling the model
    #[arg(long)]
    demo: bool,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Write the filtered dataset to this CSV file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", value))
}

fn parse_granularity(value: &str) -> std::result::Result<Granularity, String> {
    value.parse().map_err(|e: business_pulse::DashboardError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Analyze(analyze_args) => analyze(analyze_args).await,
        Command::Sample { output, seed, days } => sample(output, seed, days),
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    info!("Loading {}", args.file.display());
    let Some(raw) = load_dataset(&args.file)? else {
        bail!(
            "Unsupported file type for {}: please provide a CSV or Excel file, nothing to analyze",
            args.file.display()
        );
    };

    let prepared = prepare(raw)?;
    let request = RenderRequest {
        start: args.from,
        end: args.to,
        granularity: args.granularity,
        anomaly_column: args.anomaly_column.clone(),
        z_threshold: args.threshold,
        forecast_periods: args.periods,
        expense_reduction_pct: f64::from(args.expense_reduction),
        sales_growth_pct: f64::from(args.sales_growth),
    };
    let selected = select_rows(&prepared, &request)?;
    let mut report = render(&selected, &request)?;

    if args.insights {
        let config = NarrativeConfig::from_env()
            .with_api_key(args.api_key)
            .with_demo_mode(args.demo);
        match config.narrator() {
            Some(narrator) => report = report.with_narrative(narrator.as_ref()).await,
            None => warn!(
                "Please provide an OpenAI API key (--api-key or OPENAI_API_KEY) or enable --demo"
            ),
        }
    }

    if let Some(path) = &args.export {
        export_csv_file(&selected, path)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
        if !report.anomalies.rows.is_empty() {
            let summary =
                get_anomaly_summary(&selected, &request.anomaly_column, request.z_threshold)?;
            println!("=== Detailed Anomaly Report ===");
            println!("{}", summary);
        }
    }

    Ok(())
}

fn sample(output: PathBuf, seed: u64, days: usize) -> Result<()> {
    let Some(start) = sample_start() else {
        bail!("invalid sample start date");
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let dataset = generate_sample_data(&mut rng, start, days)?;
    export_csv_file(&dataset, &output)?;
    println!("Created {}", output.display());
    Ok(())
}
