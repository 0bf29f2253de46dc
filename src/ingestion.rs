//! Ingestion - CSV/Excel files in, filtered datasets out as CSV.
//!
//! Both readers reduce a file to a grid of raw cells and then type each
//! column once: all-numeric columns become numbers, date-like columns become
//! `Date`, everything else stays text. Blank cells are missing values.

use crate::dataset::{parse_date, Dataset};
use crate::error::{DashboardError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Days, NaiveDate};
use csv::ReaderBuilder;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported input formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xls" | "xlsx" => Some(SourceFormat::Spreadsheet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RawCell {
    Empty,
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl RawCell {
    fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return RawCell::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return RawCell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return RawCell::Float(f);
        }
        RawCell::Text(trimmed.to_string())
    }

    fn from_spreadsheet(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::Int(v) => RawCell::Int(*v),
            Data::Float(v) => RawCell::Float(*v),
            Data::Bool(v) => RawCell::Text(v.to_string()),
            Data::String(v) => RawCell::from_text(v),
            Data::DateTime(v) => excel_serial_to_date(v.as_f64())
                .map(RawCell::Date)
                .unwrap_or(RawCell::Empty),
            Data::DateTimeIso(v) => parse_date(v)
                .map(RawCell::Date)
                .unwrap_or_else(|| RawCell::Text(v.clone())),
            other => RawCell::Text(other.to_string()),
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            RawCell::Date(d) => Some(*d),
            RawCell::Text(t) => parse_date(t),
            _ => None,
        }
    }
}

/// Loads a dataset from a `.csv`, `.xls` or `.xlsx` file.
///
/// Returns `Ok(None)` for any other extension: there is nothing to analyze.
pub fn load_dataset(path: &Path) -> Result<Option<Dataset>> {
    let Some(format) = SourceFormat::from_path(path) else {
        warn!("Unsupported file type: {}", path.display());
        return Ok(None);
    };

    let (headers, rows) = match format {
        SourceFormat::Csv => read_csv_grid(&std::fs::read(path)?)?,
        SourceFormat::Spreadsheet => read_spreadsheet_grid(path)?,
    };
    let dataset = build_dataset(headers, rows)?;
    info!(
        "Loaded {} rows, {} columns from {}",
        dataset.height(),
        dataset.width(),
        path.display()
    );
    Ok(Some(dataset))
}

/// Decodes CSV bytes: UTF-8 when valid, otherwise Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Parses CSV bytes into a dataset.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<Dataset> {
    let (headers, rows) = read_csv_grid(bytes)?;
    build_dataset(headers, rows)
}

fn read_csv_grid(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<RawCell>>)> {
    let text = decode_text(bytes);
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(
            (0..headers.len())
                .map(|idx| RawCell::from_text(record.get(idx).unwrap_or("")))
                .collect(),
        );
    }
    Ok((headers, rows))
}

fn read_spreadsheet_grid(path: &Path) -> Result<(Vec<String>, Vec<Vec<RawCell>>)> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DashboardError::Ingestion(format!("No worksheet in {}", path.display())))??;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok((Vec::new(), Vec::new())),
    };

    let grid = rows
        .map(|row| {
            (0..headers.len())
                .map(|idx| row.get(idx).map(RawCell::from_spreadsheet).unwrap_or(RawCell::Empty))
                .collect()
        })
        .collect();
    Ok((headers, grid))
}

fn build_dataset(headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Result<Dataset> {
    let names = unique_headers(headers);
    let mut columns = Vec::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        let cells: Vec<&RawCell> = rows
            .iter()
            .map(|row| row.get(idx).unwrap_or(&RawCell::Empty))
            .collect();
        columns.push(build_series(name, &cells));
    }
    Ok(Dataset::new(DataFrame::new(columns)?))
}

/// Names blank headers `column_N` and suffixes repeats `.1`, `.2`, ... so
/// every column name is distinct.
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut repeats: HashMap<String, usize> = HashMap::new();

    headers
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                name
            };
            let mut candidate = base.clone();
            while taken.contains(&candidate) {
                let n = repeats.entry(base.clone()).or_insert(0);
                *n += 1;
                candidate = format!("{}.{}", base, n);
            }
            if candidate != base {
                debug!("Duplicate header '{}' renamed to '{}'", base, candidate);
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Types one column from its cells.
fn build_series(name: &str, cells: &[&RawCell]) -> Series {
    let filled = || cells.iter().filter(|c| !matches!(c, RawCell::Empty));

    if filled().all(|c| matches!(c, RawCell::Int(_))) && filled().next().is_some() {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                RawCell::Int(v) => Some(*v),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }

    if filled().all(|c| matches!(c, RawCell::Int(_) | RawCell::Float(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                RawCell::Int(v) => Some(*v as f64),
                RawCell::Float(v) => Some(*v),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }

    if filled().all(|c| c.as_date().is_some()) {
        let values: Vec<Option<NaiveDate>> = cells.iter().map(|c| c.as_date()).collect();
        return Series::new(name, values);
    }

    let values: Vec<Option<String>> = cells
        .iter()
        .map(|c| match c {
            RawCell::Empty => None,
            RawCell::Int(v) => Some(v.to_string()),
            RawCell::Float(v) => Some(v.to_string()),
            RawCell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            RawCell::Text(t) => Some(t.clone()),
        })
        .collect();
    Series::new(name, values)
}

/// Excel day serials count from 1899-12-30.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Writes the dataset as comma-separated text with a header row.
pub fn export_csv<W: Write>(dataset: &Dataset, writer: &mut W) -> Result<()> {
    let mut frame = dataset.frame().clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut frame)?;
    Ok(())
}

/// Writes the dataset to `path` as CSV.
pub fn export_csv_file(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    export_csv(dataset, &mut file)?;
    info!("Exported {} rows to {}", dataset.height(), path.display());
    Ok(())
}
