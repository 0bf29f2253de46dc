pub mod analytics;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ingestion;
pub mod narrative;
pub mod pipeline;
pub mod sample_data;

pub use dataset::Dataset;
pub use error::{DashboardError, Result};
pub use pipeline::{prepare, render, select_rows, DashboardReport, RenderRequest};
