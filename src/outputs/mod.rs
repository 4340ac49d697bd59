//! Output writers for scraped headlines.
//!
//! # Submodules
//!
//! - [`json`]: pretty-printed array of `{title, url, time, source}` objects
//! - [`csv`]: header row `title,url,time,source` followed by one row per record
//!
//! Both formats always carry all four fields; absent values are `null` in
//! JSON and empty cells in CSV.

pub mod csv;
pub mod json;

use clap::ValueEnum;
use std::path::Path;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::HeadlineRecord;
use crate::utils::ensure_parent_dir;

/// Field order shared by every output format.
pub const FIELDS: [&str; 4] = ["title", "url", "time", "source"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Render `records` in `format`.
pub fn render(records: &[HeadlineRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json::render(records),
        OutputFormat::Csv => Ok(csv::render(records)),
    }
}

/// Write `records` to `path`, creating parent directories as needed.
#[instrument(level = "info", skip(records), fields(path = %path.display(), count = records.len()))]
pub async fn write_records(
    records: &[HeadlineRecord],
    path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let body = render(records, format)?;
    ensure_parent_dir(path).await?;
    tokio::fs::write(path, body).await?;
    info!(format = format.extension(), "Wrote headlines");
    Ok(())
}
