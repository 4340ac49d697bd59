//! `headline_scraper` binary: parse arguments, run the scrape, write the output.
//!
//! ```sh
//! headline_scraper -s bbc,guardian -f csv -o headlines.csv -k economy
//! ```

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use headline_scraper::cli::Cli;
use headline_scraper::outputs;
use headline_scraper::{ReqwestTransport, ScrapeOrchestrator, SourceOutcome, SourceRegistry};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("headline_scraper starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let registry = match &args.registry {
        Some(path) => SourceRegistry::from_yaml_file(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to load source registry");
            e
        })?,
        None => SourceRegistry::builtin(),
    };

    let transport = ReqwestTransport::new(&args.user_agent)?;
    let mut orchestrator = match args.seed {
        Some(seed) => ScrapeOrchestrator::with_seed(registry, transport, seed),
        None => ScrapeOrchestrator::new(registry, transport),
    };

    let request = args.to_request(orchestrator.registry());
    info!(
        sources = ?request.sources,
        keyword = ?request.keyword,
        user_agent = %request.user_agent,
        "Scrape request built"
    );

    let report = orchestrator.run_with_report(&request).await;
    for source in &report.sources {
        match &source.outcome {
            SourceOutcome::Scraped { extracted, kept } => {
                info!(source = %source.key, extracted, kept, "Source summary")
            }
            SourceOutcome::UnknownKey => warn!(source = %source.key, "Unknown source key"),
            SourceOutcome::Disallowed => warn!(source = %source.key, "Skipped: disallowed by robots.txt"),
            SourceOutcome::Failed(reason) => warn!(source = %source.key, %reason, "Skipped: failed"),
        }
    }

    if let Err(e) = outputs::write_records(&report.records, &args.output, args.format).await {
        error!(path = %args.output.display(), error = %e, "Failed to write output");
        return Err(e.into());
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        records = report.records.len(),
        path = %args.output.display(),
        "Execution complete"
    );

    Ok(())
}
