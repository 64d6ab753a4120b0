//! One-shot lead run, written straight to a CSV file.
//!
//! Usage: `generate-leads [KEYWORD|CATEGORY] [OUTPUT.csv]`
//!
//! The scope comes from `LEAD_REGIONS` / `LEAD_DEPARTMENTS` (comma separated);
//! `LEAD_USE_GRID=true` samples the whole territory with the grid instead.

use anyhow::Context;
use dotenvy::dotenv;
use footprint_leads::config::Config;
use footprint_leads::export::write_csv;
use footprint_leads::models::{LeadSearchRequest, SiteCategory};
use footprint_leads::pipeline::{LeadPipeline, RunParams};
use std::env;
use std::fs::File;
use std::io::BufWriter;

fn list_from_env(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let mut args = env::args().skip(1);

    let mut request = LeadSearchRequest {
        regions: list_from_env("LEAD_REGIONS"),
        departments: list_from_env("LEAD_DEPARTMENTS"),
        use_grid: env::var("LEAD_USE_GRID")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false),
        ..Default::default()
    };
    match args.next() {
        Some(arg) => match SiteCategory::from_slug(&arg) {
            Some(category) => request.category = Some(category),
            None => request.keyword = Some(arg),
        },
        None => request.category = Some(SiteCategory::ColdStorage),
    }
    let output = args.next().unwrap_or_else(|| {
        format!("leads_{}.csv", chrono::Local::now().format("%Y-%m-%d"))
    });

    let params = RunParams::from_request(&request, config.min_area_m2)?;
    let pipeline = LeadPipeline::from_config(&config)?;

    tracing::info!(
        "Generating leads for '{}' (~{} calls, budget {})",
        params.keyword,
        pipeline.estimate(&params),
        pipeline.call_budget()
    );

    let report = pipeline.run(params).await?;

    let file = File::create(&output).with_context(|| format!("Cannot create {}", output))?;
    write_csv(&report.leads, BufWriter::new(file))?;

    tracing::info!(
        "✓ {} leads written to {} ({} failed lookups)",
        report.found(),
        output,
        report.failed_queries + report.failed_lookups
    );
    if report.is_partial() {
        tracing::warn!("Some upstream calls failed, the export may be incomplete");
    }

    Ok(())
}
