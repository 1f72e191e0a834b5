//! Datatypes Inspect - prints the format registry of a wire payload.
//!
//! Reads the payload named by `DATATYPES_PAYLOAD`, scans it for inline
//! formats with the datatypes-engine format finder and writes a JSON report
//! to stdout.

mod config;
mod error;
mod report;

use crate::config::Config;
use crate::error::AppResult;
use serde_json::Value;
use std::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datatypes_inspect=info,datatypes_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let output = run()?;
    println!("{}", output);
    Ok(())
}

fn run() -> AppResult<String> {
    let config = Config::from_env()?;
    tracing::info!("Inspecting {}", config.payload.display());

    let text = fs::read_to_string(&config.payload)?;
    let payload: Value = serde_json::from_str(&text)?;
    let report = report::inspect(&payload, config.format_id)?;

    let output = if config.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    Ok(output)
}
