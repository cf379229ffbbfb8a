//! CLI entry point for the virgo fetcher.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use virgo_core::{Dispatcher, FetchResult, ReqwestTransport};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let base = cli::load_base_options(args.config.as_deref())?;
    let options = args.apply_to(base)?;

    let urls = read_urls(&args.urls)?;
    if urls.is_empty() {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://example.com/' | virgo");
        return Ok(());
    }

    let mut transport = ReqwestTransport::builder();
    if let Some(proxy) = &args.proxy {
        transport = transport.proxy(proxy.as_str());
    }
    let transport = transport
        .build()
        .context("Failed to build HTTP transport")?;
    let dispatcher = Dispatcher::with_transport(options, Arc::new(transport));

    let mut results = dispatcher.start(urls)?;
    while let Some(result) = results.recv().await {
        println!("{}", format_result(&result));
    }
    let stats = results.finish().await?;

    info!(
        succeeded = stats.succeeded(),
        failed = stats.failed(),
        total = stats.total(),
        "Fetch complete"
    );

    Ok(())
}

/// Uses positional URLs, otherwise one URL per non-empty stdin line.
fn read_urls(positional: &[String]) -> Result<Vec<String>> {
    if !positional.is_empty() {
        return Ok(positional.to_vec());
    }
    if io::stdin().is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read URLs from stdin")?;
    Ok(buffer
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn format_result(result: &FetchResult) -> String {
    match &result.outcome {
        Ok(response) => {
            let mut line = format!(
                "{} {} {}",
                response.status.as_u16(),
                response.body.len(),
                result.url
            );
            if response.redirected(&result.url) {
                line.push_str(" -> ");
                line.push_str(response.final_url.as_str());
            }
            line
        }
        Err(error) => format!("ERR {}: {error}", result.url),
    }
}
