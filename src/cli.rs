//! CLI argument definitions using clap derive macros.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use virgo_core::Options;

/// Fetch many URLs concurrently with one shared request configuration.
///
/// URLs are taken from the arguments, or one per line from stdin.
#[derive(Parser, Debug)]
#[command(name = "virgo")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to fetch (reads stdin when omitted)
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// JSON file with default options; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// HTTP method
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Request body sent with every request
    #[arg(short = 'd', long = "data")]
    pub body: Option<String>,

    /// User-Agent header value
    #[arg(short = 'A', long)]
    pub user_agent: Option<String>,

    /// Cookie header value
    #[arg(short = 'b', long)]
    pub cookie: Option<String>,

    /// Request timeout in milliseconds (0 disables it)
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Number of concurrent requests
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// Follow HTTP redirects
    #[arg(short = 'L', long)]
    pub follow_redirects: bool,

    /// Route requests through a proxy (e.g. http://127.0.0.1:8080)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,
}

impl Args {
    /// Applies flags on top of a base set of options.
    pub fn apply_to(&self, mut options: Options) -> Result<Options> {
        if let Some(method) = &self.method {
            options.method.clone_from(method);
        }
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            options.headers.insert(name, value);
        }
        if let Some(body) = &self.body {
            options.body = body.clone().into_bytes();
        }
        if let Some(user_agent) = &self.user_agent {
            options.user_agent.clone_from(user_agent);
        }
        if let Some(cookie) = &self.cookie {
            options.cookie.clone_from(cookie);
        }
        if let Some(timeout) = self.timeout {
            options.timeout = Duration::from_millis(timeout);
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency =
                usize::try_from(concurrency).context("concurrency does not fit this platform")?;
        }
        if self.follow_redirects {
            options.follow_redirects = true;
        }
        Ok(options)
    }
}

/// Reads base options from the JSON config file, or returns defaults.
pub fn load_base_options(path: Option<&Path>) -> Result<Options> {
    let Some(path) = path else {
        return Ok(Options::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    Options::from_json(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Splits a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("Invalid header {raw:?}: expected \"Name: value\"");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header {raw:?}: header name is empty");
    }
    Ok((name.to_string(), value.trim().to_string()))
}
