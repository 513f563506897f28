//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `courier` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Printing the response (or saving it to a file)
//!
//! All HTTP handling is implemented in the library crate.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use courier::connection::webpki_verifier;
use courier::initialization::{init_crypto_provider, init_logger_with};
use courier::{ClientContext, LogFormat, LogLevel, Method, Request};

/// Send one HTTP/1.1 request and print the response body.
#[derive(Debug, Parser)]
#[command(name = "courier", version, about)]
struct Cli {
    /// URL to request; `http://` is assumed when no scheme is given
    url: String,

    /// Request method (defaults to POST when -d or -F is given, else GET)
    #[arg(short = 'X', long = "request")]
    method: Option<Method>,

    /// Extra header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Raw request body
    #[arg(short = 'd', long = "data", conflicts_with = "form")]
    data: Option<String>,

    /// Form field as name=value, or name=@path for a file part (repeatable)
    #[arg(short = 'F', long = "form")]
    form: Vec<String>,

    /// Follow up to this many redirects
    #[arg(long, default_value_t = 0)]
    max_redirects: usize,

    /// Connect and read timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Verify server certificates against the webpki root store
    #[arg(long)]
    verify_certs: bool,

    /// Write the body to this file (or into this directory) instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Print the status line and response headers before the body
    #[arg(short = 'i', long)]
    include: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;
    init_crypto_provider();

    if let Err(e) = run(&cli) {
        eprintln!("courier error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let mut request = build_request(cli)?;
    let mut response = request
        .execute_async()
        .with_context(|| format!("Request to {} failed", cli.url))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.include {
        writeln!(
            out,
            "{} {} {}",
            response.version(),
            response.status(),
            response.reason()
        )?;
        for (name, value) in response.headers() {
            writeln!(out, "{name}: {value}")?;
        }
        writeln!(out)?;
    }

    match &cli.output {
        Some(path) => {
            let written = response
                .write_body_to_path(path)
                .with_context(|| format!("Failed to save body to {}", path.display()))?;
            info!("Saved response body to {}", written.display());
        }
        None => {
            response
                .write_body(&mut out)
                .context("Failed to read response body")?;
        }
    }
    Ok(())
}

fn build_request(cli: &Cli) -> Result<Request> {
    let method = cli.method.unwrap_or(if cli.data.is_some() || !cli.form.is_empty() {
        Method::Post
    } else {
        Method::Get
    });
    let context = ClientContext::new();
    let mut request = context
        .request(method, &cli.url)
        .with_context(|| format!("Invalid URL '{}'", cli.url))?;

    for raw in &cli.headers {
        let (name, value) = raw
            .split_once(':')
            .with_context(|| format!("Header '{raw}' is not in 'Name: value' form"))?;
        request = request.header(name.trim(), value.trim(), false);
    }
    if let Some(data) = &cli.data {
        request = request.body(data.as_str());
    }
    for field in &cli.form {
        let (name, value) = field
            .split_once('=')
            .with_context(|| format!("Form field '{field}' is not in 'name=value' form"))?;
        request = match value.strip_prefix('@') {
            Some(path) => request.form_file(name, path),
            None => request.form(name, value),
        };
    }
    if cli.max_redirects > 0 {
        request = request
            .max_redirect_count(cli.max_redirects)
            .set_follow_redirects(true);
    }
    if let Some(ms) = cli.timeout_ms {
        request = request.timeout(Duration::from_millis(ms));
    }
    if cli.verify_certs {
        let verifier = webpki_verifier().context("Failed to build certificate verifier")?;
        request = request.hostname_verifier(verifier);
    }
    Ok(request)
}
