//! CLI entry point for the netfetch tool.

use std::io::Write as _;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use netfetch::{
    Client, ProgressCallback, ProgressInfo, RequestOptions, Response, SessionContext,
    ValidateOptions,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the response body.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let options = request_options(&args);
    let client = Client::new();
    let mut response = client.send(&args.url, options).await?;

    info!(
        status = response.status(),
        url = %response.url(),
        redirects = response.redirect_count(),
        "Response received"
    );
    if !response.ok() {
        warn!(status = response.status(), "Server answered with a non-success status");
    }

    if args.include {
        print_head(&response)?;
    }

    match &args.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {}", path.display()))?;
            let bar = progress_bar(&response, args.quiet);
            let validate = args.checksum.as_ref().map(|expected| {
                ValidateOptions::new(expected.clone())
                    .algorithm(args.algorithm)
                    .encoding(args.encoding)
            });

            let result = response
                .download(&mut file, Some(progress_callback(&bar)), validate)
                .await;
            bar.finish_and_clear();
            result?;
            info!(path = %path.display(), "Download complete");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            response.download(&mut stdout, None, None).await?;
        }
    }

    Ok(())
}

fn request_options(args: &Args) -> RequestOptions {
    let mut options = RequestOptions::new()
        .method(args.method.as_str())
        .follow_redirect(!args.no_follow)
        .max_redirect_count(args.max_redirects)
        .timeout_ms(args.timeout_ms)
        .max_body_bytes(args.max_body_bytes);

    for (name, value) in &args.headers {
        options = options.header(name.as_str(), value.as_str());
    }
    for (key, value) in &args.query {
        options = options.query(key.as_str(), value.as_str());
    }
    if let Some(data) = &args.data {
        options = options.body(data.as_str());
    }
    if let Some(credentials) = &args.credentials {
        options = options.credentials(credentials.username.as_str(), credentials.password.as_str());
    }
    if let Some(partition) = &args.session {
        options = options.session(SessionContext::from_partition(partition));
    }
    options
}

fn print_head(response: &Response) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "HTTP {}", response.status())?;
    for (name, value) in response.headers().lines() {
        writeln!(out, "{name}: {value}")?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn progress_bar(response: &Response, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    match response.content_length() {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bar:40} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner
        }
    }
}

fn progress_callback(bar: &ProgressBar) -> ProgressCallback {
    let bar = bar.clone();
    Box::new(move |info: ProgressInfo| {
        if bar.length().is_some_and(|len| info.total > len) {
            bar.set_length(info.total);
        }
        bar.set_position(info.transferred);
    })
}
