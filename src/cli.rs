//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use netfetch::constants::{DEFAULT_MAX_REDIRECT_COUNT, DEFAULT_METHOD, DEFAULT_TIMEOUT_MS};
use netfetch::{Credentials, DigestAlgorithm, DigestEncoding};

/// Send one HTTP request and print or save the response.
///
/// Netfetch follows redirects, enforces timeouts and body size caps, and can
/// stream the body to a file while validating its checksum.
#[derive(Parser, Debug)]
#[command(name = "netfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Absolute http(s) URL to request
    pub url: String,

    /// Request method
    #[arg(short = 'X', long = "request", default_value = DEFAULT_METHOD)]
    pub method: String,

    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Query parameter as "key=value" appended to the URL (repeatable)
    #[arg(long = "query", value_parser = parse_query)]
    pub query: Vec<(String, String)>,

    /// Request body sent as text
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// Return redirect responses instead of following them
    #[arg(long)]
    pub no_follow: bool,

    /// Maximum number of redirects to follow
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECT_COUNT)]
    pub max_redirects: u32,

    /// Response timeout in milliseconds (0 to disable)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes (0 for no limit)
    #[arg(long, default_value_t = 0)]
    pub max_body_bytes: u64,

    /// Credentials for login challenges as "user:password"
    #[arg(short = 'u', long = "user", value_parser = parse_credentials)]
    pub credentials: Option<Credentials>,

    /// Cookie partition to send the request in
    #[arg(long)]
    pub session: Option<String>,

    /// Write the response body to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Expected checksum of the downloaded body (requires --output)
    #[arg(long, requires = "output")]
    pub checksum: Option<String>,

    /// Checksum algorithm
    #[arg(long, default_value = "md5")]
    pub algorithm: DigestAlgorithm,

    /// Checksum text encoding (base64, base64url, hex, binary)
    #[arg(long, default_value = "base64")]
    pub encoding: DigestEncoding,

    /// Print the status line and response headers
    #[arg(short = 'i', long)]
    pub include: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_query(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
    if key.is_empty() {
        return Err(format!("empty query key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_credentials(raw: &str) -> Result<Credentials, String> {
    raw.split_once(':')
        .map(|(user, password)| Credentials::new(user, password))
        .ok_or_else(|| "expected \"user:password\"".to_string())
}
