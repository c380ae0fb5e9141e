//! Beacon driver.
//!
//! Reads one JSON object per line on stdin, `{"request": {...}, "cookies": {...}}`,
//! and writes one identity context per line on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use beacon_ids::SystemClock;
use beacon_session::{BeaconConfig, CookieIds, FileStoreProvider, IdentityRouter, MemoryStoreProvider, RequestAttributes, StoreProvider};
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Anonymous visitor identity resolver")]
struct Args {
	/// TOML configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	/// Persist state as JSON files under this directory instead of in memory
	#[arg(long, value_name = "DIR")]
	state_dir: Option<PathBuf>,
}

/// One input line.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Input {
	request: RequestAttributes,
	cookies: CookieIds,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let config = load_config(args.config.as_deref());
	let provider: Arc<dyn StoreProvider> = match &args.state_dir {
		Some(dir) => Arc::new(FileStoreProvider::new(dir).with_context(|| format!("opening state dir {}", dir.display()))?),
		None => Arc::new(MemoryStoreProvider::new()),
	};
	info!(state_dir = ?args.state_dir, session_timeout = ?config.session_timeout, "starting beacon");

	let router = IdentityRouter::new(provider, Arc::new(SystemClock), &config);
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdout = tokio::io::stdout();

	while let Some(line) = lines.next_line().await.context("reading stdin")? {
		let input = match parse_line(&line) {
			None => continue,
			Some(Ok(input)) => input,
			Some(Err(error)) => {
				warn!(%error, "skipping malformed line");
				continue;
			}
		};
		let ctx = router.resolve(&input.request, &input.cookies).await;
		let mut out = serde_json::to_vec(&ctx)?;
		out.push(b'\n');
		stdout.write_all(&out).await?;
		stdout.flush().await?;
	}

	router.directory().shutdown_all().await;
	Ok(())
}

/// `None` for blank lines.
fn parse_line(line: &str) -> Option<Result<Input, serde_json::Error>> {
	let line = line.trim();
	(!line.is_empty()).then(|| serde_json::from_str(line))
}

/// Loads configuration, falling back to defaults on any error.
fn load_config(path: Option<&Path>) -> BeaconConfig {
	let Some(path) = path else {
		return BeaconConfig::default();
	};
	match BeaconConfig::load(path) {
		Ok(config) => {
			for warning in &config.warnings {
				warn!(path = %path.display(), %warning, "config value ignored");
			}
			config
		}
		Err(error) => {
			warn!(path = %path.display(), %error, "config unusable; using defaults");
			BeaconConfig::default()
		}
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("beacon=debug,beacon_session=debug,beacon_worker=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn parses_request_and_cookies() {
		let input = parse_line(r#"{"request":{"ip":"203.0.113.7","colo":"AMS"},"cookies":{"clientID":"0OkFuMW0clientclient"}}"#)
			.unwrap()
			.unwrap();
		assert_eq!(input.request.remote_addr.as_deref(), Some("203.0.113.7"));
		assert_eq!(input.request.colo.as_deref(), Some("AMS"));
		assert_eq!(input.cookies.client_id(), Some("0OkFuMW0clientclient"));
	}

	#[test]
	fn missing_sections_default_and_blank_lines_skip() {
		let input = parse_line("{}").unwrap().unwrap();
		assert_eq!(input.request, RequestAttributes::default());
		assert!(parse_line("   ").is_none());
		assert!(parse_line("{nope").unwrap().is_err());
	}

	#[test]
	fn missing_config_file_falls_back_to_defaults() {
		assert_eq!(load_config(Some(Path::new("/nonexistent/beacon.toml"))), BeaconConfig::default());
		assert_eq!(load_config(None), BeaconConfig::default());
	}

	#[test]
	fn cli_accepts_all_flags() {
		let args = Args::try_parse_from(["beacon", "--config", "b.toml", "--verbose", "--state-dir", "/tmp/state"]).unwrap();
		assert_eq!(args.config, Some(PathBuf::from("b.toml")));
		assert!(args.verbose);
		assert_eq!(args.state_dir, Some(PathBuf::from("/tmp/state")));
	}
}
