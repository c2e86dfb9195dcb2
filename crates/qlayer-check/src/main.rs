//! qlayer-check CLI
//!
//! Usage:
//!   qlayer-check [--config qlayer.yaml] <query-file> [--turbo] [--consistent]
//!
//! The query file holds SnQL text or a JSON-encoded query; `-` reads stdin.
//! On success the processed query and its fingerprint are printed as JSON.

use anyhow::Context;
use clap::Parser;
use qlayer_check::config::Config;
use qlayer_check::{logging, Checker};
use qlayer_processors::{HttpRequestSettings, RequestSettings, SubscriptionRequestSettings};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "qlayer-check")]
#[command(about = "Validate and process logical queries against configured entities")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, default_value = "qlayer.yaml")]
    config: PathBuf,

    /// Query file (SnQL or JSON), or `-` for stdin
    query: PathBuf,

    /// Run as a turbo request
    #[arg(long)]
    turbo: bool,

    /// Request consistent reads
    #[arg(long)]
    consistent: bool,

    #[arg(long)]
    debug: bool,

    #[arg(long)]
    dry_run: bool,

    /// Treat the query as coming from a subscription
    #[arg(long, conflicts_with_all = ["turbo", "consistent"])]
    subscription: bool,

    #[arg(long, default_value = "cli")]
    referrer: String,
}

impl Cli {
    fn settings(&self) -> Box<dyn RequestSettings> {
        if self.subscription {
            Box::new(SubscriptionRequestSettings::new(self.referrer.clone()))
        } else {
            Box::new(HttpRequestSettings {
                turbo: self.turbo,
                consistent: self.consistent,
                debug: self.debug,
                dry_run: self.dry_run,
                referrer: self.referrer.clone(),
            })
        }
    }
}

fn read_query(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading query from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init(&config.logging)?;

    let checker = Checker::from_config(&config)?;
    let text = read_query(&cli.query)?;
    let report = checker.check(&text, cli.settings().as_ref())?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
