//! One-shot metric sync for the `sync` command.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use hachi_core::providers::{InstagramProvider, YouTubeProvider};
use hachi_core::sync::{IntegrationStatus, SyncReport, sync_provider};
use hachi_core::{Config, Database};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ProviderArg {
    Youtube,
    Instagram,
}

impl ProviderArg {
    pub fn name(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Instagram => "instagram",
        }
    }
}

pub async fn run(
    db: &Database,
    config: &Config,
    provider: ProviderArg,
    date: NaiveDate,
) -> Result<SyncReport> {
    let report = match provider {
        ProviderArg::Youtube => {
            let provider = YouTubeProvider::from_config(&config.sync)
                .context("Failed to build YouTube client")?;
            sync_provider(db, &provider, date).await?
        }
        ProviderArg::Instagram => {
            let provider = InstagramProvider::from_config(&config.sync)
                .context("Failed to build Instagram client")?;
            sync_provider(db, &provider, date).await?
        }
    };
    Ok(report)
}

pub fn print_report(report: &SyncReport) {
    if report.synced.is_empty() && report.failed.is_empty() {
        println!(
            "No workspaces connected to {}. Connect one through the web app first.",
            report.provider
        );
        return;
    }

    println!("Synced {} for {}", report.provider, report.date);
    for ok in &report.synced {
        println!("  {}  {} readings", ok.workspace_id, ok.readings);
    }
    for failed in &report.failed {
        eprintln!("  {}  Error: {}", failed.workspace_id, failed.error);
    }
}

pub fn print_status(status: &IntegrationStatus) {
    if status.connected {
        let account = status.external_account_id.as_deref().unwrap_or("-");
        println!("{} connected to {} ({account})", status.workspace_id, status.provider);
    } else {
        println!("{} is not connected to {}", status.workspace_id, status.provider);
    }
    match status.last_metric_date {
        Some(date) => println!("  last metric  {date}"),
        None => println!("  last metric  never"),
    }
}
