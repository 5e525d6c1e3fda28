//! Metric sync: pull readings from third-party providers into daily metrics.
//!
//! Scheduling is left to the caller (cron, the CLI `sync` command, ...). One
//! run walks every workspace connected to a provider; a failure for one
//! workspace is logged and recorded, and the run moves on to the next.

use std::future::Future;

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Integration, Kpi, Metric};

/// One value read from a provider, with the KPI it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub kpi: Kpi,
    pub value: f64,
}

/// A source of metric readings for connected workspaces.
pub trait MetricProvider {
    /// Provider name as stored on integrations (e.g. `youtube`).
    fn provider(&self) -> &'static str;

    /// Provenance tag written to `Metric::source`.
    fn source(&self) -> &'static str;

    /// Read the current snapshot for one connected workspace.
    fn fetch(&self, integration: &Integration) -> impl Future<Output = Result<Vec<Reading>>> + Send;
}

/// Workspace that synced successfully.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSynced {
    pub workspace_id: String,
    pub readings: usize,
}

/// Workspace whose sync failed.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceFailed {
    pub workspace_id: String,
    pub error: String,
}

/// Outcome of a provider run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub provider: String,
    pub date: NaiveDate,
    pub synced: Vec<WorkspaceSynced>,
    pub failed: Vec<WorkspaceFailed>,
}

/// Providers a workspace can connect.
pub const PROVIDERS: [&str; 2] = ["youtube", "instagram"];

/// Connection state of one workspace for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationStatus {
    pub provider: String,
    pub workspace_id: String,
    pub connected: bool,
    pub external_account_id: Option<String>,
    pub last_metric_date: Option<NaiveDate>,
}

fn require_provider(provider: &str) -> Result<()> {
    if PROVIDERS.contains(&provider) {
        Ok(())
    } else {
        Err(Error::Validation(format!("unknown provider '{provider}'")))
    }
}

/// Whether `workspace_id` is connected to `provider`, and the date of the
/// newest metric that provider wrote for it.
pub async fn integration_status(
    db: &Database,
    provider: &str,
    workspace_id: &str,
) -> Result<IntegrationStatus> {
    require_provider(provider)?;
    let integration = db.get_integration(workspace_id, provider).await?;
    let last_metric_date = db
        .last_metric_date(&format!("{provider}:"), Some(workspace_id))
        .await?;

    Ok(IntegrationStatus {
        provider: provider.to_string(),
        workspace_id: workspace_id.to_string(),
        connected: integration.is_some(),
        external_account_id: integration.and_then(|i| i.external_account_id),
        last_metric_date,
    })
}

/// Drop a workspace's connection to `provider`. Metrics already recorded stay.
///
/// Returns whether the workspace was connected.
pub async fn disconnect(db: &Database, provider: &str, workspace_id: &str) -> Result<bool> {
    require_provider(provider)?;
    let removed = db.delete_integration(workspace_id, provider).await?;
    if removed {
        tracing::info!(provider, workspace_id, "disconnected");
    }
    Ok(removed)
}

/// Sync every workspace connected to `provider`, writing readings for `date`.
pub async fn sync_provider<P: MetricProvider>(
    db: &Database,
    provider: &P,
    date: NaiveDate,
) -> Result<SyncReport> {
    let integrations = db.list_integrations(provider.provider()).await?;
    let mut report = SyncReport {
        provider: provider.provider().to_string(),
        date,
        synced: Vec::new(),
        failed: Vec::new(),
    };

    for integration in &integrations {
        let workspace_id = integration.workspace_id.as_str();
        match sync_workspace(db, provider, integration, date).await {
            Ok(readings) => {
                tracing::info!(provider = provider.provider(), workspace_id, readings, "synced");
                report.synced.push(WorkspaceSynced {
                    workspace_id: workspace_id.to_string(),
                    readings,
                });
            }
            Err(err) => {
                tracing::warn!(provider = provider.provider(), workspace_id, error = %err, "sync failed");
                report.failed.push(WorkspaceFailed {
                    workspace_id: workspace_id.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Sync a single connected workspace. Returns the number of readings written.
pub async fn sync_workspace<P: MetricProvider>(
    db: &Database,
    provider: &P,
    integration: &Integration,
    date: NaiveDate,
) -> Result<usize> {
    let readings = provider.fetch(integration).await?;

    for reading in &readings {
        if db.ensure_kpi(&reading.kpi).await? {
            tracing::debug!(kpi_id = reading.kpi.id.as_str(), "created KPI");
        }
        db.upsert_metric(&Metric {
            kpi_id: reading.kpi.id.clone(),
            date,
            value: reading.value,
            source: Some(provider.source().to_string()),
            workspace_id: Some(integration.workspace_id.clone()),
        })
        .await?;
    }

    Ok(readings.len())
}
