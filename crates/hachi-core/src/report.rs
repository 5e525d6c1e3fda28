//! Monthly report preview: KPI summary plus the month's highlights.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Workspace;
use crate::period::Period;
use crate::progress::{KpiCard, workspace_month_report};

/// Options for [`preview`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewOptions {
    pub limit_kpis: usize,
    pub limit_wins: i64,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            limit_kpis: 5,
            limit_wins: 5,
        }
    }
}

/// A win as shown in a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    pub date: NaiveDate,
    pub title: String,
    pub tags: Option<String>,
}

/// Summary of a workspace's month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPreview {
    pub generated_at: DateTime<Utc>,
    pub workspace: Workspace,
    pub period: Period,
    /// Most-behind KPIs first.
    pub kpi_summary: Vec<KpiCard>,
    /// Newest wins first.
    pub highlights: Vec<Highlight>,
    pub notes: String,
}

/// Build the report preview for a workspace and month.
pub async fn preview(
    db: &Database,
    workspace_id: &str,
    period: Period,
    opts: PreviewOptions,
) -> Result<ReportPreview> {
    if opts.limit_wins < 0 {
        return Err(Error::Validation("limit_wins must not be negative".to_string()));
    }
    let workspace = db
        .get_workspace(workspace_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("workspace '{workspace_id}'")))?;

    let mut kpi_summary = workspace_month_report(db, workspace_id, period).await?;
    kpi_summary.truncate(opts.limit_kpis);

    let highlights = if opts.limit_wins == 0 {
        Vec::new()
    } else {
        db.list_wins(workspace_id, Some(period.bounds()), opts.limit_wins)
            .await?
            .into_iter()
            .map(|win| Highlight {
                date: win.date,
                title: win.title,
                tags: win.tags,
            })
            .collect()
    };

    Ok(ReportPreview {
        generated_at: Utc::now(),
        workspace,
        period,
        kpi_summary,
        highlights,
        notes: String::new(),
    })
}
