//! Wins: dated accomplishments that feed report highlights.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Win;

/// Default page size for [`list_wins`].
pub const DEFAULT_LIMIT: i64 = 20;
/// Upper bound accepted for [`list_wins`].
pub const MAX_LIMIT: i64 = 100;

/// Input for [`create_win`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWin {
    pub workspace_id: String,
    pub date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub effort_mins: i64,
}

/// Record a win.
pub async fn create_win(db: &Database, new: NewWin) -> Result<Win> {
    if new.workspace_id.trim().is_empty() {
        return Err(Error::Validation("workspace_id is required".to_string()));
    }
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    if new.effort_mins < 0 {
        return Err(Error::Validation("effort_mins must not be negative".to_string()));
    }

    let win = Win {
        id: Uuid::new_v4(),
        workspace_id: new.workspace_id,
        date: new.date,
        title: title.to_string(),
        description: new.description.filter(|d| !d.trim().is_empty()),
        tags: new.tags.filter(|t| !t.trim().is_empty()),
        effort_mins: new.effort_mins,
    };
    db.insert_win(&win).await?;
    Ok(win)
}

/// Most recent wins of a workspace. `limit` must be within 1..=100.
pub async fn list_wins(db: &Database, workspace_id: &str, limit: Option<i64>) -> Result<Vec<Win>> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(Error::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    db.list_wins(workspace_id, None, limit).await
}
