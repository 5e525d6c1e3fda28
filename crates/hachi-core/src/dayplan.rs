//! Day planner: per-day task lists with one-shot carry-over of unfinished work.
//!
//! The first time a workspace asks for "today", a `DayPlan` marker is written
//! and every not-done task from the previous calendar day is copied forward.
//! The marker is committed before the copy, so carry-over runs at most once per
//! (workspace, date) even if the copy itself fails halfway. A concurrent caller
//! that loses the race on the marker insert sees a `Conflict` from the store and
//! treats it as "already initialized".
//!
//! Only the immediately preceding date is considered. A task left open for
//! several days is copied one hop at a time, and each copy's `carried_from`
//! names the day it was copied from, not the day it was first written.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{DayTask, normalize_task_text};
use crate::period::Period;

/// Offset of the reference timezone (Asia/Kolkata, UTC+05:30, no DST).
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Calendar date of `now` in the reference timezone.
pub fn ist_date(now: DateTime<Utc>) -> NaiveDate {
    (now + Duration::seconds(i64::from(IST_OFFSET_SECS))).date_naive()
}

/// Current calendar date in the reference timezone.
pub fn today_ist() -> NaiveDate {
    ist_date(Utc::now())
}

/// Tasks for a single day, as returned by [`today`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayView {
    pub workspace_id: String,
    pub date: NaiveDate,
    pub tasks: Vec<DayTask>,
}

/// One date's tasks inside a [`MonthView`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub tasks: Vec<DayTask>,
}

/// A month of tasks grouped by date, newest date first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthView {
    pub workspace_id: String,
    pub period: Period,
    pub days: Vec<DayGroup>,
}

/// Ensure today's plan exists for the workspace, carrying over yesterday's open tasks once.
pub async fn ensure_today_plan(db: &Database, workspace_id: &str) -> Result<NaiveDate> {
    ensure_plan_for(db, workspace_id, today_ist()).await
}

/// [`ensure_today_plan`] with an explicit reference date.
pub async fn ensure_plan_for(db: &Database, workspace_id: &str, today: NaiveDate) -> Result<NaiveDate> {
    require_workspace_id(workspace_id)?;

    if db.get_day_plan(workspace_id, today).await?.is_some() {
        return Ok(today);
    }

    match db.insert_day_plan(workspace_id, today).await {
        Ok(_) => {}
        Err(Error::Conflict(_)) => {
            tracing::debug!(workspace_id, %today, "day plan initialized concurrently");
            return Ok(today);
        }
        Err(err) => return Err(err),
    }

    let Some(yesterday) = today.pred_opt() else {
        return Ok(today);
    };

    let carried: Vec<DayTask> = db
        .list_open_tasks(workspace_id, yesterday)
        .await?
        .iter()
        .map(|task| task.carried_to(today))
        .collect();

    if !carried.is_empty() {
        db.insert_day_tasks(&carried).await?;
    }
    tracing::info!(
        workspace_id,
        %today,
        carried = carried.len(),
        "initialized day plan"
    );

    Ok(today)
}

/// Ensure today's plan and return its tasks.
pub async fn today(db: &Database, workspace_id: &str) -> Result<DayView> {
    let date = ensure_today_plan(db, workspace_id).await?;
    day(db, workspace_id, date).await
}

/// Tasks for (workspace, date) in creation order. Does not initialize a plan.
pub async fn day(db: &Database, workspace_id: &str, date: NaiveDate) -> Result<DayView> {
    let tasks = db.list_day_tasks(workspace_id, date).await?;
    Ok(DayView {
        workspace_id: workspace_id.to_string(),
        date,
        tasks,
    })
}

/// Add a task to a date.
pub async fn add_task(db: &Database, workspace_id: &str, date: NaiveDate, text: &str) -> Result<DayTask> {
    require_workspace_id(workspace_id)?;
    let task = DayTask::new(workspace_id, date, text)?;
    db.insert_day_task(&task).await?;
    Ok(task)
}

/// Set a task's done flag.
pub async fn toggle_task(
    db: &Database,
    workspace_id: &str,
    date: NaiveDate,
    task_id: Uuid,
    done: bool,
) -> Result<()> {
    db.set_task_done(workspace_id, date, task_id, done).await
}

/// Replace a task's text. The new text is trimmed and must not be empty.
pub async fn edit_task(
    db: &Database,
    workspace_id: &str,
    date: NaiveDate,
    task_id: Uuid,
    text: &str,
) -> Result<()> {
    let text = normalize_task_text(text)?;
    db.set_task_text(workspace_id, date, task_id, &text).await
}

/// Delete a single task.
pub async fn delete_task(db: &Database, workspace_id: &str, date: NaiveDate, task_id: Uuid) -> Result<()> {
    db.delete_day_task(workspace_id, date, task_id).await
}

/// Delete every done task on a date. Returns the number cleared.
pub async fn clear_done(db: &Database, workspace_id: &str, date: NaiveDate) -> Result<u64> {
    db.delete_done_tasks(workspace_id, date).await
}

/// All tasks of a workspace in a month, grouped by date.
pub async fn month(db: &Database, workspace_id: &str, period: Period) -> Result<MonthView> {
    let (start, end) = period.bounds();
    let tasks = db.list_day_tasks_between(workspace_id, start, end).await?;
    Ok(MonthView {
        workspace_id: workspace_id.to_string(),
        period,
        days: group_by_date(tasks),
    })
}

/// Group tasks by date, newest date first, keeping the input order within a date.
pub fn group_by_date(tasks: Vec<DayTask>) -> Vec<DayGroup> {
    let mut days: Vec<DayGroup> = Vec::new();
    for task in tasks {
        match days.iter_mut().find(|group| group.date == task.date) {
            Some(group) => group.tasks.push(task),
            None => days.push(DayGroup {
                date: task.date,
                tasks: vec![task],
            }),
        }
    }
    days.sort_by(|a, b| b.date.cmp(&a.date));
    days
}

fn require_workspace_id(workspace_id: &str) -> Result<()> {
    if workspace_id.trim().is_empty() {
        return Err(Error::Validation("workspace_id is required".to_string()));
    }
    Ok(())
}
