//! Database operations for hachi.

use crate::error::{Error, Result, is_unique_violation};
use crate::models::*;
use crate::period::Period;
use crate::schema::SCHEMA;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Database handle for hachi.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Initialize schema.
    async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database.
    pub async fn close(self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Workspaces
    // =========================================================================

    /// Create a workspace. Fails with `Conflict` if the id is taken.
    pub async fn create_workspace(&self, workspace: &Workspace) -> Result<()> {
        let result = sqlx::query("INSERT INTO workspaces (id, name) VALUES (?, ?)")
            .bind(&workspace.id)
            .bind(&workspace.name)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict(format!("workspace '{}'", workspace.id)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get a workspace by ID.
    pub async fn get_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        let row = sqlx::query("SELECT id, name FROM workspaces WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Workspace {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    /// Attach a KPI to a workspace. Attaching twice is a no-op.
    pub async fn attach_kpi(&self, workspace_id: &str, kpi_id: &str) -> Result<()> {
        if self.get_workspace(workspace_id).await?.is_none() {
            return Err(Error::NotFound(format!("workspace '{workspace_id}'")));
        }
        if self.get_kpi(kpi_id).await?.is_none() {
            return Err(Error::NotFound(format!("kpi '{kpi_id}'")));
        }

        sqlx::query("INSERT OR IGNORE INTO workspace_kpis (workspace_id, kpi_id) VALUES (?, ?)")
            .bind(workspace_id)
            .bind(kpi_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// KPI ids attached to a workspace, in attachment order.
    pub async fn list_attached_kpi_ids(&self, workspace_id: &str) -> Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT kpi_id FROM workspace_kpis WHERE workspace_id = ? ORDER BY rowid")
                .bind(workspace_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|row| row.get("kpi_id")).collect())
    }

    // =========================================================================
    // KPIs
    // =========================================================================

    /// Create a KPI. Fails with `Conflict` if the id is taken.
    pub async fn create_kpi(&self, kpi: &Kpi) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO kpis (id, name, channel, unit, aggregation) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&kpi.id)
        .bind(&kpi.name)
        .bind(&kpi.channel)
        .bind(&kpi.unit)
        .bind(kpi.aggregation.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict(format!("kpi '{}'", kpi.id)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Create a KPI unless one with the same id already exists.
    ///
    /// Returns `true` if a new row was inserted.
    pub async fn ensure_kpi(&self, kpi: &Kpi) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO kpis (id, name, channel, unit, aggregation) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&kpi.id)
        .bind(&kpi.name)
        .bind(&kpi.channel)
        .bind(&kpi.unit)
        .bind(kpi.aggregation.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a KPI by ID.
    pub async fn get_kpi(&self, id: &str) -> Result<Option<Kpi>> {
        let row = sqlx::query("SELECT * FROM kpis WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(kpi_from_row))
    }

    /// List all KPIs.
    pub async fn list_kpis(&self) -> Result<Vec<Kpi>> {
        let rows = sqlx::query("SELECT * FROM kpis ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(kpi_from_row).collect())
    }

    // =========================================================================
    // Goals
    // =========================================================================

    /// Create a goal. Fails with `Conflict` if one exists for the same scope.
    pub async fn create_goal(
        &self,
        workspace_id: Option<&str>,
        kpi_id: &str,
        period: Period,
        target_value: f64,
    ) -> Result<Goal> {
        validate_target(target_value)?;
        self.require_kpi(kpi_id).await?;
        let goal = Goal {
            id: Goal::make_id(workspace_id, kpi_id, period),
            kpi_id: kpi_id.to_string(),
            period,
            target_value,
            workspace_id: workspace_id.map(ToOwned::to_owned),
        };

        let result = sqlx::query(
            "INSERT INTO goals (id, kpi_id, period, target_value, workspace_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&goal.id)
        .bind(&goal.kpi_id)
        .bind(goal.period.to_string())
        .bind(goal.target_value)
        .bind(&goal.workspace_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(goal),
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict(format!("goal '{}'", goal.id)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Create or update the goal for (workspace, kpi, period).
    pub async fn set_goal(
        &self,
        workspace_id: Option<&str>,
        kpi_id: &str,
        period: Period,
        target_value: f64,
    ) -> Result<Goal> {
        validate_target(target_value)?;
        self.require_kpi(kpi_id).await?;
        let goal = Goal {
            id: Goal::make_id(workspace_id, kpi_id, period),
            kpi_id: kpi_id.to_string(),
            period,
            target_value,
            workspace_id: workspace_id.map(ToOwned::to_owned),
        };

        sqlx::query(
            r#"
            INSERT INTO goals (id, kpi_id, period, target_value, workspace_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                target_value = excluded.target_value
            "#,
        )
        .bind(&goal.id)
        .bind(&goal.kpi_id)
        .bind(goal.period.to_string())
        .bind(goal.target_value)
        .bind(&goal.workspace_id)
        .execute(&self.pool)
        .await?;
        Ok(goal)
    }

    /// Goal for a KPI and period.
    ///
    /// With a workspace, a workspace-scoped goal wins over the global one.
    pub async fn get_goal(
        &self,
        kpi_id: &str,
        period: Period,
        workspace_id: Option<&str>,
    ) -> Result<Option<Goal>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM goals
            WHERE kpi_id = ? AND period = ?
              AND (workspace_id IS ? OR workspace_id IS NULL)
            ORDER BY workspace_id IS NULL
            LIMIT 1
            "#,
        )
        .bind(kpi_id)
        .bind(period.to_string())
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(goal_from_row).transpose()
    }

    async fn require_kpi(&self, kpi_id: &str) -> Result<Kpi> {
        self.get_kpi(kpi_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("kpi '{kpi_id}'")))
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Record a metric value, replacing any existing row for the same
    /// (kpi, date, workspace) scope.
    pub async fn upsert_metric(&self, metric: &Metric) -> Result<()> {
        let date = format_date(metric.date);
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM metrics WHERE kpi_id = ? AND date = ? AND workspace_id IS ?")
            .bind(&metric.kpi_id)
            .bind(&date)
            .bind(&metric.workspace_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO metrics (kpi_id, date, value, source, workspace_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&metric.kpi_id)
        .bind(&date)
        .bind(metric.value)
        .bind(&metric.source)
        .bind(&metric.workspace_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Metric samples for a KPI in `[start, end)`, ascending by date.
    ///
    /// `workspace_id` narrows to one scope; `None` returns every scope.
    pub async fn list_metrics(
        &self,
        kpi_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        workspace_id: Option<&str>,
    ) -> Result<Vec<MetricPoint>> {
        let mut sql =
            String::from("SELECT date, value FROM metrics WHERE kpi_id = ? AND date >= ? AND date < ?");
        if workspace_id.is_some() {
            sql.push_str(" AND workspace_id = ?");
        }
        sql.push_str(" ORDER BY date ASC, id ASC");

        let mut query = sqlx::query(&sql)
            .bind(kpi_id)
            .bind(format_date(start))
            .bind(format_date(end));
        if let Some(workspace_id) = workspace_id {
            query = query.bind(workspace_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            points.push(MetricPoint {
                date: parse_date(row.get::<&str, _>("date"))?,
                value: row.get("value"),
            });
        }
        Ok(points)
    }

    /// Most recent metric date for a source prefix (e.g. `youtube:`), optionally per workspace.
    pub async fn last_metric_date(
        &self,
        source_prefix: &str,
        workspace_id: Option<&str>,
    ) -> Result<Option<NaiveDate>> {
        let mut sql = String::from("SELECT MAX(date) AS last FROM metrics WHERE source LIKE ?");
        if workspace_id.is_some() {
            sql.push_str(" AND workspace_id = ?");
        }

        let mut query = sqlx::query(&sql).bind(format!("{source_prefix}%"));
        if let Some(workspace_id) = workspace_id {
            query = query.bind(workspace_id);
        }

        let row = query.fetch_one(&self.pool).await?;
        row.get::<Option<String>, _>("last")
            .map(|s| parse_date(&s))
            .transpose()
    }

    // =========================================================================
    // Day plans
    // =========================================================================

    /// Get the plan marker for (workspace, date).
    pub async fn get_day_plan(&self, workspace_id: &str, date: NaiveDate) -> Result<Option<DayPlan>> {
        let row = sqlx::query("SELECT * FROM day_plans WHERE workspace_id = ? AND date = ?")
            .bind(workspace_id)
            .bind(format_date(date))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(day_plan_from_row).transpose()
    }

    /// Insert the plan marker for (workspace, date).
    ///
    /// Fails with `Conflict` if the marker already exists.
    pub async fn insert_day_plan(&self, workspace_id: &str, date: NaiveDate) -> Result<DayPlan> {
        let plan = DayPlan {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.to_string(),
            date,
            initialized_at: Utc::now(),
        };

        let result = sqlx::query(
            "INSERT INTO day_plans (id, workspace_id, date, initialized_at) VALUES (?, ?, ?, ?)",
        )
        .bind(plan.id.to_string())
        .bind(&plan.workspace_id)
        .bind(format_date(plan.date))
        .bind(plan.initialized_at.timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(plan),
            Err(err) if is_unique_violation(&err) => Err(Error::Conflict(format!(
                "day plan for '{workspace_id}' on {}",
                format_date(date)
            ))),
            Err(err) => Err(err.into()),
        }
    }

    // =========================================================================
    // Day tasks
    // =========================================================================

    /// Insert a single task.
    pub async fn insert_day_task(&self, task: &DayTask) -> Result<()> {
        insert_day_task_with(&self.pool, task).await
    }

    /// Insert several tasks in one transaction.
    pub async fn insert_day_tasks(&self, tasks: &[DayTask]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for task in tasks {
            insert_day_task_with(&mut *tx, task).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Get a task by (workspace, date, id).
    pub async fn get_day_task(
        &self,
        workspace_id: &str,
        date: NaiveDate,
        id: Uuid,
    ) -> Result<Option<DayTask>> {
        let row = sqlx::query("SELECT * FROM day_tasks WHERE id = ? AND workspace_id = ? AND date = ?")
            .bind(id.to_string())
            .bind(workspace_id)
            .bind(format_date(date))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(day_task_from_row).transpose()
    }

    /// Tasks for (workspace, date) in creation order.
    pub async fn list_day_tasks(&self, workspace_id: &str, date: NaiveDate) -> Result<Vec<DayTask>> {
        let rows = sqlx::query(
            "SELECT * FROM day_tasks WHERE workspace_id = ? AND date = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(workspace_id)
        .bind(format_date(date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(day_task_from_row).collect()
    }

    /// Not-done tasks for (workspace, date) in creation order.
    pub async fn list_open_tasks(&self, workspace_id: &str, date: NaiveDate) -> Result<Vec<DayTask>> {
        let rows = sqlx::query(
            "SELECT * FROM day_tasks WHERE workspace_id = ? AND date = ? AND done = 0 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(workspace_id)
        .bind(format_date(date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(day_task_from_row).collect()
    }

    /// Tasks of a workspace within `[start, end)`, newest date first, then creation order.
    pub async fn list_day_tasks_between(
        &self,
        workspace_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayTask>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM day_tasks
            WHERE workspace_id = ? AND date >= ? AND date < ?
            ORDER BY date DESC, created_at ASC, rowid ASC
            "#,
        )
        .bind(workspace_id)
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(day_task_from_row).collect()
    }

    /// Set the done flag of a task.
    pub async fn set_task_done(
        &self,
        workspace_id: &str,
        date: NaiveDate,
        id: Uuid,
        done: bool,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE day_tasks SET done = ? WHERE id = ? AND workspace_id = ? AND date = ?")
                .bind(done)
                .bind(id.to_string())
                .bind(workspace_id)
                .bind(format_date(date))
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("task '{id}'")));
        }
        Ok(())
    }

    /// Replace the text of a task. The caller is responsible for trimming.
    pub async fn set_task_text(
        &self,
        workspace_id: &str,
        date: NaiveDate,
        id: Uuid,
        text: &str,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE day_tasks SET text = ? WHERE id = ? AND workspace_id = ? AND date = ?")
                .bind(text)
                .bind(id.to_string())
                .bind(workspace_id)
                .bind(format_date(date))
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("task '{id}'")));
        }
        Ok(())
    }

    /// Delete a task.
    pub async fn delete_day_task(&self, workspace_id: &str, date: NaiveDate, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM day_tasks WHERE id = ? AND workspace_id = ? AND date = ?")
            .bind(id.to_string())
            .bind(workspace_id)
            .bind(format_date(date))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("task '{id}'")));
        }
        Ok(())
    }

    /// Delete every done task for (workspace, date). Returns the number removed.
    pub async fn delete_done_tasks(&self, workspace_id: &str, date: NaiveDate) -> Result<u64> {
        let result = sqlx::query("DELETE FROM day_tasks WHERE workspace_id = ? AND date = ? AND done = 1")
            .bind(workspace_id)
            .bind(format_date(date))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Wins
    // =========================================================================

    /// Insert a win.
    pub async fn insert_win(&self, win: &Win) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wins (id, workspace_id, date, title, description, tags, effort_mins)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(win.id.to_string())
        .bind(&win.workspace_id)
        .bind(format_date(win.date))
        .bind(&win.title)
        .bind(&win.description)
        .bind(&win.tags)
        .bind(win.effort_mins)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent wins of a workspace, optionally restricted to `[start, end)`.
    pub async fn list_wins(
        &self,
        workspace_id: &str,
        range: Option<(NaiveDate, NaiveDate)>,
        limit: i64,
    ) -> Result<Vec<Win>> {
        let mut sql = String::from("SELECT * FROM wins WHERE workspace_id = ?");
        if range.is_some() {
            sql.push_str(" AND date >= ? AND date < ?");
        }
        sql.push_str(" ORDER BY date DESC, rowid DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(workspace_id);
        if let Some((start, end)) = range {
            query = query.bind(format_date(start)).bind(format_date(end));
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        rows.iter().map(win_from_row).collect()
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Insert a reference.
    pub async fn insert_reference(&self, reference: &Reference) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO "references" (id, workspace_id, url, note, title, description, thumbnail, platform, tags, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reference.id.to_string())
        .bind(&reference.workspace_id)
        .bind(&reference.url)
        .bind(&reference.note)
        .bind(&reference.title)
        .bind(&reference.description)
        .bind(&reference.thumbnail)
        .bind(&reference.platform)
        .bind(serde_json::to_string(&reference.tags)?)
        .bind(reference.created_at.timestamp())
        .bind(reference.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a reference by (workspace, id).
    pub async fn get_reference(&self, workspace_id: &str, id: Uuid) -> Result<Option<Reference>> {
        let row = sqlx::query(r#"SELECT * FROM "references" WHERE id = ? AND workspace_id = ?"#)
            .bind(id.to_string())
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(reference_from_row).transpose()
    }

    /// References of a workspace, newest first.
    pub async fn list_references(&self, workspace_id: &str) -> Result<Vec<Reference>> {
        let rows = sqlx::query(
            r#"SELECT * FROM "references" WHERE workspace_id = ? ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reference_from_row).collect()
    }

    /// Update the note and/or tags of a reference; `None` leaves a field untouched.
    pub async fn update_reference(
        &self,
        workspace_id: &str,
        id: Uuid,
        note: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Reference> {
        let tags_json = tags.map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            r#"
            UPDATE "references" SET
                note = COALESCE(?, note),
                tags = COALESCE(?, tags),
                updated_at = ?
            WHERE id = ? AND workspace_id = ?
            "#,
        )
        .bind(note)
        .bind(tags_json)
        .bind(Utc::now().timestamp())
        .bind(id.to_string())
        .bind(workspace_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("reference '{id}'")));
        }
        self.get_reference(workspace_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reference '{id}'")))
    }

    /// Delete a reference.
    pub async fn delete_reference(&self, workspace_id: &str, id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM "references" WHERE id = ? AND workspace_id = ?"#)
            .bind(id.to_string())
            .bind(workspace_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("reference '{id}'")));
        }
        Ok(())
    }

    // =========================================================================
    // Integrations
    // =========================================================================

    /// Upsert the integration for (workspace, provider).
    pub async fn upsert_integration(&self, integration: &Integration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO integrations (id, workspace_id, provider, external_account_id, access_token, refresh_token, scope, expiry, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(workspace_id, provider) DO UPDATE SET
                external_account_id = excluded.external_account_id,
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, integrations.refresh_token),
                scope = excluded.scope,
                expiry = excluded.expiry,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(integration.id.to_string())
        .bind(&integration.workspace_id)
        .bind(&integration.provider)
        .bind(&integration.external_account_id)
        .bind(&integration.access_token)
        .bind(&integration.refresh_token)
        .bind(&integration.scope)
        .bind(integration.expiry.map(|dt| dt.timestamp()))
        .bind(integration.created_at.timestamp())
        .bind(integration.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the integration for (workspace, provider).
    pub async fn get_integration(
        &self,
        workspace_id: &str,
        provider: &str,
    ) -> Result<Option<Integration>> {
        let row = sqlx::query("SELECT * FROM integrations WHERE workspace_id = ? AND provider = ?")
            .bind(workspace_id)
            .bind(provider)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(integration_from_row).transpose()
    }

    /// Every integration for a provider, ordered by workspace.
    pub async fn list_integrations(&self, provider: &str) -> Result<Vec<Integration>> {
        let rows = sqlx::query("SELECT * FROM integrations WHERE provider = ? ORDER BY workspace_id")
            .bind(provider)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(integration_from_row).collect()
    }

    /// Remove the integration for (workspace, provider). Returns whether one existed.
    pub async fn delete_integration(&self, workspace_id: &str, provider: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM integrations WHERE workspace_id = ? AND provider = ?")
            .bind(workspace_id)
            .bind(provider)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // OAuth state
    // =========================================================================

    /// Store pending OAuth flow context under a fresh opaque token.
    pub async fn put_oauth_state(
        &self,
        provider: &str,
        workspace_id: &str,
        payload: &serde_json::Value,
        ttl: Duration,
    ) -> Result<OAuthState> {
        let state = OAuthState {
            token: Uuid::new_v4().simple().to_string(),
            provider: provider.to_string(),
            workspace_id: workspace_id.to_string(),
            payload: payload.clone(),
            expires_at: Utc::now() + ttl,
        };

        sqlx::query(
            "INSERT INTO oauth_states (token, provider, workspace_id, payload, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&state.token)
        .bind(&state.provider)
        .bind(&state.workspace_id)
        .bind(state.payload.to_string())
        .bind(state.expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(state)
    }

    /// Consume a state token. Returns `None` if unknown, already used, or expired.
    pub async fn take_oauth_state(&self, token: &str) -> Result<Option<OAuthState>> {
        let row = sqlx::query("DELETE FROM oauth_states WHERE token = ? RETURNING *")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let state = OAuthState {
            token: row.get("token"),
            provider: row.get("provider"),
            workspace_id: row.get("workspace_id"),
            payload: serde_json::from_str(row.get::<&str, _>("payload"))?,
            expires_at: timestamp_to_utc(row.get("expires_at")),
        };

        if state.expires_at <= Utc::now() {
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Remove expired state tokens. Returns the number removed.
    pub async fn purge_expired_oauth_states(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_day_task_with<'e, E>(executor: E, task: &DayTask) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO day_tasks (id, workspace_id, date, text, done, carried_from, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.id.to_string())
    .bind(&task.workspace_id)
    .bind(format_date(task.date))
    .bind(&task.text)
    .bind(task.done)
    .bind(task.carried_from.map(format_date))
    .bind(task.created_at.timestamp())
    .execute(executor)
    .await?;
    Ok(())
}

fn timestamp_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Other(format!("invalid id '{s}': {e}")))
}

fn kpi_from_row(row: &SqliteRow) -> Kpi {
    Kpi {
        id: row.get("id"),
        name: row.get("name"),
        channel: row.get("channel"),
        unit: row.get("unit"),
        aggregation: row
            .get::<&str, _>("aggregation")
            .parse()
            .unwrap_or_default(),
    }
}

fn validate_target(target_value: f64) -> Result<()> {
    if !target_value.is_finite() || target_value < 0.0 {
        return Err(Error::Validation(format!(
            "goal target must be a finite, non-negative number (got {target_value})"
        )));
    }
    Ok(())
}

fn goal_from_row(row: &SqliteRow) -> Result<Goal> {
    Ok(Goal {
        id: row.get("id"),
        kpi_id: row.get("kpi_id"),
        period: row.get::<&str, _>("period").parse()?,
        target_value: row.get("target_value"),
        workspace_id: row.get("workspace_id"),
    })
}

fn day_plan_from_row(row: &SqliteRow) -> Result<DayPlan> {
    Ok(DayPlan {
        id: parse_uuid(row.get("id"))?,
        workspace_id: row.get("workspace_id"),
        date: parse_date(row.get("date"))?,
        initialized_at: timestamp_to_utc(row.get("initialized_at")),
    })
}

fn day_task_from_row(row: &SqliteRow) -> Result<DayTask> {
    Ok(DayTask {
        id: parse_uuid(row.get("id"))?,
        workspace_id: row.get("workspace_id"),
        date: parse_date(row.get("date"))?,
        text: row.get("text"),
        done: row.get("done"),
        carried_from: row
            .get::<Option<&str>, _>("carried_from")
            .map(parse_date)
            .transpose()?,
        created_at: timestamp_to_utc(row.get("created_at")),
    })
}

fn win_from_row(row: &SqliteRow) -> Result<Win> {
    Ok(Win {
        id: parse_uuid(row.get("id"))?,
        workspace_id: row.get("workspace_id"),
        date: parse_date(row.get("date"))?,
        title: row.get("title"),
        description: row.get("description"),
        tags: row.get("tags"),
        effort_mins: row.get("effort_mins"),
    })
}

fn reference_from_row(row: &SqliteRow) -> Result<Reference> {
    Ok(Reference {
        id: parse_uuid(row.get("id"))?,
        workspace_id: row.get("workspace_id"),
        url: row.get("url"),
        note: row.get("note"),
        title: row.get("title"),
        description: row.get("description"),
        thumbnail: row.get("thumbnail"),
        platform: row.get("platform"),
        tags: row
            .get::<Option<String>, _>("tags")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        created_at: timestamp_to_utc(row.get("created_at")),
        updated_at: timestamp_to_utc(row.get("updated_at")),
    })
}

fn integration_from_row(row: &SqliteRow) -> Result<Integration> {
    Ok(Integration {
        id: parse_uuid(row.get("id"))?,
        workspace_id: row.get("workspace_id"),
        provider: row.get("provider"),
        external_account_id: row.get("external_account_id"),
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        scope: row.get("scope"),
        expiry: row.get::<Option<i64>, _>("expiry").map(timestamp_to_utc),
        created_at: timestamp_to_utc(row.get("created_at")),
        updated_at: timestamp_to_utc(row.get("updated_at")),
    })
}
