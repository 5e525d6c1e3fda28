//! Database schema for hachi.

/// SQL schema applied on every open. All statements are idempotent.
///
/// Calendar dates are stored as `YYYY-MM-DD` text so that lexical order and
/// range comparisons match calendar order. Timestamps are unix seconds.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS workspaces (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kpis (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    channel TEXT NOT NULL,
    unit TEXT NOT NULL DEFAULT 'count',
    aggregation TEXT NOT NULL DEFAULT 'sum'
);

CREATE TABLE IF NOT EXISTS workspace_kpis (
    workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    kpi_id TEXT NOT NULL REFERENCES kpis(id) ON DELETE CASCADE,
    PRIMARY KEY (workspace_id, kpi_id)
);

CREATE TABLE IF NOT EXISTS goals (
    id TEXT PRIMARY KEY,
    kpi_id TEXT NOT NULL REFERENCES kpis(id) ON DELETE CASCADE,
    period TEXT NOT NULL,
    target_value REAL NOT NULL,
    workspace_id TEXT
);
CREATE INDEX IF NOT EXISTS ix_goals_kpi_period ON goals(kpi_id, period);

CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kpi_id TEXT NOT NULL REFERENCES kpis(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    value REAL NOT NULL,
    source TEXT,
    workspace_id TEXT
);
CREATE INDEX IF NOT EXISTS ix_metrics_kpi_date ON metrics(kpi_id, date);
CREATE INDEX IF NOT EXISTS ix_metrics_workspace ON metrics(workspace_id);

CREATE TABLE IF NOT EXISTS day_plans (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    date TEXT NOT NULL,
    initialized_at INTEGER NOT NULL,
    CONSTRAINT uq_day_plans_ws_date UNIQUE (workspace_id, date)
);

CREATE TABLE IF NOT EXISTS day_tasks (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    date TEXT NOT NULL,
    text TEXT NOT NULL,
    done INTEGER NOT NULL DEFAULT 0,
    carried_from TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_day_tasks_ws_date ON day_tasks(workspace_id, date);

CREATE TABLE IF NOT EXISTS wins (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    date TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    tags TEXT,
    effort_mins INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS ix_wins_ws_date ON wins(workspace_id, date);

CREATE TABLE IF NOT EXISTS "references" (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    url TEXT NOT NULL,
    note TEXT,
    title TEXT,
    description TEXT,
    thumbnail TEXT,
    platform TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_references_ws ON "references"(workspace_id);

CREATE TABLE IF NOT EXISTS integrations (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    external_account_id TEXT,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    scope TEXT,
    expiry INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CONSTRAINT uq_integrations_ws_provider UNIQUE (workspace_id, provider)
);

CREATE TABLE IF NOT EXISTS oauth_states (
    token TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    workspace_id TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_oauth_states_expiry ON oauth_states(expires_at);
"#;
