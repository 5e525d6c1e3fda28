//! hachi CLI - day planner, KPI goals and metric tracking

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hachi_core::dayplan::{self, DayView};
use hachi_core::models::{Aggregation, Kpi, Metric, Workspace};
use hachi_core::progress::{self, KpiCard};
use hachi_core::report::{self, PreviewOptions};
use hachi_core::{Config, Database, Period};
use serde::Serialize;
use uuid::Uuid;

mod sync;

#[derive(Debug, Parser)]
#[command(
    name = "hachi",
    author,
    version,
    about = "Day planner, KPI goals and metric tracking",
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace to operate on
    #[arg(short, long, global = true, env = "HACHI_WORKSPACE", default_value = "default")]
    workspace: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show today's tasks, carrying over yesterday's open ones on first use
    Today,

    /// Show the tasks of a specific date
    Day {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
    },

    /// Add a task
    Add {
        /// Task text
        text: String,

        /// Date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Mark a task done
    Done {
        /// Task ID
        id: Uuid,

        /// Date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Mark the task open again instead
        #[arg(long)]
        undo: bool,
    },

    /// Remove a task
    Rm {
        /// Task ID
        id: Uuid,

        /// Date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Remove every done task of a date
    Clear {
        /// Date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show a month of tasks grouped by date
    Month {
        /// Month (YYYY-MM, defaults to the current month)
        period: Option<Period>,
    },

    /// Show progress of a KPI for a month
    Progress {
        /// KPI ID
        kpi: String,

        /// Month (YYYY-MM, defaults to the current month)
        period: Option<Period>,

        /// Include the raw daily series
        #[arg(long)]
        series: bool,
    },

    /// Show the workspace's KPI report for a month
    Report {
        /// Month (YYYY-MM, defaults to the current month)
        period: Option<Period>,

        /// Include wins as highlights
        #[arg(long)]
        preview: bool,
    },

    /// Manage goals
    Goal {
        #[command(subcommand)]
        command: GoalCommand,
    },

    /// Manage KPIs
    Kpi {
        #[command(subcommand)]
        command: KpiCommand,
    },

    /// Manage workspaces
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommand,
    },

    /// Record metric values
    Metric {
        #[command(subcommand)]
        command: MetricCommand,
    },

    /// Pull metrics from a provider for every connected workspace
    Sync {
        #[arg(value_enum)]
        provider: sync::ProviderArg,

        /// Date to record readings under (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Inspect or drop the selected workspace's provider connections
    Integration {
        #[command(subcommand)]
        command: IntegrationCommand,
    },

    /// Maintain pending OAuth state
    Oauth {
        #[command(subcommand)]
        command: OauthCommand,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum GoalCommand {
    /// Create or update a goal
    Set {
        /// KPI ID
        kpi: String,

        /// Month (YYYY-MM)
        period: Period,

        /// Target value
        target: f64,

        /// Apply to every workspace instead of the selected one
        #[arg(long)]
        global: bool,
    },
}

#[derive(Debug, Subcommand)]
enum KpiCommand {
    /// Add a KPI
    Add {
        /// KPI ID (e.g. k_ig_reach)
        id: String,

        /// Display name
        name: String,

        /// Channel (e.g. Instagram)
        #[arg(long, default_value = "Manual")]
        channel: String,

        /// Unit
        #[arg(long, default_value = "count")]
        unit: String,

        /// How values combine over a month (sum or last)
        #[arg(long, default_value = "sum")]
        aggregation: Aggregation,
    },

    /// List KPIs
    List,
}

#[derive(Debug, Subcommand)]
enum WorkspaceCommand {
    /// Create the selected workspace
    Add {
        /// Display name
        name: String,
    },

    /// Attach a KPI to the selected workspace
    Attach {
        /// KPI ID
        kpi: String,
    },
}

#[derive(Debug, Subcommand)]
enum MetricCommand {
    /// Record a value for a KPI
    Add {
        /// KPI ID
        kpi: String,

        /// Value
        value: f64,

        /// Date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Source tag
        #[arg(long, default_value = "manual")]
        source: String,
    },
}

#[derive(Debug, Subcommand)]
enum IntegrationCommand {
    /// Show whether the workspace is connected and when it last synced
    Status {
        #[arg(value_enum)]
        provider: sync::ProviderArg,
    },

    /// Remove the connection; recorded metrics are kept
    Disconnect {
        #[arg(value_enum)]
        provider: sync::ProviderArg,
    },
}

#[derive(Debug, Subcommand)]
enum OauthCommand {
    /// Remove expired state tokens
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    // Open database
    let db = Database::open(&config.database).await?;

    let out = Output { json: cli.json };
    let ws = cli.workspace.as_str();
    let today = dayplan::today_ist();

    match cli.command {
        Command::Today => {
            let view = dayplan::today(&db, ws).await?;
            out.day(&view)
        }
        Command::Day { date } => {
            let view = dayplan::day(&db, ws, date).await?;
            out.day(&view)
        }
        Command::Add { text, date } => {
            let task = dayplan::add_task(&db, ws, date.unwrap_or(today), &text).await?;
            out.emit(&task, || println!("Added {} {}", task.id, task.text))
        }
        Command::Done { id, date, undo } => {
            dayplan::toggle_task(&db, ws, date.unwrap_or(today), id, !undo).await?;
            out.emit(&serde_json::json!({ "ok": true }), || {
                println!("{} {id}", if undo { "Reopened" } else { "Done" });
            })
        }
        Command::Rm { id, date } => {
            dayplan::delete_task(&db, ws, date.unwrap_or(today), id).await?;
            out.emit(&serde_json::json!({ "ok": true }), || println!("Removed {id}"))
        }
        Command::Clear { date } => {
            let cleared = dayplan::clear_done(&db, ws, date.unwrap_or(today)).await?;
            out.emit(&serde_json::json!({ "cleared": cleared }), || {
                println!("Cleared {cleared} done task(s)");
            })
        }
        Command::Month { period } => {
            let view = dayplan::month(&db, ws, period.unwrap_or(Period::of(today))).await?;
            out.emit(&view, || {
                if view.days.is_empty() {
                    println!("No tasks in {}.", view.period);
                }
                for group in &view.days {
                    println!("{}", group.date);
                    for task in &group.tasks {
                        println!("  {}", task_line(task));
                    }
                }
            })
        }
        Command::Progress { kpi, period, series } => {
            let period = period.unwrap_or(Period::of(today));
            cmd_progress(&db, &out, ws, &kpi, period, series).await
        }
        Command::Report { period, preview } => {
            let period = period.unwrap_or(Period::of(today));
            cmd_report(&db, &out, ws, period, preview).await
        }
        Command::Goal { command } => cmd_goal(&db, &out, ws, command).await,
        Command::Kpi { command } => cmd_kpi(&db, &out, command).await,
        Command::Workspace { command } => cmd_workspace(&db, &out, ws, command).await,
        Command::Metric { command } => cmd_metric(&db, &out, ws, today, command).await,
        Command::Sync { provider, date } => {
            let report = sync::run(&db, &config, provider, date.unwrap_or(today)).await?;
            out.emit(&report, || sync::print_report(&report))
        }
        Command::Integration { command } => match command {
            IntegrationCommand::Status { provider } => {
                let status = hachi_core::sync::integration_status(&db, provider.name(), ws).await?;
                out.emit(&status, || sync::print_status(&status))
            }
            IntegrationCommand::Disconnect { provider } => {
                let removed = hachi_core::sync::disconnect(&db, provider.name(), ws).await?;
                out.emit(&serde_json::json!({ "was_connected": removed }), || {
                    if removed {
                        println!("Disconnected {} from {ws}", provider.name());
                    } else {
                        println!("{ws} was not connected to {}", provider.name());
                    }
                })
            }
        },
        Command::Oauth {
            command: OauthCommand::Purge,
        } => {
            let purged = db.purge_expired_oauth_states().await?;
            out.emit(&serde_json::json!({ "purged": purged }), || {
                println!("Purged {purged} expired state token(s)");
            })
        }
        Command::Config => out.emit(&config, || {
            println!("Config:   {}", config_path.display());
            println!("Database: {}", config.database.display());
            println!("Server:   {}:{}", config.server.host, config.server.port);
        }),
    }
}

async fn cmd_progress(
    db: &Database,
    out: &Output,
    ws: &str,
    kpi_id: &str,
    period: Period,
    with_series: bool,
) -> Result<()> {
    let card = progress::compute_card(db, kpi_id, period, Some(ws)).await?;
    let points = if with_series {
        progress::kpi_month_series(db, kpi_id, period).await?
    } else {
        Vec::new()
    };

    out.emit(
        &serde_json::json!({ "card": card, "series": points }),
        || {
            println!("{}", card_line(&card));
            for point in &points {
                println!("  {}  {}", point.date, point.value);
            }
        },
    )
}

async fn cmd_report(
    db: &Database,
    out: &Output,
    ws: &str,
    period: Period,
    with_highlights: bool,
) -> Result<()> {
    if with_highlights {
        let preview = report::preview(db, ws, period, PreviewOptions::default()).await?;
        return out.emit(&preview, || {
            println!("{} - {}", preview.workspace.name, preview.period);
            for card in &preview.kpi_summary {
                println!("  {}", card_line(card));
            }
            if !preview.highlights.is_empty() {
                println!("Highlights");
                for win in &preview.highlights {
                    println!("  {}  {}", win.date, win.title);
                }
            }
        });
    }

    let cards = progress::workspace_month_report(db, ws, period).await?;
    out.emit(&cards, || {
        if cards.is_empty() {
            println!("No KPIs defined. Use 'hachi kpi add' to create one.");
        }
        for card in &cards {
            println!("{}", card_line(card));
        }
    })
}

async fn cmd_goal(db: &Database, out: &Output, ws: &str, command: GoalCommand) -> Result<()> {
    match command {
        GoalCommand::Set {
            kpi,
            period,
            target,
            global,
        } => {
            let scope = (!global).then_some(ws);
            let goal = db.set_goal(scope, &kpi, period, target).await?;
            out.emit(&goal, || {
                println!("Goal {} = {} for {}", goal.id, goal.target_value, goal.period);
            })
        }
    }
}

async fn cmd_kpi(db: &Database, out: &Output, command: KpiCommand) -> Result<()> {
    match command {
        KpiCommand::Add {
            id,
            name,
            channel,
            unit,
            aggregation,
        } => {
            let kpi = Kpi {
                id,
                name,
                channel,
                unit,
                aggregation,
            };
            db.create_kpi(&kpi).await?;
            out.emit(&kpi, || println!("Added KPI {} ({})", kpi.id, kpi.aggregation))
        }
        KpiCommand::List => {
            let kpis = db.list_kpis().await?;
            out.emit(&kpis, || {
                if kpis.is_empty() {
                    println!("No KPIs defined.");
                }
                for kpi in &kpis {
                    println!(
                        "{:<24} {:<24} {:<12} {:<8} {}",
                        kpi.id, kpi.name, kpi.channel, kpi.unit, kpi.aggregation
                    );
                }
            })
        }
    }
}

async fn cmd_workspace(
    db: &Database,
    out: &Output,
    ws: &str,
    command: WorkspaceCommand,
) -> Result<()> {
    match command {
        WorkspaceCommand::Add { name } => {
            let workspace = Workspace {
                id: ws.to_string(),
                name,
            };
            db.create_workspace(&workspace).await?;
            out.emit(&workspace, || {
                println!("Created workspace {} ({})", workspace.id, workspace.name);
            })
        }
        WorkspaceCommand::Attach { kpi } => {
            db.attach_kpi(ws, &kpi).await?;
            out.emit(&serde_json::json!({ "ok": true }), || {
                println!("Attached {kpi} to {ws}");
            })
        }
    }
}

async fn cmd_metric(
    db: &Database,
    out: &Output,
    ws: &str,
    today: NaiveDate,
    command: MetricCommand,
) -> Result<()> {
    match command {
        MetricCommand::Add {
            kpi,
            value,
            date,
            source,
        } => {
            let metric = Metric {
                kpi_id: kpi,
                date: date.unwrap_or(today),
                value,
                source: Some(source),
                workspace_id: Some(ws.to_string()),
            };
            progress::record_metric(db, &metric).await?;
            out.emit(&metric, || {
                println!("Recorded {} = {} on {}", metric.kpi_id, metric.value, metric.date);
            })
        }
    }
}

/// Text or JSON output, selected by `--json`.
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }

    fn day(&self, view: &DayView) -> Result<()> {
        self.emit(view, || {
            if view.tasks.is_empty() {
                println!("No tasks for {}.", view.date);
                return;
            }
            println!("{}", view.date);
            for task in &view.tasks {
                println!("  {}", task_line(task));
            }
        })
    }
}

fn task_line(task: &hachi_core::models::DayTask) -> String {
    let mark = if task.done { "[x]" } else { "[ ]" };
    let carried = task
        .carried_from
        .map(|from| format!(" (from {from})"))
        .unwrap_or_default();
    format!("{mark} {}{carried}  {}", task.text, task.id)
}

fn card_line(card: &KpiCard) -> String {
    let pct = card
        .pct_of_target
        .map_or_else(|| "no target".to_string(), |pct| format!("{pct:.1}%"));
    let actual = if card.has_data {
        format!("{}", card.actual)
    } else {
        "-".to_string()
    };
    format!(
        "{:<24} {:>12} / {:<12} {}",
        card.kpi_id, actual, card.target, pct
    )
}
