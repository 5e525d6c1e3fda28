//! KPI progress: monthly actuals, goal targets and percentage of target.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Aggregation, Goal, Kpi, Metric, MetricPoint};
use crate::period::Period;

/// Progress of one KPI against its goal for a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiCard {
    pub kpi_id: String,
    pub name: String,
    pub channel: String,
    pub unit: String,
    pub aggregation: Aggregation,
    pub period: Period,
    pub actual: f64,
    pub target: f64,
    /// `None` when no positive target is set.
    pub pct_of_target: Option<f64>,
    /// Whether any metric rows fell inside the period. An `actual` of 0.0
    /// with `has_data == false` means "no readings", not "read zero".
    pub has_data: bool,
}

/// Reduce a period's samples to a single value.
///
/// Returns `None` when there are no samples. `Last` picks the value with the
/// latest date; among equal dates the later sample wins.
pub fn aggregate(aggregation: Aggregation, points: &[MetricPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    match aggregation {
        Aggregation::Sum => Some(points.iter().map(|p| p.value).sum()),
        Aggregation::Last => points
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.date.cmp(&b.date).then(ia.cmp(ib)))
            .map(|(_, p)| p.value),
    }
}

/// Percentage of target, only defined for a positive target.
pub fn pct_of_target(actual: f64, target: f64) -> Option<f64> {
    (target > 0.0).then(|| actual / target * 100.0)
}

/// Order by `pct_of_target` ascending with missing percentages first.
pub fn compare_pct(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(&b),
    }
}

/// Sort cards most-behind first. Stable, so ties keep their input order.
pub fn sort_cards(cards: &mut [KpiCard]) {
    cards.sort_by(|a, b| compare_pct(a.pct_of_target, b.pct_of_target));
}

/// Build a card from already-fetched pieces.
pub fn card(kpi: &Kpi, period: Period, points: &[MetricPoint], goal: Option<&Goal>) -> KpiCard {
    let aggregated = aggregate(kpi.aggregation, points);
    let actual = aggregated.unwrap_or(0.0);
    let target = goal.map_or(0.0, |g| g.target_value);
    KpiCard {
        kpi_id: kpi.id.clone(),
        name: kpi.name.clone(),
        channel: kpi.channel.clone(),
        unit: kpi.unit.clone(),
        aggregation: kpi.aggregation,
        period,
        actual,
        target,
        pct_of_target: pct_of_target(actual, target),
        has_data: aggregated.is_some(),
    }
}

/// Period actual for a KPI: sum or latest value of its metrics, 0.0 if none.
pub async fn compute_actual(db: &Database, kpi: &Kpi, period: Period) -> Result<f64> {
    let points = month_points(db, &kpi.id, period).await?;
    Ok(aggregate(kpi.aggregation, &points).unwrap_or(0.0))
}

/// Progress card for a KPI and period.
///
/// With a workspace, a goal scoped to that workspace takes precedence over a
/// global goal.
pub async fn compute_card(
    db: &Database,
    kpi_id: &str,
    period: Period,
    workspace_id: Option<&str>,
) -> Result<KpiCard> {
    let kpi = db
        .get_kpi(kpi_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("kpi '{kpi_id}'")))?;
    card_for(db, &kpi, period, workspace_id).await
}

/// Cards for every KPI attached to a workspace, most-behind first.
///
/// A workspace with no attached KPIs reports on every KPI.
pub async fn workspace_month_report(
    db: &Database,
    workspace_id: &str,
    period: Period,
) -> Result<Vec<KpiCard>> {
    if db.get_workspace(workspace_id).await?.is_none() {
        return Err(Error::NotFound(format!("workspace '{workspace_id}'")));
    }

    let attached = db.list_attached_kpi_ids(workspace_id).await?;
    let kpis = if attached.is_empty() {
        tracing::debug!(workspace_id, "no KPIs attached, reporting on all KPIs");
        db.list_kpis().await?
    } else {
        let mut kpis = Vec::with_capacity(attached.len());
        for kpi_id in &attached {
            match db.get_kpi(kpi_id).await? {
                Some(kpi) => kpis.push(kpi),
                None => tracing::warn!(workspace_id, kpi_id = kpi_id.as_str(), "attached KPI is missing"),
            }
        }
        kpis
    };

    let mut cards = Vec::with_capacity(kpis.len());
    for kpi in &kpis {
        cards.push(card_for(db, kpi, period, Some(workspace_id)).await?);
    }
    sort_cards(&mut cards);
    Ok(cards)
}

/// Record a manual or imported reading. The KPI must exist and the value must be finite.
pub async fn record_metric(db: &Database, metric: &Metric) -> Result<()> {
    if !metric.value.is_finite() {
        return Err(Error::Validation("metric value must be a finite number".to_string()));
    }
    if db.get_kpi(&metric.kpi_id).await?.is_none() {
        return Err(Error::NotFound(format!("kpi '{}'", metric.kpi_id)));
    }
    db.upsert_metric(metric).await
}

/// Raw daily samples of a KPI within a period, ascending by date.
pub async fn kpi_month_series(db: &Database, kpi_id: &str, period: Period) -> Result<Vec<MetricPoint>> {
    if db.get_kpi(kpi_id).await?.is_none() {
        return Err(Error::NotFound(format!("kpi '{kpi_id}'")));
    }
    month_points(db, kpi_id, period).await
}

async fn card_for(
    db: &Database,
    kpi: &Kpi,
    period: Period,
    workspace_id: Option<&str>,
) -> Result<KpiCard> {
    let points = month_points(db, &kpi.id, period).await?;
    let goal = db.get_goal(&kpi.id, period, workspace_id).await?;
    Ok(card(kpi, period, &points, goal.as_ref()))
}

async fn month_points(db: &Database, kpi_id: &str, period: Period) -> Result<Vec<MetricPoint>> {
    let (start, end): (NaiveDate, NaiveDate) = period.bounds();
    db.list_metrics(kpi_id, start, end, None).await
}
