//! Integration tests for database operations.

use chrono::{Duration, NaiveDate, Utc};
use hachi_core::models::{Aggregation, Integration, Kpi, Metric, Workspace};
use hachi_core::wins::{self, NewWin};
use hachi_core::{Database, Error, Period, references};
use uuid::Uuid;

fn temp_db_path() -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let filename = format!("hachi-test-{}.db", Uuid::new_v4());
    path.push(filename);
    path
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("date")
}

fn reach() -> Kpi {
    Kpi {
        id: "k_ig_reach".to_string(),
        name: "Instagram Reach".to_string(),
        channel: "Instagram".to_string(),
        unit: "count".to_string(),
        aggregation: Aggregation::Sum,
    }
}

// ============================================================================
// Workspace Operations
// ============================================================================

#[tokio::test]
async fn create_workspace_and_fetch() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    let ws = Workspace {
        id: "w_001".to_string(),
        name: "Bakery".to_string(),
    };

    db.create_workspace(&ws).await.expect("create");
    let fetched = db.get_workspace("w_001").await.expect("get").expect("exists");
    assert_eq!(fetched, ws);

    let err = db.create_workspace(&ws).await.expect_err("duplicate");
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn attach_requires_both_sides() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    db.create_kpi(&reach()).await.expect("kpi");

    let err = db.attach_kpi("w_missing", "k_ig_reach").await.expect_err("ws");
    assert!(matches!(err, Error::NotFound(_)));

    db.create_workspace(&Workspace {
        id: "w_001".to_string(),
        name: "Bakery".to_string(),
    })
    .await
    .expect("ws");
    let err = db.attach_kpi("w_001", "k_missing").await.expect_err("kpi");
    assert!(matches!(err, Error::NotFound(_)));

    db.attach_kpi("w_001", "k_ig_reach").await.expect("attach");
    assert_eq!(
        db.list_attached_kpi_ids("w_001").await.expect("list"),
        ["k_ig_reach"]
    );
}

// ============================================================================
// KPI and Goal Operations
// ============================================================================

#[tokio::test]
async fn create_kpi_conflicts_but_ensure_does_not() {
    let db = Database::open(&temp_db_path()).await.expect("open db");

    db.create_kpi(&reach()).await.expect("create");
    let err = db.create_kpi(&reach()).await.expect_err("duplicate");
    assert!(matches!(err, Error::Conflict(_)));

    assert!(!db.ensure_kpi(&reach()).await.expect("ensure existing"));
    let mut other = reach();
    other.id = "k_other".to_string();
    assert!(db.ensure_kpi(&other).await.expect("ensure new"));

    let all = db.list_kpis().await.expect("list");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].aggregation, Aggregation::Sum);
}

#[tokio::test]
async fn goal_create_conflicts_and_set_upserts() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    db.create_kpi(&reach()).await.expect("kpi");
    let period = Period::new(2025, 9).expect("period");

    let goal = db
        .create_goal(None, "k_ig_reach", period, 1000.0)
        .await
        .expect("create");
    assert_eq!(goal.id, "g_2025_09_k_ig_reach");

    let err = db
        .create_goal(None, "k_ig_reach", period, 2000.0)
        .await
        .expect_err("duplicate");
    assert!(matches!(err, Error::Conflict(_)));

    db.set_goal(None, "k_ig_reach", period, 1500.0)
        .await
        .expect("set");
    let fetched = db
        .get_goal("k_ig_reach", period, None)
        .await
        .expect("get")
        .expect("exists");
    assert!((fetched.target_value - 1500.0).abs() < f64::EPSILON);

    let next = db
        .get_goal("k_ig_reach", period.next(), None)
        .await
        .expect("get next");
    assert!(next.is_none());
}

#[tokio::test]
async fn workspace_goal_never_replaces_global_goal() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    db.create_kpi(&reach()).await.expect("kpi");
    let period = Period::new(2025, 9).expect("period");

    db.set_goal(None, "k_ig_reach", period, 100.0)
        .await
        .expect("global");
    db.set_goal(Some("global"), "k_ig_reach", period, 5.0)
        .await
        .expect("workspace named global");

    let global = db
        .get_goal("k_ig_reach", period, None)
        .await
        .expect("get")
        .expect("exists");
    assert!(global.workspace_id.is_none());
    assert!((global.target_value - 100.0).abs() < f64::EPSILON);

    let scoped = db
        .get_goal("k_ig_reach", period, Some("global"))
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(scoped.workspace_id.as_deref(), Some("global"));
    assert!((scoped.target_value - 5.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn goal_target_must_be_finite_and_non_negative() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    db.create_kpi(&reach()).await.expect("kpi");
    let period = Period::new(2025, 9).expect("period");

    for bad in [f64::NAN, f64::INFINITY, -1.0] {
        let err = db
            .set_goal(None, "k_ig_reach", period, bad)
            .await
            .expect_err("rejected");
        assert!(matches!(err, Error::Validation(_)), "{bad}: {err:?}");
    }

    let err = db
        .create_goal(Some("w_001"), "k_ig_reach", period, f64::NAN)
        .await
        .expect_err("rejected");
    assert!(matches!(err, Error::Validation(_)));

    let none = db
        .get_goal("k_ig_reach", period, None)
        .await
        .expect("get");
    assert!(none.is_none());
}

#[tokio::test]
async fn goal_for_unknown_kpi_is_not_found() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    let period = Period::new(2025, 9).expect("period");

    let err = db
        .set_goal(None, "k_missing", period, 10.0)
        .await
        .expect_err("missing kpi");
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Metric Operations
// ============================================================================

#[tokio::test]
async fn metric_scopes_are_kept_apart() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    db.create_kpi(&reach()).await.expect("kpi");
    let date = ymd(2025, 9, 5);

    for (ws, value) in [(None, 1.0), (Some("w_001"), 2.0), (Some("w_002"), 3.0)] {
        db.upsert_metric(&Metric {
            kpi_id: "k_ig_reach".to_string(),
            date,
            value,
            source: Some("instagram:graph".to_string()),
            workspace_id: ws.map(ToOwned::to_owned),
        })
        .await
        .expect("upsert");
    }
    db.upsert_metric(&Metric {
        kpi_id: "k_ig_reach".to_string(),
        date,
        value: 5.0,
        source: Some("instagram:graph".to_string()),
        workspace_id: Some("w_001".to_string()),
    })
    .await
    .expect("overwrite");

    let (start, end) = Period::of(date).bounds();
    let all = db
        .list_metrics("k_ig_reach", start, end, None)
        .await
        .expect("all");
    assert_eq!(all.len(), 3);

    let w1 = db
        .list_metrics("k_ig_reach", start, end, Some("w_001"))
        .await
        .expect("w1");
    assert_eq!(w1.len(), 1);
    assert!((w1[0].value - 5.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn last_metric_date_by_source() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    db.create_kpi(&reach()).await.expect("kpi");

    assert!(db.last_metric_date("youtube:", None).await.expect("empty").is_none());

    for (date, source) in [
        (ymd(2025, 9, 1), "youtube:channels.statistics"),
        (ymd(2025, 9, 7), "youtube:channels.statistics"),
        (ymd(2025, 9, 9), "instagram:graph"),
    ] {
        db.upsert_metric(&Metric {
            kpi_id: "k_ig_reach".to_string(),
            date,
            value: 1.0,
            source: Some(source.to_string()),
            workspace_id: Some("w_001".to_string()),
        })
        .await
        .expect("upsert");
    }

    assert_eq!(
        db.last_metric_date("youtube:", None).await.expect("yt"),
        Some(ymd(2025, 9, 7))
    );
    assert_eq!(
        db.last_metric_date("instagram:", Some("w_001")).await.expect("ig"),
        Some(ymd(2025, 9, 9))
    );
    assert!(
        db.last_metric_date("instagram:", Some("w_002"))
            .await
            .expect("other ws")
            .is_none()
    );
}

// ============================================================================
// Win Operations
// ============================================================================

#[tokio::test]
async fn wins_are_newest_first_and_limited() {
    let db = Database::open(&temp_db_path()).await.expect("open db");

    for day in 1..=4 {
        wins::create_win(
            &db,
            NewWin {
                workspace_id: "w_001".to_string(),
                date: ymd(2025, 9, day),
                title: format!("win {day}"),
                description: None,
                tags: Some("launch".to_string()),
                effort_mins: 30,
            },
        )
        .await
        .expect("create");
    }

    let listed = wins::list_wins(&db, "w_001", Some(2)).await.expect("list");
    let titles: Vec<_> = listed.iter().map(|w| w.title.as_str()).collect();
    assert_eq!(titles, ["win 4", "win 3"]);

    let err = wins::list_wins(&db, "w_001", Some(0)).await.expect_err("zero");
    assert!(matches!(err, Error::Validation(_)));
    let err = wins::list_wins(&db, "w_001", Some(101)).await.expect_err("too many");
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn win_requires_title() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    let err = wins::create_win(
        &db,
        NewWin {
            workspace_id: "w_001".to_string(),
            date: ymd(2025, 9, 1),
            title: "   ".to_string(),
            description: None,
            tags: None,
            effort_mins: 0,
        },
    )
    .await
    .expect_err("blank title");
    assert!(matches!(err, Error::Validation(_)));
}

// ============================================================================
// Reference Operations
// ============================================================================

#[tokio::test]
async fn reference_lifecycle() {
    let db = Database::open(&temp_db_path()).await.expect("open db");

    let created = references::create_reference(
        &db,
        "w_001",
        "https://www.instagram.com/p/abc123/",
        Some("  nice carousel  "),
    )
    .await
    .expect("create");
    assert_eq!(created.platform, "instagram");
    assert_eq!(created.note.as_deref(), Some("nice carousel"));
    assert!(created.tags.is_empty());

    let tags = vec![
        " Carousel ".to_string(),
        "carousel".to_string(),
        "steal-this".to_string(),
        String::new(),
    ];
    let updated = references::update_reference(&db, "w_001", created.id, None, Some(&tags))
        .await
        .expect("update");
    assert_eq!(updated.tags, ["carousel", "steal-this"]);
    assert_eq!(updated.note.as_deref(), Some("nice carousel"));

    let listed = db.list_references("w_001").await.expect("list");
    assert_eq!(listed.len(), 1);
    assert!(db.list_references("w_002").await.expect("list").is_empty());

    db.delete_reference("w_001", created.id).await.expect("delete");
    let err = db
        .delete_reference("w_001", created.id)
        .await
        .expect_err("gone");
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn reference_rejects_non_http_urls() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    for url in ["not a url", "ftp://example.com/file", ""] {
        let err = references::create_reference(&db, "w_001", url, None)
            .await
            .expect_err("invalid");
        assert!(matches!(err, Error::Validation(_)));
    }
}

#[tokio::test]
async fn updating_missing_reference_is_not_found() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    let err = references::update_reference(&db, "w_001", Uuid::new_v4(), Some("x"), None)
        .await
        .expect_err("missing");
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Integration and OAuth State Operations
// ============================================================================

fn integration(ws: &str, token: &str, refresh: Option<&str>) -> Integration {
    let now = Utc::now();
    Integration {
        id: Uuid::new_v4(),
        workspace_id: ws.to_string(),
        provider: "youtube".to_string(),
        external_account_id: None,
        access_token: token.to_string(),
        refresh_token: refresh.map(ToOwned::to_owned),
        scope: Some("youtube.readonly".to_string()),
        expiry: Some(now + Duration::hours(1)),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn integration_upsert_keeps_refresh_token() {
    let db = Database::open(&temp_db_path()).await.expect("open db");

    db.upsert_integration(&integration("w_001", "access-1", Some("refresh-1")))
        .await
        .expect("first");
    db.upsert_integration(&integration("w_001", "access-2", None))
        .await
        .expect("second");

    let stored = db
        .get_integration("w_001", "youtube")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));

    db.upsert_integration(&integration("w_002", "access-3", None))
        .await
        .expect("other ws");
    let all = db.list_integrations("youtube").await.expect("list");
    let workspaces: Vec<_> = all.iter().map(|i| i.workspace_id.as_str()).collect();
    assert_eq!(workspaces, ["w_001", "w_002"]);
    assert!(db.list_integrations("instagram").await.expect("list").is_empty());
}

#[tokio::test]
async fn oauth_state_is_single_use() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    let payload = serde_json::json!({"code_verifier": "abc"});

    let state = db
        .put_oauth_state("youtube", "w_001", &payload, Duration::minutes(10))
        .await
        .expect("put");
    assert_eq!(state.token.len(), 32);

    let taken = db
        .take_oauth_state(&state.token)
        .await
        .expect("take")
        .expect("present");
    assert_eq!(taken.workspace_id, "w_001");
    assert_eq!(taken.payload, payload);

    assert!(db.take_oauth_state(&state.token).await.expect("again").is_none());
    assert!(db.take_oauth_state("unknown").await.expect("unknown").is_none());
}

#[tokio::test]
async fn expired_oauth_state_is_rejected_and_purged() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    let payload = serde_json::json!({});

    let expired = db
        .put_oauth_state("instagram", "w_001", &payload, Duration::seconds(-5))
        .await
        .expect("put expired");
    db.put_oauth_state("instagram", "w_001", &payload, Duration::minutes(10))
        .await
        .expect("put live");
    db.put_oauth_state("instagram", "w_002", &payload, Duration::seconds(-5))
        .await
        .expect("put expired 2");

    assert!(db.take_oauth_state(&expired.token).await.expect("take").is_none());
    assert_eq!(db.purge_expired_oauth_states().await.expect("purge"), 1);
    assert_eq!(db.purge_expired_oauth_states().await.expect("purge"), 0);
}
