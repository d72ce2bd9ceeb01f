// ABOUTME: Integration tests for report generation and storage
// ABOUTME: Scoping by project and area, window validation, and the insight seam

use async_trait::async_trait;
use benos_core::{Actor, TaskStatus};
use benos_reports::{
    InsightGenerator, ReportContent, ReportFilter, ReportRequest, ReportStorage, ReportType,
    ReportWindow, RuleBasedInsights,
};
use benos_storage::{memory_pool, ActivityLogger, PositionAllocator, StorageError};
use benos_tasks::{BoardCreateInput, BoardStorage, TaskCreateInput, TaskStorage};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use sqlx::SqlitePool;
use std::sync::Arc;

struct Fixture {
    pool: SqlitePool,
    reports: ReportStorage,
    boards: BoardStorage,
    tasks: TaskStorage,
    actor: Actor,
}

async fn setup_with(insights: Arc<dyn InsightGenerator>) -> Fixture {
    let pool = memory_pool().await.unwrap();
    let positions = PositionAllocator::new(pool.clone());
    let activity = ActivityLogger::new(pool.clone());
    Fixture {
        reports: ReportStorage::new(pool.clone(), activity.clone(), insights),
        boards: BoardStorage::new(pool.clone(), positions.clone(), activity.clone()),
        tasks: TaskStorage::new(pool.clone(), positions, activity),
        actor: Actor::local_user(),
        pool,
    }
}

async fn setup() -> Fixture {
    setup_with(Arc::new(RuleBasedInsights)).await
}

fn request(report_type: ReportType) -> ReportRequest {
    ReportRequest {
        report_type,
        title: None,
        project_id: None,
        area_id: None,
        period_start: None,
        period_end: None,
    }
}

impl Fixture {
    async fn area(&self) -> String {
        let id = benos_core::generate_id();
        let position: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM areas")
            .fetch_one(&self.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO areas (id, name, position, created_at, updated_at) VALUES (?, 'Area', ?, ?, ?)")
            .bind(&id)
            .bind(position)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .unwrap();
        id
    }

    async fn project(&self, area_id: &str, name: &str) -> String {
        let id = benos_core::generate_id();
        let position: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE area_id = ?")
            .bind(area_id)
            .fetch_one(&self.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO projects (id, area_id, name, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(area_id)
        .bind(name)
        .bind(position)
        .bind(Utc::now() - Duration::days(90))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .unwrap();
        id
    }

    /// Board with `done` finished tasks and `open` todo tasks
    async fn work(&self, project_id: &str, done: usize, open: usize) {
        let board = self
            .boards
            .create(
                BoardCreateInput {
                    project_id: project_id.to_string(),
                    name: "Board".to_string(),
                    description: None,
                    columns: None,
                },
                &self.actor,
            )
            .await
            .unwrap();
        for (i, status) in std::iter::repeat(TaskStatus::Done)
            .take(done)
            .chain(std::iter::repeat(TaskStatus::Todo).take(open))
            .enumerate()
        {
            self.tasks
                .create(
                    TaskCreateInput {
                        board_id: board.id.clone(),
                        title: format!("Task {}", i),
                        status: Some(status),
                        estimated_hours: Some(2.0),
                        ..Default::default()
                    },
                    &self.actor,
                )
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn test_weekly_report_for_project() {
    let fx = setup().await;
    let area = fx.area().await;
    let launch = fx.project(&area, "Launch").await;
    let other = fx.project(&area, "Other").await;
    fx.work(&launch, 1, 3).await;
    fx.work(&other, 5, 0).await;

    let report = fx
        .reports
        .generate_report(
            ReportRequest {
                project_id: Some(launch.clone()),
                ..request(ReportType::Weekly)
            },
            &fx.actor,
        )
        .await
        .unwrap();

    assert_eq!(report.area_id.as_deref(), Some(area.as_str()));
    assert_eq!(report.period_end - report.period_start, Duration::days(7));
    assert!(report.title.starts_with("Weekly report "));
    assert_eq!(report.content.totals.total, 4);
    assert_eq!(report.content.totals.completed, 1);
    assert_eq!(report.content.totals.completed_in_period, 1);
    assert_eq!(report.content.totals.created_in_period, 4);
    assert_eq!(report.content.hours.estimated, 8.0);
    assert_eq!(report.content.projects.len(), 1);
    assert_eq!(report.insights[0], "1 of 4 tasks complete (25%).");

    let stored = fx.reports.get(&report.id).await.unwrap();
    assert_eq!(stored.content, report.content);
    assert_eq!(stored.insights, report.insights);
}

#[tokio::test]
async fn test_area_report_covers_every_project_in_area() {
    let fx = setup().await;
    let area = fx.area().await;
    let elsewhere = fx.area().await;
    let a = fx.project(&area, "A").await;
    let b = fx.project(&area, "B").await;
    let c = fx.project(&elsewhere, "C").await;
    fx.work(&a, 1, 1).await;
    fx.work(&b, 0, 2).await;
    fx.work(&c, 3, 0).await;

    let report = fx
        .reports
        .generate_report(
            ReportRequest {
                area_id: Some(area.clone()),
                ..request(ReportType::Monthly)
            },
            &fx.actor,
        )
        .await
        .unwrap();

    let names: Vec<&str> = report.content.projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(report.content.totals.total, 4);
    assert!(report
        .insights
        .iter()
        .any(|line| line == "B has the lowest completion rate at 0%."));
}

#[tokio::test]
async fn test_project_report_spans_project_lifetime() {
    let fx = setup().await;
    let area = fx.area().await;
    let project = fx.project(&area, "Launch").await;

    let report = fx
        .reports
        .generate_report(
            ReportRequest {
                project_id: Some(project),
                ..request(ReportType::Project)
            },
            &fx.actor,
        )
        .await
        .unwrap();
    assert!(report.period_end - report.period_start >= Duration::days(89));
    assert_eq!(report.insights, vec!["No tasks were tracked in this period.".to_string()]);
}

#[tokio::test]
async fn test_invalid_requests() {
    let fx = setup().await;
    let area = fx.area().await;
    let project = fx.project(&area, "Launch").await;
    let other_area = fx.area().await;

    let cases = vec![
        request(ReportType::Project),
        ReportRequest {
            period_start: Some(Utc::now() - Duration::days(3)),
            ..request(ReportType::Custom)
        },
        ReportRequest {
            area_id: Some(benos_core::generate_id()),
            ..request(ReportType::Weekly)
        },
        ReportRequest {
            project_id: Some(benos_core::generate_id()),
            ..request(ReportType::Weekly)
        },
        ReportRequest {
            project_id: Some(project),
            area_id: Some(other_area),
            ..request(ReportType::Weekly)
        },
    ];
    for case in cases {
        let err = fx.reports.generate_report(case, &fx.actor).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)), "{:?}", err);
    }
}

#[tokio::test]
async fn test_list_filters_and_delete() {
    let fx = setup().await;
    let area = fx.area().await;
    let project = fx.project(&area, "Launch").await;

    let weekly = fx
        .reports
        .generate_report(request(ReportType::Weekly), &fx.actor)
        .await
        .unwrap();
    fx.reports
        .generate_report(
            ReportRequest {
                project_id: Some(project.clone()),
                title: Some("Launch review".to_string()),
                ..request(ReportType::Project)
            },
            &fx.actor,
        )
        .await
        .unwrap();

    assert_eq!(fx.reports.list(&ReportFilter::default()).await.unwrap().len(), 2);
    let for_project = fx
        .reports
        .list(&ReportFilter {
            project_id: Some(project),
            report_type: None,
        })
        .await
        .unwrap();
    assert_eq!(for_project.len(), 1);
    assert_eq!(for_project[0].title, "Launch review");

    fx.reports.delete(&weekly.id, &fx.actor).await.unwrap();
    let weekly_only = fx
        .reports
        .list(&ReportFilter {
            project_id: None,
            report_type: Some(ReportType::Weekly),
        })
        .await
        .unwrap();
    assert!(weekly_only.is_empty());
    assert!(matches!(
        fx.reports.get(&weekly.id).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

struct FixedInsights;

#[async_trait]
impl InsightGenerator for FixedInsights {
    async fn generate(&self, content: &ReportContent, _window: &ReportWindow) -> Vec<String> {
        vec![format!("{} tasks seen", content.totals.total)]
    }
}

#[tokio::test]
async fn test_custom_insight_generator() {
    let fx = setup_with(Arc::new(FixedInsights)).await;
    let report = fx
        .reports
        .generate_report(request(ReportType::Weekly), &fx.actor)
        .await
        .unwrap();
    assert_eq!(report.insights, vec!["0 tasks seen".to_string()]);
}
