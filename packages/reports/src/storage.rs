// ABOUTME: Report storage layer using SQLite
// ABOUTME: Snapshots tasks in scope, aggregates them, and persists the result with insights

use benos_core::{validate_name, Actor};
use benos_storage::{
    decode_json, encode_json, ensure_exists, ActivityAction, ActivityLogger, EntityType,
    NewActivity, StorageError, StorageResult,
};
use benos_tasks::row_to_task;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::insights::InsightGenerator;
use crate::types::{
    MilestoneRef, ProjectRef, ProjectTask, Report, ReportFilter, ReportRequest, ReportType,
    ReportWindow,
};

/// Which projects a report looks at
enum Scope<'a> {
    All,
    Area(&'a str),
    Project(&'a str),
}

pub struct ReportStorage {
    pool: SqlitePool,
    activity: ActivityLogger,
    insights: Arc<dyn InsightGenerator>,
}

impl ReportStorage {
    pub fn new(
        pool: SqlitePool,
        activity: ActivityLogger,
        insights: Arc<dyn InsightGenerator>,
    ) -> Self {
        Self {
            pool,
            activity,
            insights,
        }
    }

    pub async fn list(&self, filter: &ReportFilter) -> StorageResult<Vec<Report>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM reports WHERE 1 = 1");
        if let Some(project_id) = &filter.project_id {
            qb.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(report_type) = filter.report_type {
            qb.push(" AND report_type = ").push_bind(report_type);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_report).collect()
    }

    pub async fn get(&self, id: &str) -> StorageResult<Report> {
        let row = sqlx::query("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("report {}", id)))?;
        row_to_report(&row)
    }

    pub async fn delete(&self, id: &str, actor: &Actor) -> StorageResult<()> {
        let before = self.get(id).await?;
        sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.activity.record(
            NewActivity::new(EntityType::Report, id, ActivityAction::Deleted, actor)
                .with_before(&before),
        );
        Ok(())
    }

    pub async fn generate_report(
        &self,
        request: ReportRequest,
        actor: &Actor,
    ) -> StorageResult<Report> {
        if request.report_type == ReportType::Project && request.project_id.is_none() {
            return Err(StorageError::validation(
                "projectId is required for project reports",
            ));
        }

        let mut area_id = request.area_id.clone();
        let mut project_start = None;
        if let Some(project_id) = &request.project_id {
            let row: Option<(String, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
                "SELECT area_id, created_at, start_date FROM projects WHERE id = ?",
            )
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
            let (project_area, created_at, start_date) = row.ok_or_else(|| {
                StorageError::validation(format!("project {} does not exist", project_id))
            })?;
            if area_id.as_ref().is_some_and(|area| *area != project_area) {
                return Err(StorageError::validation(format!(
                    "project {} is not in area {}",
                    project_id,
                    area_id.unwrap_or_default()
                )));
            }
            area_id = Some(project_area);
            project_start = Some(start_date.unwrap_or(created_at));
        } else if let Some(area_id) = &area_id {
            ensure_exists(&self.pool, "areas", area_id).await?;
        }

        let now = Utc::now();
        let window = ReportWindow::resolve(
            request.report_type,
            request.period_start,
            request.period_end,
            project_start,
            now,
        )?;
        let title = match &request.title {
            Some(title) => validate_name("title", title)?,
            None => request.default_title(&window),
        };

        let scope = match (&request.project_id, &area_id) {
            (Some(project_id), _) => Scope::Project(project_id),
            (None, Some(area_id)) => Scope::Area(area_id),
            (None, None) => Scope::All,
        };
        debug!("Generating {} report", request.report_type);

        let tasks = self.tasks_in(&scope).await?;
        let projects = self.projects_in(&scope).await?;
        let milestones = self.milestones_in(&scope).await?;
        let content = aggregate(&tasks, &projects, &milestones, &window, now);
        let insights = self.insights.generate(&content, &window).await;

        let report = Report {
            id: benos_core::generate_id(),
            report_type: request.report_type,
            title,
            project_id: request.project_id,
            area_id,
            period_start: window.start,
            period_end: window.end,
            content,
            insights,
            created_by: actor.id.clone(),
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO reports (id, report_type, title, project_id, area_id, period_start, period_end,
                                  content, insights, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&report.id)
        .bind(report.report_type)
        .bind(&report.title)
        .bind(&report.project_id)
        .bind(&report.area_id)
        .bind(report.period_start)
        .bind(report.period_end)
        .bind(encode_json(&report.content)?)
        .bind(encode_json(&report.insights)?)
        .bind(&report.created_by)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;

        info!(
            "Generated {} report {} over {} task(s)",
            report.report_type, report.id, report.content.totals.total
        );
        self.activity.record(
            NewActivity::new(EntityType::Report, &report.id, ActivityAction::Created, actor)
                .with_after(&serde_json::json!({
                    "reportType": report.report_type,
                    "title": report.title,
                    "projectId": report.project_id,
                    "areaId": report.area_id,
                    "periodStart": report.period_start,
                    "periodEnd": report.period_end,
                })),
        );
        Ok(report)
    }

    async fn tasks_in(&self, scope: &Scope<'_>) -> StorageResult<Vec<ProjectTask>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT t.*, b.project_id AS scope_project_id FROM tasks t
             JOIN boards b ON b.id = t.board_id
             JOIN projects p ON p.id = b.project_id
             WHERE 1 = 1",
        );
        push_scope(&mut qb, scope);
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(ProjectTask {
                    project_id: row.try_get("scope_project_id")?,
                    task: row_to_task(row)?,
                })
            })
            .collect()
    }

    async fn projects_in(&self, scope: &Scope<'_>) -> StorageResult<Vec<ProjectRef>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT p.id, p.name FROM projects p WHERE 1 = 1");
        push_scope(&mut qb, scope);
        qb.push(" ORDER BY p.area_id, p.position");
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(ProjectRef {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn milestones_in(&self, scope: &Scope<'_>) -> StorageResult<Vec<MilestoneRef>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT m.id, m.project_id, m.name, m.status, m.due_date FROM milestones m
             JOIN projects p ON p.id = m.project_id
             WHERE 1 = 1",
        );
        push_scope(&mut qb, scope);
        qb.push(" ORDER BY m.project_id, m.position");
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(MilestoneRef {
                    id: row.try_get("id")?,
                    project_id: row.try_get("project_id")?,
                    name: row.try_get("name")?,
                    status: row.try_get("status")?,
                    due_date: row.try_get("due_date")?,
                })
            })
            .collect()
    }
}

fn push_scope<'a>(qb: &mut QueryBuilder<'a, Sqlite>, scope: &Scope<'a>) {
    match scope {
        Scope::All => {}
        Scope::Area(area_id) => {
            qb.push(" AND p.area_id = ").push_bind(*area_id);
        }
        Scope::Project(project_id) => {
            qb.push(" AND p.id = ").push_bind(*project_id);
        }
    }
}

fn row_to_report(row: &SqliteRow) -> StorageResult<Report> {
    Ok(Report {
        id: row.try_get("id")?,
        report_type: row.try_get("report_type")?,
        title: row.try_get("title")?,
        project_id: row.try_get("project_id")?,
        area_id: row.try_get("area_id")?,
        period_start: row.try_get("period_start")?,
        period_end: row.try_get("period_end")?,
        content: decode_json(row.try_get("content")?)?,
        insights: decode_json(row.try_get("insights")?)?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}
