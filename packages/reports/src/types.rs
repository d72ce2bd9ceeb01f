// ABOUTME: Report type definitions
// ABOUTME: Report kinds, period windows, aggregate content, and the generation request

use benos_core::ValidationError;
use benos_tasks::Task;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Weekly,
    Monthly,
    Project,
    Custom,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Weekly,
        ReportType::Monthly,
        ReportType::Project,
        ReportType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
            ReportType::Project => "project",
            ReportType::Custom => "custom",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ReportType::Weekly => "Weekly report",
            ReportType::Monthly => "Monthly report",
            ReportType::Project => "Project report",
            ReportType::Custom => "Report",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_enum("reportType", s, &ReportType::ALL))
    }
}

/// Inclusive period a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Derive the period for a report.
    ///
    /// Weekly and monthly reports cover the 7 or 30 days ending at `explicit_end`
    /// (or `now`). Project reports default to the project's lifetime, starting at
    /// `project_start`. Custom reports need both bounds.
    pub fn resolve(
        report_type: ReportType,
        explicit_start: Option<DateTime<Utc>>,
        explicit_end: Option<DateTime<Utc>>,
        project_start: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let end = explicit_end.unwrap_or(now);
        let start = match report_type {
            ReportType::Weekly => end - Duration::days(7),
            ReportType::Monthly => end - Duration::days(30),
            ReportType::Project => explicit_start
                .or(project_start)
                .ok_or_else(|| ValidationError::required("projectId"))?,
            ReportType::Custom => {
                let start =
                    explicit_start.ok_or_else(|| ValidationError::required("periodStart"))?;
                if explicit_end.is_none() {
                    return Err(ValidationError::required("periodEnd"));
                }
                start
            }
        };

        if start > end {
            return Err(ValidationError::invalid(
                "periodStart",
                "must not be after periodEnd",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// A task with the project its board belongs to
#[derive(Debug, Clone)]
pub struct ProjectTask {
    pub project_id: String,
    pub task: Task,
}

#[derive(Debug, Clone)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct MilestoneRef {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub blocked: i64,
    pub overdue: i64,
    pub created_in_period: i64,
    pub completed_in_period: i64,
    /// Fraction of tasks done, 0.0 to 1.0
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourTotals {
    pub estimated: f64,
    pub actual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProgress {
    pub project_id: String,
    pub name: String,
    pub total: i64,
    pub completed: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneProgress {
    pub milestone_id: String,
    pub project_id: String,
    pub name: String,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub progress: f64,
}

/// Aggregates stored as the report body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContent {
    pub totals: Totals,
    pub by_status: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    pub projects: Vec<ProjectProgress>,
    pub hours: HourTotals,
    pub milestones: Vec<MilestoneProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub report_type: ReportType,
    pub title: String,
    pub project_id: Option<String>,
    pub area_id: Option<String>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub content: ReportContent,
    pub insights: Vec<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub report_type: ReportType,
    pub title: Option<String>,
    pub project_id: Option<String>,
    pub area_id: Option<String>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

impl ReportRequest {
    pub fn default_title(&self, window: &ReportWindow) -> String {
        format!(
            "{} {} to {}",
            self.report_type.label(),
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub project_id: Option<String>,
    pub report_type: Option<ReportType>,
}
