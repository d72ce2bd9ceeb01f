// ABOUTME: Pure report aggregation over a snapshot of tasks
// ABOUTME: Totals, status and priority counts, project completion, hours, and milestone progress

use benos_core::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::types::{
    HourTotals, MilestoneProgress, MilestoneRef, ProjectProgress, ProjectRef, ProjectTask,
    ReportContent, ReportWindow, Totals,
};

fn rate(done: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 1000.0).round() / 1000.0
}

fn is_overdue(task: &benos_tasks::Task, now: DateTime<Utc>) -> bool {
    task.status != TaskStatus::Done && task.due_date.is_some_and(|due| due < now)
}

pub fn aggregate(
    tasks: &[ProjectTask],
    projects: &[ProjectRef],
    milestones: &[MilestoneRef],
    window: &ReportWindow,
    now: DateTime<Utc>,
) -> ReportContent {
    let mut totals = Totals::default();
    let mut by_status: BTreeMap<String, i64> = TaskStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut by_priority: BTreeMap<String, i64> = Priority::ALL
        .iter()
        .map(|p| (p.as_str().to_string(), 0))
        .collect();
    let mut hours = HourTotals::default();
    // project id -> (total, completed)
    let mut per_project: HashMap<&str, (i64, i64)> = HashMap::new();
    // milestone id -> (total, completed)
    let mut per_milestone: HashMap<&str, (i64, i64)> = HashMap::new();

    for ProjectTask { project_id, task } in tasks {
        let done = task.status == TaskStatus::Done;

        totals.total += 1;
        match task.status {
            TaskStatus::Done => totals.completed += 1,
            TaskStatus::InProgress => totals.in_progress += 1,
            TaskStatus::Blocked => totals.blocked += 1,
            _ => {}
        }
        if is_overdue(task, now) {
            totals.overdue += 1;
        }
        if window.contains(task.created_at) {
            totals.created_in_period += 1;
        }
        if task.completed_at.is_some_and(|at| window.contains(at)) {
            totals.completed_in_period += 1;
        }

        *by_status.entry(task.status.as_str().to_string()).or_default() += 1;
        *by_priority.entry(task.priority.as_str().to_string()).or_default() += 1;

        hours.estimated += task.estimated_hours.unwrap_or(0.0);
        hours.actual += task.actual_hours.unwrap_or(0.0);

        let entry = per_project.entry(project_id.as_str()).or_default();
        entry.0 += 1;
        entry.1 += i64::from(done);

        if let Some(milestone_id) = &task.milestone_id {
            let entry = per_milestone.entry(milestone_id.as_str()).or_default();
            entry.0 += 1;
            entry.1 += i64::from(done);
        }
    }
    totals.completion_rate = rate(totals.completed, totals.total);

    let projects = projects
        .iter()
        .map(|project| {
            let (total, completed) = per_project.get(project.id.as_str()).copied().unwrap_or_default();
            ProjectProgress {
                project_id: project.id.clone(),
                name: project.name.clone(),
                total,
                completed,
                completion_rate: rate(completed, total),
            }
        })
        .collect();

    let milestones = milestones
        .iter()
        .map(|milestone| {
            let (total, completed) = per_milestone
                .get(milestone.id.as_str())
                .copied()
                .unwrap_or_default();
            MilestoneProgress {
                milestone_id: milestone.id.clone(),
                project_id: milestone.project_id.clone(),
                name: milestone.name.clone(),
                status: milestone.status.clone(),
                due_date: milestone.due_date,
                total_tasks: total,
                completed_tasks: completed,
                progress: rate(completed, total),
            }
        })
        .collect();

    ReportContent {
        totals,
        by_status,
        by_priority,
        projects,
        hours,
        milestones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benos_tasks::Task;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
    }

    fn task(status: TaskStatus) -> Task {
        let created = now() - Duration::days(20);
        Task {
            id: benos_core::generate_id(),
            board_id: "b".to_string(),
            column_id: "todo".to_string(),
            title: "t".to_string(),
            description: None,
            status,
            priority: Priority::Medium,
            position: 0,
            milestone_id: None,
            prd_id: None,
            assigned_agent_id: None,
            due_date: None,
            estimated_hours: None,
            actual_hours: None,
            tags: Vec::new(),
            completed_at: None,
            created_at: created,
            updated_at: created,
            subtasks: None,
        }
    }

    fn in_project(project_id: &str, task: Task) -> ProjectTask {
        ProjectTask {
            project_id: project_id.to_string(),
            task,
        }
    }

    fn week() -> ReportWindow {
        ReportWindow {
            start: now() - Duration::days(7),
            end: now(),
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let content = aggregate(&[], &[], &[], &week(), now());
        assert_eq!(content.totals, Totals::default());
        assert_eq!(content.by_status.len(), 5);
        assert!(content.by_status.values().all(|count| *count == 0));
    }

    #[test]
    fn test_totals_and_period_counts() {
        let mut done_recently = task(TaskStatus::Done);
        done_recently.completed_at = Some(now() - Duration::days(2));
        let mut done_long_ago = task(TaskStatus::Done);
        done_long_ago.completed_at = Some(now() - Duration::days(15));
        let mut fresh = task(TaskStatus::InProgress);
        fresh.created_at = now() - Duration::days(1);
        let mut late = task(TaskStatus::Blocked);
        late.due_date = Some(now() - Duration::hours(1));
        let mut late_but_done = task(TaskStatus::Done);
        late_but_done.due_date = Some(now() - Duration::days(3));

        let tasks: Vec<ProjectTask> = [done_recently, done_long_ago, fresh, late, late_but_done]
            .into_iter()
            .map(|t| in_project("p1", t))
            .collect();
        let content = aggregate(&tasks, &[], &[], &week(), now());

        assert_eq!(content.totals.total, 5);
        assert_eq!(content.totals.completed, 3);
        assert_eq!(content.totals.in_progress, 1);
        assert_eq!(content.totals.blocked, 1);
        assert_eq!(content.totals.overdue, 1);
        assert_eq!(content.totals.created_in_period, 1);
        assert_eq!(content.totals.completed_in_period, 1);
        assert_eq!(content.totals.completion_rate, 0.6);
        assert_eq!(content.by_status["done"], 3);
        assert_eq!(content.by_priority["medium"], 5);
    }

    #[test]
    fn test_project_and_milestone_progress() {
        let mut a = task(TaskStatus::Done);
        a.milestone_id = Some("m1".to_string());
        a.estimated_hours = Some(4.0);
        a.actual_hours = Some(6.0);
        let mut b = task(TaskStatus::Todo);
        b.milestone_id = Some("m1".to_string());
        b.estimated_hours = Some(2.0);
        let c = task(TaskStatus::Todo);

        let tasks = vec![in_project("p1", a), in_project("p1", b), in_project("p2", c)];
        let projects = vec![
            ProjectRef {
                id: "p1".to_string(),
                name: "Launch".to_string(),
            },
            ProjectRef {
                id: "p2".to_string(),
                name: "Ops".to_string(),
            },
            ProjectRef {
                id: "p3".to_string(),
                name: "Empty".to_string(),
            },
        ];
        let milestones = vec![MilestoneRef {
            id: "m1".to_string(),
            project_id: "p1".to_string(),
            name: "Beta".to_string(),
            status: "in_progress".to_string(),
            due_date: None,
        }];

        let content = aggregate(&tasks, &projects, &milestones, &week(), now());

        let rates: Vec<(&str, i64, f64)> = content
            .projects
            .iter()
            .map(|p| (p.name.as_str(), p.total, p.completion_rate))
            .collect();
        assert_eq!(rates, vec![("Launch", 2, 0.5), ("Ops", 1, 0.0), ("Empty", 0, 0.0)]);
        assert_eq!(content.milestones[0].total_tasks, 2);
        assert_eq!(content.milestones[0].progress, 0.5);
        assert_eq!(content.hours.estimated, 6.0);
        assert_eq!(content.hours.actual, 6.0);
    }
}
