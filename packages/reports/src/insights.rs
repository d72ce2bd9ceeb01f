// ABOUTME: Insight generation seam for reports
// ABOUTME: The default generator turns aggregates into plain sentences without a model call

use async_trait::async_trait;

use crate::types::{ReportContent, ReportWindow};

/// Produces human-readable observations about a report
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, content: &ReportContent, window: &ReportWindow) -> Vec<String>;
}

/// Deterministic insights derived from the aggregates
#[derive(Debug, Clone, Default)]
pub struct RuleBasedInsights;

fn percent(fraction: f64) -> i64 {
    (fraction * 100.0).round() as i64
}

fn plural(count: i64, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

#[async_trait]
impl InsightGenerator for RuleBasedInsights {
    async fn generate(&self, content: &ReportContent, _window: &ReportWindow) -> Vec<String> {
        let totals = &content.totals;
        if totals.total == 0 {
            return vec!["No tasks were tracked in this period.".to_string()];
        }

        let mut insights = vec![
            format!(
                "{} of {} complete ({}%).",
                totals.completed,
                plural(totals.total, "task", "tasks"),
                percent(totals.completion_rate)
            ),
            format!(
                "{} completed and {} created during the period.",
                plural(totals.completed_in_period, "task", "tasks"),
                totals.created_in_period
            ),
        ];

        if totals.overdue > 0 {
            insights.push(format!(
                "{} overdue.",
                plural(totals.overdue, "task is", "tasks are")
            ));
        }
        if totals.blocked > 0 {
            insights.push(format!(
                "{} blocked.",
                plural(totals.blocked, "task is", "tasks are")
            ));
        }

        let hours = &content.hours;
        if hours.estimated > 0.0 && hours.actual > 0.0 {
            let ratio = hours.actual / hours.estimated;
            if ratio > 1.2 {
                insights.push(format!(
                    "Actual hours ran {}% over estimates.",
                    percent(ratio - 1.0)
                ));
            } else if ratio < 0.8 {
                insights.push(format!(
                    "Actual hours came in {}% under estimates.",
                    percent(1.0 - ratio)
                ));
            } else {
                insights.push("Estimates were within 20% of actual hours.".to_string());
            }
        }

        let active: Vec<_> = content.projects.iter().filter(|p| p.total > 0).collect();
        if active.len() > 1 {
            if let Some(lagging) = active
                .iter()
                .min_by(|a, b| a.completion_rate.total_cmp(&b.completion_rate))
            {
                insights.push(format!(
                    "{} has the lowest completion rate at {}%.",
                    lagging.name,
                    percent(lagging.completion_rate)
                ));
            }
        }

        insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HourTotals, ProjectProgress, Totals};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn window() -> ReportWindow {
        ReportWindow {
            start: Utc::now(),
            end: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_report() {
        let insights = RuleBasedInsights
            .generate(&ReportContent::default(), &window())
            .await;
        assert_eq!(insights, vec!["No tasks were tracked in this period.".to_string()]);
    }

    #[tokio::test]
    async fn test_rules_fire_from_aggregates() {
        let progress = |name: &str, total: i64, completion_rate: f64| ProjectProgress {
            project_id: name.to_string(),
            name: name.to_string(),
            total,
            completed: 0,
            completion_rate,
        };
        let content = ReportContent {
            totals: Totals {
                total: 10,
                completed: 4,
                in_progress: 2,
                blocked: 1,
                overdue: 3,
                created_in_period: 5,
                completed_in_period: 1,
                completion_rate: 0.4,
            },
            hours: HourTotals {
                estimated: 10.0,
                actual: 15.0,
            },
            projects: vec![progress("Launch", 6, 0.5), progress("Ops", 4, 0.25)],
            ..Default::default()
        };

        let insights = RuleBasedInsights.generate(&content, &window()).await;
        assert_eq!(
            insights,
            vec![
                "4 of 10 tasks complete (40%).".to_string(),
                "1 task completed and 5 created during the period.".to_string(),
                "3 tasks are overdue.".to_string(),
                "1 task is blocked.".to_string(),
                "Actual hours ran 50% over estimates.".to_string(),
                "Ops has the lowest completion rate at 25%.".to_string(),
            ]
        );
    }
}
