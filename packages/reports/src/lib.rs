// ABOUTME: Report generation for Ben OS
// ABOUTME: Pure aggregation over tasks, an insight seam, and persisted report snapshots

pub mod aggregate;
pub mod insights;
pub mod storage;
pub mod types;

pub use aggregate::aggregate;
pub use insights::{InsightGenerator, RuleBasedInsights};
pub use storage::ReportStorage;
pub use types::*;
