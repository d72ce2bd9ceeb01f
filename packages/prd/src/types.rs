// ABOUTME: PRD (Product Requirements Document) type definitions
// ABOUTME: Documents, their version snapshots, and the upload and extraction payloads

use benos_core::markdown::Section;
use benos_core::ValidationError;
use benos_tasks::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PrdStatus {
    #[default]
    Draft,
    Review,
    Approved,
    Archived,
}

impl PrdStatus {
    pub const ALL: [PrdStatus; 4] = [
        PrdStatus::Draft,
        PrdStatus::Review,
        PrdStatus::Approved,
        PrdStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrdStatus::Draft => "draft",
            PrdStatus::Review => "review",
            PrdStatus::Approved => "approved",
            PrdStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PrdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrdStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrdStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_enum("status", s, &PrdStatus::ALL))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Prd {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub content: String,
    pub version: i64,
    pub status: PrdStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a revision that was replaced by a later edit
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PrdVersion {
    pub id: String,
    pub prd_id: String,
    pub version: i64,
    pub title: String,
    pub content: String,
    pub change_summary: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdCreateInput {
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub status: Option<PrdStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdUpdateInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PrdStatus>,
    /// Stored on the snapshot of the replaced revision
    pub change_summary: Option<String>,
}

/// A markdown file posted as text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdUploadInput {
    pub project_id: String,
    pub filename: String,
    pub content: String,
    /// Overrides the title taken from the document or file name
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdSections {
    pub prd_id: String,
    pub title: Option<String>,
    pub preamble: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTasksInput {
    pub board_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTasksResult {
    pub created: Vec<Task>,
    /// Candidate titles already present as tasks of this PRD on the board
    pub skipped: Vec<String>,
}
