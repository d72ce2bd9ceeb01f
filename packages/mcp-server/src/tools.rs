use benos_core::{parse_uuid, TaskStatus, ValidationError};
use benos_prd::PrdCreateInput;
use benos_projects::{PaginatedResponse, PaginationParams, ProjectCreateInput, ProjectFilter, ProjectStatus};
use benos_reports::ReportRequest;
use benos_security::{Access, Requirement, Resource};
use benos_storage::{ActivityFilter, StorageError};
use benos_tasks::{SubtaskCreateInput, TaskCreateInput, TaskFilter, TaskMoveInput, TaskUpdateInput};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::context::ToolContext;

// MCP Tool Types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolInputSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub type_name: String,
    pub properties: BTreeMap<String, ToolInputSchemaProperty>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchemaProperty {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl CallToolResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        }
    }

    fn success(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text, false)
    }

    fn failure(err: &ToolError) -> Self {
        let body = json!({ "error": { "code": err.code(), "message": err.public_message() } });
        Self::text(body.to_string(), true)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "UNKNOWN_TOOL",
            ToolError::InvalidArguments(_) | ToolError::Validation(_) => "VALIDATION_ERROR",
            ToolError::Forbidden(_) => "FORBIDDEN",
            ToolError::Storage(StorageError::NotFound(_)) => "NOT_FOUND",
            ToolError::Storage(StorageError::Validation(_)) => "VALIDATION_ERROR",
            ToolError::Storage(StorageError::Conflict(_)) => "CONFLICT",
            ToolError::Storage(_) | ToolError::Serialization(_) => "INTERNAL_ERROR",
        }
    }

    fn is_internal(&self) -> bool {
        self.code() == "INTERNAL_ERROR"
    }

    fn public_message(&self) -> String {
        if self.is_internal() {
            "Internal error".to_string()
        } else {
            self.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Param {
    name: &'static str,
    kind: &'static str,
    description: &'static str,
    required: bool,
}

const fn req(name: &'static str, kind: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: true,
    }
}

const fn opt(name: &'static str, kind: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: false,
    }
}

const fn need(resource: Resource, access: Access) -> Requirement {
    Requirement { resource, access }
}

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    requirement: Requirement,
    params: &'static [Param],
}

impl ToolSpec {
    fn to_tool(&self) -> Tool {
        let properties = self
            .params
            .iter()
            .map(|p| {
                let items = (p.kind == "array").then(|| json!({ "type": "string" }));
                (
                    p.name.to_string(),
                    ToolInputSchemaProperty {
                        type_name: Some(p.kind.to_string()),
                        description: Some(p.description.to_string()),
                        items,
                    },
                )
            })
            .collect();
        let required = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.to_string())
            .collect();

        Tool {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            input_schema: ToolInputSchema {
                type_name: "object".to_string(),
                properties,
                required,
            },
        }
    }
}

const PAGE: Param = opt("page", "integer", "1-indexed page number");
const LIMIT: Param = opt("limit", "integer", "Maximum number of results");

// List filters take snake_case keys like REST query strings; create and
// update payloads take camelCase keys like REST bodies.
static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "list_areas",
        description: "List all areas in display order",
        requirement: need(Resource::Areas, Access::Read),
        params: &[],
    },
    ToolSpec {
        name: "list_projects",
        description: "List projects, optionally filtered by area or status",
        requirement: need(Resource::Projects, Access::Read),
        params: &[
            opt("area_id", "string", "Only projects in this area"),
            opt("status", "string", "planning, active, on_hold, completed, or archived"),
            PAGE,
            LIMIT,
        ],
    },
    ToolSpec {
        name: "get_project",
        description: "Get one project by id",
        requirement: need(Resource::Projects, Access::Read),
        params: &[req("id", "string", "Project id")],
    },
    ToolSpec {
        name: "create_project",
        description: "Create a project inside an area",
        requirement: need(Resource::Projects, Access::Write),
        params: &[
            req("areaId", "string", "Owning area id"),
            req("name", "string", "Project name"),
            opt("description", "string", "Free-form description"),
            opt("status", "string", "planning, active, on_hold, completed, or archived"),
            opt("priority", "string", "low, medium, high, or urgent"),
            opt("startDate", "string", "RFC 3339 timestamp"),
            opt("targetDate", "string", "RFC 3339 timestamp"),
        ],
    },
    ToolSpec {
        name: "list_boards",
        description: "List boards, optionally for one project",
        requirement: need(Resource::Boards, Access::Read),
        params: &[opt("project_id", "string", "Only boards of this project")],
    },
    ToolSpec {
        name: "get_board",
        description: "Get a board with its tasks grouped by column",
        requirement: need(Resource::Boards, Access::Read),
        params: &[req("id", "string", "Board id")],
    },
    ToolSpec {
        name: "list_tasks",
        description: "List tasks matching filters",
        requirement: need(Resource::Tasks, Access::Read),
        params: &[
            opt("board_id", "string", "Board id"),
            opt("project_id", "string", "Project id"),
            opt("column_id", "string", "Column id"),
            opt("status", "string", "todo, in_progress, review, done, or blocked"),
            opt("priority", "string", "low, medium, high, or urgent"),
            opt("assigned_agent_id", "string", "Assigned agent id"),
            opt("milestone_id", "string", "Milestone id"),
            opt("prd_id", "string", "Source PRD id"),
            LIMIT,
            opt("offset", "integer", "Results to skip"),
        ],
    },
    ToolSpec {
        name: "get_task",
        description: "Get one task with its subtasks",
        requirement: need(Resource::Tasks, Access::Read),
        params: &[req("id", "string", "Task id")],
    },
    ToolSpec {
        name: "create_task",
        description: "Create a task on a board",
        requirement: need(Resource::Tasks, Access::Write),
        params: &[
            req("boardId", "string", "Board id"),
            req("title", "string", "Task title"),
            opt("description", "string", "Markdown description"),
            opt("columnId", "string", "Column id; defaults from status or the first column"),
            opt("status", "string", "todo, in_progress, review, done, or blocked"),
            opt("priority", "string", "low, medium, high, or urgent"),
            opt("milestoneId", "string", "Milestone id"),
            opt("assignedAgentId", "string", "Agent id"),
            opt("dueDate", "string", "RFC 3339 timestamp"),
            opt("estimatedHours", "number", "Estimate in hours"),
            opt("tags", "array", "Tags"),
        ],
    },
    ToolSpec {
        name: "update_task",
        description: "Update task fields; null clears an optional field",
        requirement: need(Resource::Tasks, Access::Write),
        params: &[
            req("id", "string", "Task id"),
            opt("title", "string", "Task title"),
            opt("description", "string", "Markdown description"),
            opt("status", "string", "todo, in_progress, review, done, or blocked"),
            opt("priority", "string", "low, medium, high, or urgent"),
            opt("dueDate", "string", "RFC 3339 timestamp"),
            opt("estimatedHours", "number", "Estimate in hours"),
            opt("actualHours", "number", "Hours spent"),
            opt("tags", "array", "Tags"),
        ],
    },
    ToolSpec {
        name: "move_task",
        description: "Move a task to a column, position, or another board of the same project",
        requirement: need(Resource::Tasks, Access::Write),
        params: &[
            req("id", "string", "Task id"),
            req("columnId", "string", "Target column id"),
            opt("position", "integer", "0-based position in the target column"),
            opt("boardId", "string", "Target board id"),
        ],
    },
    ToolSpec {
        name: "update_task_status",
        description: "Set a task's status, moving it to the matching column",
        requirement: need(Resource::Tasks, Access::Write),
        params: &[
            req("id", "string", "Task id"),
            req("status", "string", "todo, in_progress, review, done, or blocked"),
        ],
    },
    ToolSpec {
        name: "assign_task",
        description: "Assign a task to an active agent, or unassign with null",
        requirement: need(Resource::Tasks, Access::Write),
        params: &[
            req("id", "string", "Task id"),
            opt("agentId", "string", "Agent id, or null to unassign"),
        ],
    },
    ToolSpec {
        name: "search_tasks",
        description: "Find tasks whose title or description contains the query",
        requirement: need(Resource::Tasks, Access::Read),
        params: &[
            req("query", "string", "Text to search for"),
            opt("project_id", "string", "Project id"),
            opt("board_id", "string", "Board id"),
            opt("status", "string", "todo, in_progress, review, done, or blocked"),
            LIMIT,
        ],
    },
    ToolSpec {
        name: "create_subtask",
        description: "Add a checklist item to a task",
        requirement: need(Resource::Tasks, Access::Write),
        params: &[
            req("taskId", "string", "Parent task id"),
            req("title", "string", "Subtask title"),
        ],
    },
    ToolSpec {
        name: "complete_subtask",
        description: "Mark a subtask completed",
        requirement: need(Resource::Tasks, Access::Write),
        params: &[req("id", "string", "Subtask id")],
    },
    ToolSpec {
        name: "list_prds",
        description: "List PRDs, optionally for one project",
        requirement: need(Resource::Prds, Access::Read),
        params: &[opt("project_id", "string", "Project id")],
    },
    ToolSpec {
        name: "get_prd",
        description: "Get one PRD including its markdown content",
        requirement: need(Resource::Prds, Access::Read),
        params: &[req("id", "string", "PRD id")],
    },
    ToolSpec {
        name: "create_prd",
        description: "Create a PRD for a project",
        requirement: need(Resource::Prds, Access::Write),
        params: &[
            req("projectId", "string", "Project id"),
            req("title", "string", "PRD title"),
            opt("content", "string", "Markdown content"),
            opt("status", "string", "draft, review, approved, or archived"),
        ],
    },
    ToolSpec {
        name: "generate_report",
        description: "Generate and store a progress report",
        requirement: need(Resource::Reports, Access::Write),
        params: &[
            req("reportType", "string", "weekly, monthly, project, or custom"),
            opt("projectId", "string", "Required for project reports"),
            opt("areaId", "string", "Limit to one area"),
            opt("title", "string", "Report title"),
            opt("periodStart", "string", "RFC 3339 timestamp"),
            opt("periodEnd", "string", "RFC 3339 timestamp"),
        ],
    },
    ToolSpec {
        name: "list_activity",
        description: "Recent activity, newest first",
        requirement: need(Resource::Activity, Access::Read),
        params: &[
            opt("entity_type", "string", "area, project, milestone, board, task, subtask, prd, report, or agent"),
            opt("entity_id", "string", "Entity id"),
            opt("actor_id", "string", "Actor id"),
            opt("action", "string", "Action such as created or status_changed"),
            LIMIT,
        ],
    },
];

pub fn tools_list() -> ListToolsResult {
    ListToolsResult {
        tools: TOOLS.iter().map(ToolSpec::to_tool).collect(),
        next_cursor: None,
    }
}

pub async fn tools_call(context: &ToolContext, request: CallToolRequest) -> CallToolResult {
    let Some(spec) = TOOLS.iter().find(|t| t.name == request.name) else {
        warn!(tool = %request.name, "Unknown tool requested");
        return CallToolResult::failure(&ToolError::UnknownTool(request.name));
    };

    info!(tool = %spec.name, "Tool call");
    let args = match request.arguments {
        Some(Value::Null) | None => json!({}),
        Some(args) => args,
    };

    let outcome = match context.authorize(spec.requirement) {
        Ok(()) => execute(context, spec.name, &args).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(value) => CallToolResult::success(&value),
        Err(err) => {
            if err.is_internal() {
                error!(tool = %spec.name, "Tool failed: {}", err);
            } else {
                info!(tool = %spec.name, code = %err.code(), "Tool rejected: {}", err);
            }
            CallToolResult::failure(&err)
        }
    }
}

#[derive(Deserialize)]
struct ListProjectsArgs {
    area_id: Option<String>,
    status: Option<ProjectStatus>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct ProjectScopeArgs {
    project_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusArgs {
    status: TaskStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignArgs {
    #[serde(default)]
    agent_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    project_id: Option<String>,
    board_id: Option<String>,
    status: Option<TaskStatus>,
    limit: Option<i64>,
}

async fn execute(context: &ToolContext, name: &str, args: &Value) -> Result<Value, ToolError> {
    let db = context.db();
    let actor = context.actor();

    match name {
        "list_areas" => to_json(db.area_storage.list().await?),
        "list_projects" => {
            let args: ListProjectsArgs = parse(args)?;
            let filter = ProjectFilter {
                area_id: optional_uuid("area_id", args.area_id)?,
                status: args.status,
            };
            let pagination = PaginationParams {
                page: args.page,
                limit: args.limit,
            };
            let (projects, total) = db.project_storage.list(&filter, Some(&pagination)).await?;
            to_json(PaginatedResponse::new(projects, &pagination, total))
        }
        "get_project" => to_json(db.project_storage.get(&id_arg(args, "id")?).await?),
        "create_project" => {
            let input: ProjectCreateInput = parse(args)?;
            to_json(db.project_storage.create(input, &actor).await?)
        }
        "list_boards" => {
            let args: ProjectScopeArgs = parse(args)?;
            let project_id = optional_uuid("project_id", args.project_id)?;
            to_json(db.board_storage.list(project_id.as_deref()).await?)
        }
        "get_board" => to_json(db.board_storage.board_view(&id_arg(args, "id")?).await?),
        "list_tasks" => {
            let filter: TaskFilter = parse(args)?;
            let (tasks, total) = db.task_storage.search(&filter).await?;
            Ok(json!({ "items": tasks, "total": total }))
        }
        "get_task" => to_json(db.task_storage.get(&id_arg(args, "id")?).await?),
        "create_task" => {
            let input: TaskCreateInput = parse(args)?;
            to_json(db.task_storage.create(input, &actor).await?)
        }
        "update_task" => {
            let id = id_arg(args, "id")?;
            let input: TaskUpdateInput = parse(args)?;
            to_json(db.task_storage.update(&id, input, &actor).await?)
        }
        "move_task" => {
            let id = id_arg(args, "id")?;
            let input: TaskMoveInput = parse(args)?;
            to_json(db.task_storage.move_task(&id, input, &actor).await?)
        }
        "update_task_status" => {
            let id = id_arg(args, "id")?;
            let StatusArgs { status } = parse(args)?;
            to_json(db.task_storage.update_status(&id, status, &actor).await?)
        }
        "assign_task" => {
            let id = id_arg(args, "id")?;
            let AssignArgs { agent_id } = parse(args)?;
            let agent_id = optional_uuid("agentId", agent_id)?;
            to_json(db.task_storage.assign(&id, agent_id.as_deref(), &actor).await?)
        }
        "search_tasks" => {
            let args: SearchArgs = parse(args)?;
            if args.query.trim().is_empty() {
                return Err(ToolError::InvalidArguments("query must not be empty".to_string()));
            }
            let filter = TaskFilter {
                q: Some(args.query),
                project_id: optional_uuid("project_id", args.project_id)?,
                board_id: optional_uuid("board_id", args.board_id)?,
                status: args.status,
                limit: args.limit,
                ..Default::default()
            };
            let (tasks, total) = db.task_storage.search(&filter).await?;
            Ok(json!({ "items": tasks, "total": total }))
        }
        "create_subtask" => {
            let task_id = id_arg(args, "taskId")?;
            let input: SubtaskCreateInput = parse(args)?;
            to_json(db.subtask_storage.create(&task_id, input, &actor).await?)
        }
        "complete_subtask" => {
            to_json(db.subtask_storage.complete(&id_arg(args, "id")?, &actor).await?)
        }
        "list_prds" => {
            let args: ProjectScopeArgs = parse(args)?;
            let project_id = optional_uuid("project_id", args.project_id)?;
            to_json(db.prd_storage.list(project_id.as_deref()).await?)
        }
        "get_prd" => to_json(db.prd_storage.get(&id_arg(args, "id")?).await?),
        "create_prd" => {
            let input: PrdCreateInput = parse(args)?;
            to_json(db.prd_storage.create(input, &actor).await?)
        }
        "generate_report" => {
            let request: ReportRequest = parse(args)?;
            to_json(db.report_storage.generate_report(request, &actor).await?)
        }
        "list_activity" => {
            let filter: ActivityFilter = parse(args)?;
            to_json(db.activity_storage().list(&filter).await?)
        }
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

fn parse<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    T::deserialize(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ToolError> {
    Ok(serde_json::to_value(value)?)
}

/// Required UUID argument
fn id_arg(args: &Value, field: &'static str) -> Result<String, ToolError> {
    let raw = args
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{} is required", field)))?;
    Ok(parse_uuid(field, raw)?)
}

fn optional_uuid(field: &str, value: Option<String>) -> Result<Option<String>, ToolError> {
    value.map(|raw| parse_uuid(field, &raw)).transpose().map_err(Into::into)
}
