// ABOUTME: HTTP API layer for Ben OS providing REST endpoints and routing
// ABOUTME: Integration layer that depends on all domain packages

use axum::{
    routing::{get, post, put},
    Router,
};

use benos_projects::DbState;

pub mod activity_handlers;
pub mod agents_handlers;
pub mod areas_handlers;
pub mod boards_handlers;
pub mod extract;
pub mod milestones_handlers;
pub mod prd_handlers;
pub mod projects_handlers;
pub mod reports_handlers;
pub mod request_id;
pub mod response;
pub mod subtasks_handlers;
pub mod tasks_handlers;

pub use extract::{CurrentActor, CurrentAgent, MaybeAgent};
pub use request_id::{current_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use response::{error_response, ApiError, ApiResponse, ApiResult};

/// Every versioned route, relative to `/api/v1`
pub fn create_api_router() -> Router<DbState> {
    Router::new()
        .merge(create_areas_router())
        .merge(create_projects_router())
        .merge(create_milestones_router())
        .merge(create_boards_router())
        .merge(create_tasks_router())
        .merge(create_prds_router())
        .merge(create_reports_router())
        .merge(create_agents_router())
        .merge(create_activity_router())
}

/// Creates the areas API router
pub fn create_areas_router() -> Router<DbState> {
    Router::new()
        .route(
            "/areas",
            get(areas_handlers::list_areas).post(areas_handlers::create_area),
        )
        .route("/areas/reorder", post(areas_handlers::reorder_areas))
        .route(
            "/areas/{id}",
            get(areas_handlers::get_area)
                .put(areas_handlers::update_area)
                .delete(areas_handlers::delete_area),
        )
}

/// Creates the projects API router
pub fn create_projects_router() -> Router<DbState> {
    Router::new()
        .route(
            "/projects",
            get(projects_handlers::list_projects).post(projects_handlers::create_project),
        )
        .route("/projects/reorder", post(projects_handlers::reorder_projects))
        .route(
            "/projects/{id}",
            get(projects_handlers::get_project)
                .put(projects_handlers::update_project)
                .delete(projects_handlers::delete_project),
        )
}

/// Creates the milestones API router
pub fn create_milestones_router() -> Router<DbState> {
    Router::new()
        .route(
            "/milestones",
            get(milestones_handlers::list_milestones).post(milestones_handlers::create_milestone),
        )
        .route(
            "/milestones/reorder",
            post(milestones_handlers::reorder_milestones),
        )
        .route(
            "/milestones/{id}",
            get(milestones_handlers::get_milestone)
                .put(milestones_handlers::update_milestone)
                .delete(milestones_handlers::delete_milestone),
        )
}

/// Creates the boards API router
pub fn create_boards_router() -> Router<DbState> {
    Router::new()
        .route(
            "/boards",
            get(boards_handlers::list_boards).post(boards_handlers::create_board),
        )
        .route("/boards/reorder", post(boards_handlers::reorder_boards))
        .route(
            "/boards/{id}",
            get(boards_handlers::get_board)
                .put(boards_handlers::update_board)
                .delete(boards_handlers::delete_board),
        )
}

/// Creates the tasks API router, including subtasks
pub fn create_tasks_router() -> Router<DbState> {
    Router::new()
        .route(
            "/tasks",
            get(tasks_handlers::list_tasks).post(tasks_handlers::create_task),
        )
        .route("/tasks/bulk", post(tasks_handlers::bulk_tasks))
        .route(
            "/tasks/{id}",
            get(tasks_handlers::get_task)
                .put(tasks_handlers::update_task)
                .delete(tasks_handlers::delete_task),
        )
        .route("/tasks/{id}/status", put(tasks_handlers::update_task_status))
        .route("/tasks/{id}/assign", put(tasks_handlers::assign_task))
        .route("/tasks/{id}/move", put(tasks_handlers::move_task))
        // Subtask routes
        .route(
            "/tasks/{id}/subtasks",
            get(subtasks_handlers::list_subtasks).post(subtasks_handlers::create_subtask),
        )
        .route(
            "/tasks/{id}/subtasks/reorder",
            post(subtasks_handlers::reorder_subtasks),
        )
        .route(
            "/subtasks/{id}",
            put(subtasks_handlers::update_subtask).delete(subtasks_handlers::delete_subtask),
        )
        .route("/subtasks/{id}/toggle", post(subtasks_handlers::toggle_subtask))
}

/// Creates the PRD API router for Product Requirements Documents
pub fn create_prds_router() -> Router<DbState> {
    Router::new()
        .route(
            "/prds",
            get(prd_handlers::list_prds).post(prd_handlers::create_prd),
        )
        .route("/prds/upload", post(prd_handlers::upload_prd))
        .route(
            "/prds/{id}",
            get(prd_handlers::get_prd)
                .put(prd_handlers::update_prd)
                .delete(prd_handlers::delete_prd),
        )
        .route("/prds/{id}/versions", get(prd_handlers::list_versions))
        .route(
            "/prds/{id}/versions/{version}/restore",
            post(prd_handlers::restore_version),
        )
        .route("/prds/{id}/sections", get(prd_handlers::get_sections))
        .route("/prds/{id}/extract-tasks", post(prd_handlers::extract_tasks))
}

/// Creates the reports API router
pub fn create_reports_router() -> Router<DbState> {
    Router::new()
        .route(
            "/reports",
            get(reports_handlers::list_reports).post(reports_handlers::generate_report),
        )
        .route(
            "/reports/{id}",
            get(reports_handlers::get_report).delete(reports_handlers::delete_report),
        )
}

/// Creates the agents API router
pub fn create_agents_router() -> Router<DbState> {
    Router::new()
        .route(
            "/agents",
            get(agents_handlers::list_agents).post(agents_handlers::create_agent),
        )
        .route("/agents/me", get(agents_handlers::get_current_agent))
        .route(
            "/agents/{id}",
            get(agents_handlers::get_agent)
                .put(agents_handlers::update_agent)
                .delete(agents_handlers::delete_agent),
        )
        .route(
            "/agents/{id}/rotate-key",
            post(agents_handlers::rotate_agent_key),
        )
}

/// Creates the activity log router
pub fn create_activity_router() -> Router<DbState> {
    Router::new().route("/activity", get(activity_handlers::list_activity))
}
