// ABOUTME: Unauthenticated liveness and status endpoints
// ABOUTME: Status also reports whether the database answers a trivial query

use axum::{extract::State, Json};
use benos_projects::DbState;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

pub const SERVICE_NAME: &str = "benos";

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": SERVICE_NAME
    }))
}

pub async fn status_check(State(db): State<DbState>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&db.pool).await {
        Ok(_) => "connected",
        Err(e) => {
            warn!("Database status probe failed: {}", e);
            "unavailable"
        }
    };
    let status = if database == "connected" { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "timestamp": Utc::now().timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": SERVICE_NAME,
        "database": database
    }))
}
