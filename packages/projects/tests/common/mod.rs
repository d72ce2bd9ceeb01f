// ABOUTME: Common test utilities for project storage integration tests
// ABOUTME: Builds a DbState over an in-memory database

#![allow(dead_code)]

use benos_core::Actor;
use benos_projects::{Area, AreaCreateInput, DbState, Project, ProjectCreateInput};

pub async fn setup() -> (DbState, Actor) {
    let pool = benos_storage::memory_pool().await.unwrap();
    (DbState::new(pool), Actor::local_user())
}

pub async fn area(db: &DbState, name: &str) -> Area {
    db.area_storage
        .create(
            AreaCreateInput {
                name: name.to_string(),
                ..Default::default()
            },
            &Actor::local_user(),
        )
        .await
        .unwrap()
}

pub async fn project(db: &DbState, area_id: &str, name: &str) -> Project {
    db.project_storage
        .create(
            ProjectCreateInput {
                area_id: area_id.to_string(),
                name: name.to_string(),
                ..Default::default()
            },
            &Actor::local_user(),
        )
        .await
        .unwrap()
}

/// Let spawned activity writes land
pub async fn settle(db: &DbState) {
    db.flush_activity().await;
}
