// ABOUTME: Integration tests for agent storage and key verification
// ABOUTME: Runs against an in-memory database with the full schema

use benos_core::Actor;
use benos_security::{
    Access, AgentCreateInput, AgentStorage, AgentUpdateInput, Requirement, Resource,
};
use benos_storage::{memory_pool, ActivityAction, ActivityFilter, ActivityLogger, EntityType, StorageError};

async fn setup() -> (AgentStorage, ActivityLogger) {
    let pool = memory_pool().await.unwrap();
    let activity = ActivityLogger::new(pool.clone());
    (AgentStorage::new(pool, activity.clone()), activity)
}

fn input(name: &str, capabilities: &[&str]) -> AgentCreateInput {
    AgentCreateInput {
        name: name.to_string(),
        description: None,
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_create_returns_plaintext_once() {
    let (storage, _) = setup().await;
    let created = storage
        .create(input("planner", &["tasks:*"]), &Actor::local_user())
        .await
        .unwrap();

    assert!(created.api_key.starts_with("benos_"));
    assert!(created.api_key.starts_with(&created.agent.key_prefix));

    let fetched = storage.get(&created.agent.id).await.unwrap();
    assert_ne!(fetched.key_hash, created.api_key);
    let json = serde_json::to_value(&fetched).unwrap();
    assert!(json.get("keyHash").is_none());
    assert!(json.get("apiKey").is_none());
}

#[tokio::test]
async fn test_verify_key_accepts_only_active_keys() {
    let (storage, _) = setup().await;
    let actor = Actor::local_user();
    let created = storage.create(input("bot", &["*"]), &actor).await.unwrap();

    let agent = storage.verify_key(&created.api_key).await.unwrap().unwrap();
    assert_eq!(agent.id, created.agent.id);
    assert!(storage.verify_key("benos_garbage").await.unwrap().is_none());

    storage.revoke(&created.agent.id, &actor).await.unwrap();
    assert!(storage.verify_key(&created.api_key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rotate_invalidates_old_key() {
    let (storage, activity) = setup().await;
    let actor = Actor::local_user();
    let created = storage.create(input("bot", &["*"]), &actor).await.unwrap();

    let rotated = storage.rotate_key(&created.agent.id, &actor).await.unwrap();
    assert_ne!(rotated.api_key, created.api_key);
    assert!(storage.verify_key(&created.api_key).await.unwrap().is_none());
    assert!(storage.verify_key(&rotated.api_key).await.unwrap().is_some());

    activity.flush().await;
    let logs = activity
        .storage()
        .list(&ActivityFilter::for_entity(EntityType::Agent, &created.agent.id))
        .await
        .unwrap();
    assert!(logs.iter().any(|l| l.action == ActivityAction::KeyRotated));
}

#[tokio::test]
async fn test_invalid_capability_rejected() {
    let (storage, _) = setup().await;
    let err = storage
        .create(input("bot", &["tasks:launch"]), &Actor::local_user())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
}

#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let (storage, _) = setup().await;
    let actor = Actor::local_user();
    storage.create(input("bot", &["*"]), &actor).await.unwrap();
    let err = storage.create(input("bot", &["*"]), &actor).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn test_update_capabilities_changes_access() {
    let (storage, _) = setup().await;
    let actor = Actor::local_user();
    let created = storage
        .create(input("reader", &["tasks:read"]), &actor)
        .await
        .unwrap();
    let write_tasks = Requirement {
        resource: Resource::Tasks,
        access: Access::Write,
    };
    assert!(!created.agent.allows(write_tasks));

    let updated = storage
        .update(
            &created.agent.id,
            AgentUpdateInput {
                capabilities: Some(vec!["tasks:read".into(), "tasks:write".into()]),
                ..Default::default()
            },
            &actor,
        )
        .await
        .unwrap();
    assert!(updated.allows(write_tasks));
}

#[tokio::test]
async fn test_get_missing_agent() {
    let (storage, _) = setup().await;
    assert!(matches!(
        storage.get("missing").await,
        Err(StorageError::NotFound(_))
    ));
}
