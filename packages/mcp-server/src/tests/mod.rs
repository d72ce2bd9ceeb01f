mod protocol_tests;
mod tool_tests;

pub mod test_helpers {
    use crate::context::ToolContext;
    use crate::tools::{tools_call, CallToolRequest};
    use benos_core::Actor;
    use benos_projects::{AreaCreateInput, DbState};
    use serde_json::Value;

    /// Context over an isolated in-memory database, acting as the local user
    pub async fn create_test_context() -> ToolContext {
        ToolContext::new(DbState::in_memory().await.unwrap())
    }

    /// Run a tool and decode its text payload
    pub async fn call(context: &ToolContext, name: &str, arguments: Value) -> (bool, Value) {
        let result = tools_call(
            context,
            CallToolRequest {
                name: name.to_string(),
                arguments: Some(arguments),
            },
        )
        .await;
        assert_eq!(result.content.len(), 1);
        let body = serde_json::from_str(&result.content[0].text).unwrap();
        (result.is_error, body)
    }

    pub async fn seed_area(db: &DbState, name: &str) -> String {
        db.area_storage
            .create(
                AreaCreateInput {
                    name: name.to_string(),
                    description: None,
                    color: None,
                    icon: None,
                },
                &Actor::local_user(),
            )
            .await
            .unwrap()
            .id
    }
}
