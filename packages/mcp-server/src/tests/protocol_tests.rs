use crate::mcp::{handle_line, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION};
use crate::tests::test_helpers::create_test_context;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

async fn roundtrip(request: Value) -> Option<Value> {
    let context = create_test_context().await;
    handle_line(&context, &request.to_string()).await
}

#[tokio::test]
async fn test_initialize() {
    let response = roundtrip(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "1.0"}
        }
    }))
    .await
    .unwrap();

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(response["result"]["serverInfo"]["name"], "benos");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_ping_keeps_string_ids() {
    let response = roundtrip(json!({"jsonrpc": "2.0", "id": "abc", "method": "ping"}))
        .await
        .unwrap();
    assert_eq!(response["id"], "abc");
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_tools_list_has_every_tool() {
    let response = roundtrip(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .await
        .unwrap();
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 21);

    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    for expected in ["list_areas", "create_task", "move_task", "complete_subtask", "list_activity"] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    let create_task = tools.iter().find(|t| t["name"] == "create_task").unwrap();
    assert_eq!(create_task["inputSchema"]["type"], "object");
    assert_eq!(create_task["inputSchema"]["required"], json!(["boardId", "title"]));
}

#[tokio::test]
async fn test_notifications_get_no_reply() {
    assert!(roundtrip(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await
        .is_none());
    assert!(roundtrip(json!({"jsonrpc": "2.0", "method": "ping"})).await.is_none());
}

#[tokio::test]
async fn test_protocol_errors() {
    let context = create_test_context().await;

    let response = handle_line(&context, "{not json").await.unwrap();
    assert_eq!(response["error"]["code"], PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);

    let response = roundtrip(json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}))
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);

    let response = roundtrip(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call"}))
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], INVALID_PARAMS);
}

#[tokio::test]
async fn test_tool_failures_are_results_not_rpc_errors() {
    let response = roundtrip(json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": {"name": "get_task", "arguments": {"id": "nope"}}
    }))
    .await
    .unwrap();

    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let body: Value = serde_json::from_str(text).unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
