//! End-to-end tests of the JSON-RPC server over in-memory pipes.

mod common;

use std::sync::Arc;

use common::{test_dispatcher, MockApiClient, ServerHarness};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn harness() -> (ServerHarness, Arc<MockApiClient>) {
    let client = Arc::new(MockApiClient::new(json!({ "ok": true })));
    (ServerHarness::start(test_dispatcher(client.clone())), client)
}

#[tokio::test]
async fn initialize_negotiates_protocol_version() {
    let (mut server, _) = harness();

    let known = server
        .request(
            1,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "0.0.1" }
            }),
        )
        .await;
    assert_eq!(known["id"], 1);
    assert_eq!(known["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(known["result"]["serverInfo"]["name"], "toolbridge");
    assert_eq!(known["result"]["capabilities"]["tools"]["listChanged"], false);

    let unknown = server
        .request(2, "initialize", json!({ "protocolVersion": "1999-01-01" }))
        .await;
    assert_eq!(unknown["result"]["protocolVersion"], "2025-06-18");

    server.close().await;
}

#[tokio::test]
async fn tools_list_returns_registration_order() {
    let (mut server, _) = harness();

    let response = server.request(1, "tools/list", json!({})).await;
    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["get_thing", "slow_echo", "fast_echo"]);
    assert_eq!(
        response["result"]["tools"][0]["inputSchema"]["required"],
        json!(["id"])
    );

    server.close().await;
}

#[tokio::test]
async fn tools_call_returns_envelope() {
    let (mut server, client) = harness();

    let response = server
        .request(
            7,
            "tools/call",
            json!({ "name": "get_thing", "arguments": { "id": "42" } }),
        )
        .await;
    assert_eq!(
        response,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "result": { "content": [{ "type": "text", "text": "{\"ok\":true}" }] }
        })
    );
    assert_eq!(client.requests().await[0].path, "/things/42");

    server.close().await;
}

#[tokio::test]
async fn tool_failures_are_results_not_protocol_errors() {
    let (mut server, client) = harness();

    let unknown = server
        .request(1, "tools/call", json!({ "name": "missing_tool", "arguments": {} }))
        .await;
    assert!(unknown.get("error").is_none());
    assert_eq!(unknown["result"]["isError"], true);
    assert_eq!(
        unknown["result"]["content"][0]["text"],
        "Error: Unknown tool: missing_tool"
    );

    let invalid = server
        .request(2, "tools/call", json!({ "name": "get_thing" }))
        .await;
    assert_eq!(invalid["result"]["isError"], true);
    let text = invalid["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error: ") && text.contains("'id'"), "{text}");
    assert!(client.requests().await.is_empty());

    server.close().await;
}

#[tokio::test]
async fn malformed_frames_get_protocol_errors_and_the_session_continues() {
    let (mut server, _) = harness();

    server.send_raw("{not json").await;
    let parse_error = server.recv().await;
    assert_eq!(parse_error["id"], Value::Null);
    assert_eq!(parse_error["error"]["code"], -32700);

    let unknown = server.request(2, "resources/list", json!({})).await;
    assert_eq!(unknown["id"], 2);
    assert_eq!(unknown["error"]["code"], -32601);

    let bad_params = server.request(3, "tools/call", json!({ "arguments": {} })).await;
    assert_eq!(bad_params["error"]["code"], -32602);

    let pong = server.request(4, "ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));

    server.close().await;
}

#[tokio::test]
async fn non_utf8_line_is_a_parse_error_and_calls_keep_running() {
    let (mut server, _) = harness();

    server
        .send(json!({
            "jsonrpc": "2.0", "id": 9, "method": "tools/call",
            "params": { "name": "slow_echo", "arguments": { "id": "still here" } }
        }))
        .await;
    server.send_bytes(b"\xff\xfe").await;
    let parse_error = server.recv().await;
    assert_eq!(parse_error["id"], Value::Null);
    assert_eq!(parse_error["error"]["code"], -32700);

    let pong = server.request(10, "ping", json!({})).await;
    assert_eq!(pong["id"], 10);

    let slow = server.recv().await;
    assert_eq!(slow["id"], 9);
    assert_eq!(slow["result"]["content"][0]["text"], "still here");

    assert!(server.close().await.is_empty());
}

#[tokio::test]
async fn notifications_and_blank_lines_are_not_answered() {
    let (mut server, _) = harness();

    server
        .send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .await;
    server.send_raw("").await;
    let pong = server.request(9, "ping", json!({})).await;
    assert_eq!(pong["id"], 9);

    assert!(server.close().await.is_empty());
}

#[tokio::test]
async fn fast_calls_overtake_slow_ones() {
    let (mut server, _) = harness();

    server
        .send(json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": { "name": "slow_echo", "arguments": { "id": "slow" } }
        }))
        .await;
    server
        .send(json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": { "name": "fast_echo", "arguments": { "id": "fast" } }
        }))
        .await;

    let first = server.recv().await;
    let second = server.recv().await;
    assert_eq!(first["id"], 2);
    assert_eq!(first["result"]["content"][0]["text"], "fast");
    assert_eq!(second["id"], 1);
    assert_eq!(second["result"]["content"][0]["text"], "slow");

    server.close().await;
}

#[tokio::test]
async fn end_of_input_waits_for_in_flight_calls() {
    let (mut server, _) = harness();

    server
        .send(json!({
            "jsonrpc": "2.0", "id": "last", "method": "tools/call",
            "params": { "name": "slow_echo", "arguments": { "id": "done" } }
        }))
        .await;

    let remaining = server.close().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], "last");
    assert_eq!(remaining[0]["result"]["content"][0]["text"], "done");
}
