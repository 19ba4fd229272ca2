#![cfg(unix)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use umcp_kernel::{DispatchState, Executor, Protocol, Server, ToolHandler};
use umcp_primitives::{
    ArgType, ArgumentSpec, Catalog, CatalogMetadata, CatalogSettings, ChainStep, SecurityPolicy,
    ToolDefinition,
};
use umcp_telemetry::Tracer;
use umcp_tools::ToolRegistry;

fn registry() -> Arc<ToolRegistry> {
    let echo = Catalog::new(CatalogMetadata::new("echo"), CatalogSettings::new("echo"))
        .with_security(SecurityPolicy::new().with_blocked_commands(["rm"]))
        .with_tool(
            ToolDefinition::new("say", "Print text").with_argument(
                ArgumentSpec::new("text", ArgType::String)
                    .required()
                    .at_position(0)
                    .with_description("Text to print"),
            ),
        );
    let shell = Catalog::new(CatalogMetadata::new("sh"), CatalogSettings::new("sh"))
        .with_security(SecurityPolicy::new().without_injection_check())
        .with_tool(
            ToolDefinition::new("run", "Run a script")
                .with_command("-c")
                .with_argument(ArgumentSpec::new("script", ArgType::String).at_position(0)),
        )
        .with_tool(
            ToolDefinition::new("steps", "Two steps")
                .with_chain_step(ChainStep::new(Some("-c"), ["echo ${word}"]))
                .with_chain_step(ChainStep::new(Some("-c"), ["exit 9"])),
        );

    let mut registry = ToolRegistry::new();
    registry.register_catalog(echo).unwrap();
    registry.register_catalog(shell).unwrap();
    Arc::new(registry)
}

/// Feeds `lines` to a server and returns every response line it wrote.
async fn exchange(lines: &[String]) -> Vec<Value> {
    let (client, server_io) = tokio::io::duplex(1 << 20);
    let (server_rd, server_wr) = tokio::io::split(server_io);
    let (mut client_rd, mut client_wr) = tokio::io::split(client);

    for line in lines {
        client_wr.write_all(line.as_bytes()).await.unwrap();
        client_wr.write_all(b"\n").await.unwrap();
    }
    client_wr.shutdown().await.unwrap();

    let tracer = Arc::new(Tracer::disabled());
    let handler = ToolHandler::new(registry(), Executor::new(Arc::clone(&tracer)));
    let mut server = Server::new(handler, tracer);
    server
        .run(Protocol::new(BufReader::new(server_rd), server_wr))
        .await
        .unwrap();
    assert_eq!(server.state(), DispatchState::Closed);
    drop(server);

    let mut output = String::new();
    client_rd.read_to_string(&mut output).await.unwrap();
    output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn request(id: u64, method: &str, params: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }).to_string()
}

fn call(id: u64, name: &str, arguments: Value) -> String {
    request(id, "tools/call", json!({ "name": name, "arguments": arguments }))
}

#[tokio::test]
async fn handshake_and_listing() {
    let responses = exchange(&[
        request(1, "initialize", json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "test", "version": "0" }
        })),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        request(2, "tools/list", Value::Null),
        request(3, "prompts/list", Value::Null),
        request(4, "resources/list", Value::Null),
    ])
    .await;

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "umcp");

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, ["echo_say", "sh_run", "sh_steps"]);
    assert_eq!(
        tools[0]["inputSchema"],
        json!({
            "type": "object",
            "properties": { "text": { "type": "string", "description": "Text to print" } },
            "required": ["text"]
        })
    );

    assert_eq!(responses[2]["result"], json!({ "prompts": [] }));
    assert_eq!(responses[3]["result"], json!({ "resources": [] }));
}

#[tokio::test]
async fn unknown_tool_is_invalid_params() {
    let responses = exchange(&[call(1, "foo_bar", json!({}))]).await;
    assert_eq!(responses[0]["error"]["code"], -32602);
    assert!(
        responses[0]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Tool not found: foo_bar")
    );
}

#[tokio::test]
async fn malformed_and_unknown_requests_do_not_stop_the_loop() {
    let responses = exchange(&[
        "{not json".to_owned(),
        String::new(),
        request(2, "sampling/createMessage", Value::Null),
        call(3, "echo_say", json!({ "text": "still here" })),
    ])
    .await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[2]["result"]["content"][0]["text"], "still here\n");
}

#[tokio::test]
async fn only_initialized_notification_goes_unanswered() {
    let responses = exchange(&[
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        json!({ "jsonrpc": "2.0", "method": "notifications/cancelled", "params": { "requestId": 1 } })
            .to_string(),
    ])
    .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], -32601);
}

#[tokio::test]
async fn tool_call_success_and_failure_envelopes() {
    let responses = exchange(&[
        call(1, "echo_say", json!({ "text": "hi" })),
        call(2, "sh_run", json!({ "script": "echo partial; exit 2" })),
        call(3, "echo_say", json!({ "text": "a; rm -rf /" })),
        call(4, "echo_say", json!({})),
    ])
    .await;

    assert_eq!(
        responses[0]["result"],
        json!({ "content": [{ "type": "text", "text": "hi\n" }] })
    );

    let failed = &responses[1]["result"];
    assert_eq!(failed["isError"], true);
    assert_eq!(
        failed["content"][0]["text"],
        "Command failed: command failed with exit code 2\n\npartial\n"
    );

    let blocked = responses[2]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(blocked.starts_with("Command failed: command blocked by security policy"));
    assert!(blocked.contains("pattern ';'"));
    assert_eq!(responses[2]["result"]["isError"], true);

    let missing = responses[3]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(missing.contains("required argument `text` not provided"));
}

#[tokio::test]
async fn chain_failure_reports_step_and_prior_output() {
    let responses = exchange(&[call(1, "sh_steps", json!({ "word": "hello" }))]).await;
    let result = &responses[0]["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(
        result["content"][0]["text"],
        "Command failed: chain step 2 failed: command failed with exit code 9\n\nhello\n"
    );
}

#[tokio::test]
async fn missing_call_params_are_invalid() {
    let responses = exchange(&[request(1, "tools/call", Value::Null)]).await;
    assert_eq!(responses[0]["error"]["code"], -32602);
    assert_eq!(responses[0]["error"]["message"], "Invalid parameters");
}

#[tokio::test]
async fn recorded_trace_is_persisted_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    let tracer = Arc::new(Tracer::recording(Some(path.clone())).await.unwrap());
    let handler = ToolHandler::new(registry(), Executor::new(Arc::clone(&tracer)));
    let mut server = Server::new(handler, Arc::clone(&tracer));

    let input = format!("{}\n", call(1, "echo_say", json!({ "text": "x" })));
    server
        .run(Protocol::new(BufReader::new(input.as_bytes()), Vec::new()))
        .await
        .unwrap();

    let events: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let kinds: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|event| event["type"].as_str())
        .collect();
    assert_eq!(kinds, ["request", "command", "output", "response"]);
}
