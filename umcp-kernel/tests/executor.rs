#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use umcp_kernel::{ExecError, Executor, TRUNCATION_MARKER};
use umcp_policy::SandboxError;
use umcp_primitives::{
    ArgType, ArgumentSpec, Catalog, CatalogMetadata, CatalogSettings, ChainStep, OutputSpec,
    OutputType, SecurityPolicy, ToolDefinition,
};
use umcp_telemetry::Tracer;

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn catalog(settings: CatalogSettings, security: SecurityPolicy) -> Catalog {
    Catalog::new(CatalogMetadata::new("test"), settings).with_security(security)
}

fn positional_tool(name: &str) -> ToolDefinition {
    ToolDefinition::new(name, "positional text")
        .with_argument(ArgumentSpec::new("text", ArgType::String).required().at_position(0))
}

#[tokio::test]
async fn runs_command_and_captures_stdout() {
    let catalog = catalog(CatalogSettings::new("echo"), SecurityPolicy::new());
    let output = Executor::default()
        .execute(&catalog, &positional_tool("say"), &args(json!({ "text": "hello" })))
        .await
        .unwrap();
    assert_eq!(output, "hello\n");
}

#[tokio::test]
async fn zero_timeout_falls_back_to_default() {
    let settings = CatalogSettings::new("echo").with_timeout(Duration::ZERO);
    let catalog = catalog(settings, SecurityPolicy::new());
    let output = Executor::default()
        .execute(&catalog, &positional_tool("say"), &args(json!({ "text": "in time" })))
        .await
        .unwrap();
    assert_eq!(output, "in time\n");
}

#[tokio::test]
async fn parses_lines_output() {
    let catalog = catalog(CatalogSettings::new("printf"), SecurityPolicy::new());
    let tool = positional_tool("lines").with_output(OutputSpec::new(OutputType::Lines));
    let output = Executor::default()
        .execute(&catalog, &tool, &args(json!({ "text": r"line1\nline2\n\nline3 " })))
        .await
        .unwrap();
    let parsed: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed, json!(["line1", "line2", "line3"]));
}

#[tokio::test]
async fn parser_failure_falls_back_to_raw() {
    let catalog = catalog(CatalogSettings::new("echo"), SecurityPolicy::new());
    let tool = positional_tool("json").with_output(OutputSpec::new(OutputType::Json));
    let output = Executor::default()
        .execute(&catalog, &tool, &args(json!({ "text": "not-json" })))
        .await
        .unwrap();
    assert_eq!(output, "not-json\n");
}

#[tokio::test]
async fn non_zero_exit_carries_output() {
    let catalog = catalog(
        CatalogSettings::new("sh"),
        SecurityPolicy::new().without_injection_check(),
    );
    let tool = ToolDefinition::new("fail", "fails")
        .with_command("-c")
        .with_argument(ArgumentSpec::new("script", ArgType::String).required().at_position(0));

    let err = Executor::default()
        .execute(&catalog, &tool, &args(json!({ "script": "echo oops; echo bad >&2; exit 3" })))
        .await
        .unwrap_err();
    match err {
        ExecError::ExecutionFailed { exit_code, output } => {
            assert_eq!(exit_code, Some(3));
            assert_eq!(output, "oops\n\nbad\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn sandbox_rejects_before_spawning() {
    let catalog = catalog(CatalogSettings::new("echo"), SecurityPolicy::new());
    let err = Executor::default()
        .execute(&catalog, &positional_tool("say"), &args(json!({ "text": "a; rm -rf /" })))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecError::Sandbox(SandboxError::InjectionDetected { pattern: ";", .. })
    ));
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let catalog = catalog(
        CatalogSettings::new("umcp-definitely-not-installed"),
        SecurityPolicy::new(),
    );
    let err = Executor::default()
        .execute(&catalog, &ToolDefinition::new("x", "missing"), &Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Spawn { .. }));
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let catalog = catalog(
        CatalogSettings::new("sleep").with_timeout(Duration::from_millis(200)),
        SecurityPolicy::new(),
    );
    let started = Instant::now();
    let err = Executor::default()
        .execute(&catalog, &positional_tool("nap"), &args(json!({ "text": "5" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Timeout(limit) if limit == Duration::from_millis(200)));
    assert!(err.captured_output().is_none());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn oversized_output_is_truncated() {
    let catalog = catalog(
        CatalogSettings::new("echo"),
        SecurityPolicy::new().with_max_output_size(10),
    );
    let output = Executor::default()
        .execute(&catalog, &positional_tool("say"), &args(json!({ "text": "x".repeat(100) })))
        .await
        .unwrap();
    assert_eq!(output, format!("{}{TRUNCATION_MARKER}", "x".repeat(10)));
    assert!(output.len() <= 10 + TRUNCATION_MARKER.len());
}

#[tokio::test]
async fn environment_and_working_dir_apply() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().canonicalize().unwrap();
    let catalog = catalog(
        CatalogSettings::new("sh")
            .with_working_dir(&path)
            .with_env("UMCP_GREETING=first")
            .with_env("MALFORMED")
            .with_env("UMCP_GREETING=second"),
        SecurityPolicy::new().without_injection_check(),
    );
    let tool = ToolDefinition::new("env", "env")
        .with_command("-c")
        .with_argument(ArgumentSpec::new("script", ArgType::String).at_position(0));

    let output = Executor::default()
        .execute(&catalog, &tool, &args(json!({ "script": "echo $UMCP_GREETING; pwd" })))
        .await
        .unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines, ["second", path.to_str().unwrap()]);
}

#[tokio::test]
async fn chain_substitutes_and_joins_outputs() {
    let catalog = catalog(CatalogSettings::new("echo"), SecurityPolicy::new());
    let tool = ToolDefinition::new("release", "tag and push")
        .with_chain_step(ChainStep::new(None, ["${tag}"]))
        .with_chain_step(ChainStep::new(None, ["pushed", "${tag}"]));

    let output = Executor::default()
        .execute_chain(&catalog, &tool, &args(json!({ "tag": "v1" })))
        .await
        .unwrap();
    assert_eq!(output, "v1\n\npushed v1\n");
}

#[tokio::test]
async fn chain_stops_at_first_failure() {
    let catalog = catalog(CatalogSettings::new("sh"), SecurityPolicy::new());
    let tool = ToolDefinition::new("steps", "three steps")
        .with_chain_step(ChainStep::new(Some("-c"), ["echo first"]))
        .with_chain_step(ChainStep::new(Some("-c"), ["exit 4"]))
        .with_chain_step(ChainStep::new(Some("-c"), ["echo never"]));

    let err = Executor::default()
        .execute_chain(&catalog, &tool, &Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.step(), 2);
    assert_eq!(err.output(), "first\n");
    assert!(matches!(
        err.cause(),
        ExecError::ExecutionFailed { exit_code: Some(4), .. }
    ));
    assert_eq!(
        err.to_string(),
        "chain step 2 failed: command failed with exit code 4"
    );
}

#[tokio::test]
async fn recording_tracer_observes_processes() {
    let tracer = Arc::new(Tracer::recording(None).await.unwrap());
    let executor = Executor::new(Arc::clone(&tracer));
    let catalog = catalog(CatalogSettings::new("echo"), SecurityPolicy::new());
    executor
        .execute(&catalog, &positional_tool("say"), &args(json!({ "text": "traced" })))
        .await
        .unwrap();

    let summary = tracer.summary().await;
    assert_eq!(summary.commands, 1);
    assert_eq!(summary.total, 2);
    let events = tracer.events().await;
    assert_eq!(events[0].data(), &json!("echo traced"));
    assert_eq!(events[1].metadata().unwrap()["exit_code"], 0);
}
