//! End-to-end agent scenarios against a mocked chat-completions endpoint.

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opsagent::agent::Agent;
use opsagent::chat::ChatAgent;
use opsagent::config::Config;

/// OpenAI-shaped completion body with plain text content
fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-test",
        "object": "chat.completion",
        "created": 0,
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

/// Completion body carrying native tool calls
fn tool_call_completion(name: &str, arguments: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "cmpl-test",
        "object": "chat.completion",
        "created": 0,
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

fn test_config(dir: &TempDir, base_url: String) -> Config {
    let mut config = Config::default();
    config.vllm.base_url = base_url;
    config.vllm.model = "test-model".to_string();
    config.workspace.dir = dir.path().join("workspace");
    config.memory.path = dir.path().join("data/memory.json");
    config.audit.log_path = dir.path().join("data/runlog.jsonl");
    config.agent.loop_wait_sec = 0.0;
    config
}

async fn mount_planner(server: &MockServer, plan: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Generate a plan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&plan.to_string())))
        .mount(server)
        .await;
}

async fn mount_responder(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Generate a natural language response"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn single_shot_read_finishes_in_one_loop() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_planner(
        &server,
        json!({
            "need_tools": true,
            "tool_calls": [{"tool_name": "read_file", "args": {"path": "test.txt"}}],
            "reason_brief": "read",
            "stop_condition": "done"
        }),
    )
    .await;
    mount_responder(&server, "Hello World").await;

    let config = test_config(&dir, server.uri());
    std::fs::create_dir_all(&config.workspace.dir).unwrap();
    std::fs::write(config.workspace.dir.join("test.txt"), "Hello World").unwrap();

    let mut agent = Agent::new(config).unwrap();
    let response = agent.run("show test").await;

    assert_eq!(response, "Hello World");
    let summary = agent.execution_summary();
    assert_eq!(summary.total_loops, 1);
    assert_eq!(summary.tool_calls_total, 1);
    assert!((summary.tool_success_rate - 1.0).abs() < 1e-9);
    assert!(summary.completed);
}

#[tokio::test]
async fn no_tools_needed_stops_immediately() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_planner(
        &server,
        json!({"need_tools": false, "reason_brief": "answer from memory", "stop_condition": ""}),
    )
    .await;
    mount_responder(&server, "You asked me this before: 42.").await;

    let mut agent = Agent::new(test_config(&dir, server.uri())).unwrap();
    let response = agent.run("what was the answer").await;

    assert_eq!(response, "You asked me this before: 42.");
    assert_eq!(agent.execution_summary().total_loops, 1);
    assert_eq!(agent.execution_summary().tool_calls_total, 0);
}

#[tokio::test]
async fn traversal_attempt_is_refused_and_recorded() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_planner(
        &server,
        json!({
            "need_tools": true,
            "tool_calls": [{"tool_name": "read_file", "args": {"path": "../../etc/passwd"}}],
            "reason_brief": "read",
            "stop_condition": "done"
        }),
    )
    .await;
    mount_responder(&server, "That file is outside the workspace.").await;

    let mut config = test_config(&dir, server.uri());
    config.agent.max_loops = 1;

    let mut agent = Agent::new(config).unwrap();
    agent.run("read the password file").await;

    let results = &agent.state().history[0].tool_results;
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert!(results[0].error.starts_with("Path outside allowed root"));
}

#[tokio::test]
async fn unparseable_plan_aborts_the_request() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I refuse to emit JSON")))
        .mount(&server)
        .await;

    let mut agent = Agent::new(test_config(&dir, server.uri())).unwrap();
    let response = agent.run("anything").await;

    assert!(response.contains("Error occurred during execution (Loop 1)"));
}

#[tokio::test]
async fn model_http_error_aborts_the_request() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "engine overloaded", "type": "server_error"}
        })))
        .mount(&server)
        .await;

    let mut agent = Agent::new(test_config(&dir, server.uri())).unwrap();
    let response = agent.run("anything").await;

    assert!(response.contains("Error occurred during execution (Loop 1)"));
    assert!(response.contains("engine overloaded"));
}

#[tokio::test]
async fn audit_log_has_entries_for_the_completed_loop() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_planner(
        &server,
        json!({
            "need_tools": true,
            "tool_calls": [{"tool_name": "list_dir", "args": {}}],
            "reason_brief": "list",
            "stop_condition": "done"
        }),
    )
    .await;
    mount_responder(&server, "The workspace is empty.").await;

    let config = test_config(&dir, server.uri());
    let log_path = config.audit.log_path.clone();

    let mut agent = Agent::new(config).unwrap();
    agent.run("list").await;

    let content = std::fs::read_to_string(&log_path).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    // Planner decision, then the tool call, then the responder reply
    assert!(events.len() >= 3);
    assert_eq!(events[0]["event_type"], "planner_decision");
    assert_eq!(events[1]["event_type"], "tool_call");
    assert_eq!(events[1]["tool_name"], "list_dir");
    assert_eq!(events[2]["event_type"], "responder_response");
}

#[tokio::test]
async fn chat_facade_free_text_tool_round_trip() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    // First reply asks for a tool via the free-text protocol, second is final
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Let me check.\n\nTOOL_CALL: {\"name\": \"read_file\", \"args\": {\"path\": \"note.txt\"}}",
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("The note says: remember the milk")))
        .mount(&server)
        .await;

    let mut config = test_config(&dir, server.uri());
    config.vllm.enable_function_calling = false;
    std::fs::create_dir_all(&config.workspace.dir).unwrap();
    std::fs::write(config.workspace.dir.join("note.txt"), "remember the milk").unwrap();

    let mut chat = ChatAgent::new(config).unwrap();
    let reply = chat.chat("user-1", "what does the note say?").await.unwrap();

    assert_eq!(reply, "The note says: remember the milk");
    // system + user + assistant(tool call) + tool-result-as-user + final assistant
    assert_eq!(chat.transcript_len("user-1"), 5);
}

#[tokio::test]
async fn chat_facade_native_calls_win_over_text() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tool_call_completion("list_dir", json!({"path": "."}))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("One file: a.txt")))
        .mount(&server)
        .await;

    let mut config = test_config(&dir, server.uri());
    std::fs::create_dir_all(&config.workspace.dir).unwrap();
    std::fs::write(config.workspace.dir.join("a.txt"), "").unwrap();

    let mut chat = ChatAgent::new(config).unwrap();
    let reply = chat.chat("user-2", "list the workspace").await.unwrap();

    assert_eq!(reply, "One file: a.txt");
}

#[tokio::test]
async fn chat_facade_hits_iteration_bound() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    // The model keeps asking for the same tool forever
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "TOOL_CALL: {\"name\": \"list_dir\", \"args\": {}}",
        )))
        .mount(&server)
        .await;

    let mut config = test_config(&dir, server.uri());
    config.vllm.enable_function_calling = false;

    let mut chat = ChatAgent::new(config).unwrap();
    let reply = chat.chat("user-3", "loop forever").await.unwrap();

    assert!(reply.contains("maximum tool iterations"));
}

#[tokio::test]
async fn chat_facade_reset_clears_transcript() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hi!")))
        .mount(&server)
        .await;

    let mut chat = ChatAgent::new(test_config(&dir, server.uri())).unwrap();
    chat.chat("user-4", "hello").await.unwrap();
    assert_eq!(chat.transcript_len("user-4"), 3);

    chat.reset("user-4");
    assert_eq!(chat.transcript_len("user-4"), 0);
}
