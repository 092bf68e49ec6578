//! Gemini client against a mock generateContent endpoint

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use tytux::core::config::GeminiConfig;
use tytux::core::{ToolCall, ToolResult, ToolSpec, Turn};
use tytux::llm::{Decision, GeminiClient, ModelClient};
use tytux::TytuxError;

#[derive(Clone, Default)]
struct Captured {
    path: Option<String>,
    api_key: Option<String>,
    body: Option<Value>,
}

#[derive(Clone)]
struct MockGemini {
    status: StatusCode,
    reply: Value,
    captured: Arc<Mutex<Captured>>,
}

async fn generate(
    State(mock): State<MockGemini>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut captured = mock.captured.lock().unwrap();
    captured.path = Some(uri.path().to_string());
    captured.api_key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    captured.body = Some(body);
    (mock.status, Json(mock.reply.clone()))
}

async fn spawn_gemini(status: StatusCode, reply: Value) -> (GeminiClient, MockGemini, tokio::task::JoinHandle<()>) {
    let mock = MockGemini {
        status,
        reply,
        captured: Arc::new(Mutex::new(Captured::default())),
    };
    let app = Router::new().fallback(generate).with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("read test listener addr");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = GeminiClient::from_config(&GeminiConfig {
        api_key: "gm-test".to_string(),
        model: "gemini-test".to_string(),
        base_url: format!("http://{addr}"),
        ..Default::default()
    })
    .expect("build client")
    .with_system_instruction("You are TyTuX.");

    (client, mock, handle)
}

fn query_spec() -> ToolSpec {
    ToolSpec::new(
        "executeQuery",
        "Run NerdGraph",
        json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
    )
}

#[tokio::test]
async fn text_reply_is_final_answer() {
    let (client, mock, server) = spawn_gemini(
        StatusCode::OK,
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Your account is Acme."}]}}]}),
    )
    .await;

    let decision = client
        .decide(&[Turn::user("What is my account name?")], &[query_spec()])
        .await
        .unwrap();
    server.abort();

    assert_eq!(decision, Decision::FinalAnswer("Your account is Acme.".to_string()));

    let captured = mock.captured.lock().unwrap();
    assert_eq!(
        captured.path.as_deref(),
        Some("/v1beta/models/gemini-test:generateContent")
    );
    assert_eq!(captured.api_key.as_deref(), Some("gm-test"));
    let body = captured.body.as_ref().unwrap();
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are TyTuX.");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "What is my account name?");
    assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "executeQuery");
}

#[tokio::test]
async fn function_calls_become_tool_batch() {
    let (client, _mock, server) = spawn_gemini(
        StatusCode::OK,
        json!({"candidates": [{"content": {"role": "model", "parts": [
            {"functionCall": {"id": "fc-1", "name": "executeQuery", "args": {"query": "{ actor { user { name } } }"}}},
            {"functionCall": {"name": "introspectSchema"}}
        ]}}]}),
    )
    .await;

    let decision = client.decide(&[Turn::user("who am I")], &[]).await.unwrap();
    server.abort();

    match decision {
        Decision::ToolCallBatch { calls, .. } => {
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[0].name, "executeQuery");
            assert_eq!(calls[0].id, "fc-1");
            assert_eq!(calls[0].get_string("query").as_deref(), Some("{ actor { user { name } } }"));
            assert_eq!(calls[1].name, "introspectSchema");
            assert_eq!(calls[1].arguments, json!({}));
        }
        other => panic!("expected tool calls, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_results_are_sent_as_function_responses() {
    let (client, mock, server) = spawn_gemini(
        StatusCode::OK,
        json!({"candidates": [{"content": {"parts": [{"text": "done"}]}}]}),
    )
    .await;

    let call = ToolCall::new("call_1_0", "executeQuery", json!({"query": "{x}"}));
    let transcript = vec![
        Turn::user("q"),
        Turn::assistant_calls("", vec![call.clone()]),
        Turn::tool(vec![ToolResult::ok(&call, json!({"x": 1}))]),
    ];
    client.decide(&transcript, &[query_spec()]).await.unwrap();
    server.abort();

    let captured = mock.captured.lock().unwrap();
    let contents = &captured.body.as_ref().unwrap()["contents"];
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(
        contents[2]["parts"][0]["functionResponse"],
        json!({"name": "executeQuery", "response": {"result": {"x": 1}}})
    );
}

#[tokio::test]
async fn api_error_is_model_unavailable() {
    let (client, _mock, server) = spawn_gemini(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "Resource has been exhausted"}}),
    )
    .await;

    let err = client.decide(&[Turn::user("q")], &[]).await.unwrap_err();
    server.abort();

    match err {
        TytuxError::ModelUnavailable(detail) => {
            assert!(detail.contains("429"), "detail: {detail}");
            assert!(detail.contains("exhausted"));
        }
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn blocked_prompt_is_model_unavailable() {
    let (client, _mock, server) = spawn_gemini(
        StatusCode::OK,
        json!({"promptFeedback": {"blockReason": "SAFETY"}}),
    )
    .await;

    let err = client.decide(&[Turn::user("q")], &[]).await.unwrap_err();
    server.abort();

    assert!(matches!(err, TytuxError::ModelUnavailable(ref m) if m.contains("SAFETY")));
}
