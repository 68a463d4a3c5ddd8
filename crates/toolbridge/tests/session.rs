//! End-to-end turns against a mock LLM and a mock target API.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toolbridge::{
    ApiClient, ChatOrchestrator, Config, ConversationTurn, CoreError, HttpOperationTool,
    InputOutcome, OpenAIClient, OpenApiDocument, RetryConfig, ToolInvoker, ToolOutcome,
    discover_tools, extract,
};

/// Nothing listens on the discard port.
const UNREACHABLE_API: &str = "http://127.0.0.1:9";

fn multiply_document() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {"title": "FastAPI", "version": "0.1.0"},
        "paths": {
            "/multiply": {
                "post": {
                    "summary": "Get Multiplication",
                    "operationId": "get_multiplication_multiply_post",
                    "parameters": [
                        {"name": "a", "in": "query", "required": true, "schema": {"type": "integer", "title": "A"}},
                        {"name": "b", "in": "query", "required": true, "schema": {"type": "integer", "title": "B"}}
                    ]
                }
            }
        }
    })
}

fn completion(message: &Value, finish_reason: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gemini-2.0-flash",
        "choices": [{"index": 0, "message": message, "finish_reason": finish_reason}],
        "usage": {"prompt_tokens": 40, "completion_tokens": 8, "total_tokens": 48}
    })
}

async fn start_api() -> MockServer {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(multiply_document()))
        .mount(&api)
        .await;
    api
}

fn llm_client(llm: &MockServer) -> OpenAIClient {
    let config = Config::default()
        .with_base_url(llm.uri())
        .with_api_key("test-key")
        .with_retry_config(RetryConfig::none());
    OpenAIClient::new(config).unwrap()
}

async fn orchestrator(api: &MockServer, llm: &MockServer) -> ChatOrchestrator<OpenAIClient> {
    let api = ApiClient::new(&api.uri()).unwrap();
    let invoker = ToolInvoker::from_tools(discover_tools(&api).await.unwrap()).unwrap();
    ChatOrchestrator::new(llm_client(llm), invoker)
}

/// Tools taken from the multiply document whose API has gone away.
fn unreachable_orchestrator(llm: &MockServer) -> ChatOrchestrator<OpenAIClient> {
    let document = OpenApiDocument::from_json(&multiply_document().to_string()).unwrap();
    let api = ApiClient::new(UNREACHABLE_API).unwrap();
    let tools = extract(&document)
        .unwrap()
        .into_iter()
        .map(|operation| HttpOperationTool::new(operation, api.clone()));
    ChatOrchestrator::new(llm_client(llm), ToolInvoker::from_tools(tools).unwrap())
}

async fn mount_multiply_call(llm: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_7",
                    "type": "function",
                    "function": {"name": "multiply", "arguments": "{\"a\":6,\"b\":7}"}
                }]
            }),
            "tool_calls",
        )))
        .expect(1)
        .mount(llm)
        .await;
}

fn assert_connection_failure(turn: &ConversationTurn) {
    let ConversationTurn::ToolResult { call_id, result } = turn else {
        panic!("expected a tool result, got {turn:?}");
    };
    assert_eq!(call_id, "call_7");
    assert!(!result.is_success());
    assert!(result.error().unwrap().contains("127.0.0.1:9"));
}

#[tokio::test]
async fn test_multiplication_turn_calls_api() {
    let api = start_api().await;
    Mock::given(method("POST"))
        .and(path("/multiply"))
        .and(query_param("a", "3"))
        .and(query_param("b", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 3, "b": 4, "result": 12})))
        .expect(1)
        .mount(&api)
        .await;

    let llm = MockServer::start().await;
    // The resubmission carries the tool result and must win over the first mock.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("tool_call_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({"role": "assistant", "content": "3 times 4 is 12."}),
            "stop",
        )))
        .with_priority(1)
        .expect(1)
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "multiply", "arguments": "{\"a\":3,\"b\":4}"}
                }]
            }),
            "tool_calls",
        )))
        .expect(1)
        .mount(&llm)
        .await;

    let mut orchestrator = orchestrator(&api, &llm).await;
    assert_eq!(orchestrator.tools()[0].name(), "multiply");

    let outcome = orchestrator.handle_input("What is 3 times 4?").await.unwrap();
    assert_eq!(outcome, InputOutcome::Reply("3 times 4 is 12.".to_string()));

    let turns = orchestrator.conversation().turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0], ConversationTurn::user("What is 3 times 4?"));
    let ConversationTurn::ToolResult { call_id, result } = &turns[2] else {
        panic!("expected a tool result, got {:?}", turns[2]);
    };
    assert_eq!(call_id, "call_1");
    assert_eq!(
        result.outcome,
        ToolOutcome::Success(json!({"a": 3, "b": 4, "result": 12}))
    );
    assert_eq!(turns[3], ConversationTurn::model("3 times 4 is 12."));
    assert_eq!(orchestrator.usage().total_tokens, 96);
}

#[tokio::test]
async fn test_api_failure_is_reported_to_model() {
    let api = start_api().await;
    Mock::given(method("POST"))
        .and(path("/multiply"))
        .respond_with(ResponseTemplate::new(422).set_body_string("field required"))
        .mount(&api)
        .await;

    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Tool execution failed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({"role": "assistant", "content": "The service rejected the request."}),
            "stop",
        )))
        .with_priority(1)
        .expect(1)
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": {"name": "multiply", "arguments": "{\"a\":3}"}
                }]
            }),
            "tool_calls",
        )))
        .mount(&llm)
        .await;

    let mut orchestrator = orchestrator(&api, &llm).await;
    let outcome = orchestrator.handle_input("3 times what?").await.unwrap();
    assert_eq!(
        outcome,
        InputOutcome::Reply("The service rejected the request.".to_string())
    );

    let ConversationTurn::ToolResult { result, .. } = &orchestrator.conversation().turns()[2] else {
        panic!("expected a tool result");
    };
    assert!(!result.is_success());
    assert!(result.error().unwrap().contains("HTTP 422"));
}

#[tokio::test]
async fn test_llm_outage_keeps_history() {
    let api = start_api().await;
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&llm)
        .await;

    let mut orchestrator = orchestrator(&api, &llm).await;
    let err = orchestrator.handle_input("hello").await.unwrap_err();

    assert!(matches!(err, CoreError::ModelRequest(_)));
    assert!(orchestrator.conversation().is_empty());

    // The session survives and accepts the next line.
    assert_eq!(
        orchestrator.handle_input("quit").await.unwrap(),
        InputOutcome::Exit
    );
}

#[tokio::test]
async fn test_unreachable_api_failure_is_kept_in_history() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Tool execution failed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            &json!({"role": "assistant", "content": "The multiplication service is down."}),
            "stop",
        )))
        .with_priority(1)
        .expect(1)
        .mount(&llm)
        .await;
    mount_multiply_call(&llm).await;

    let mut orchestrator = unreachable_orchestrator(&llm);
    let outcome = orchestrator.handle_input("What is 6 times 7?").await.unwrap();
    assert_eq!(
        outcome,
        InputOutcome::Reply("The multiplication service is down.".to_string())
    );

    let turns = orchestrator.conversation().turns();
    assert_eq!(turns.len(), 4);
    assert_connection_failure(&turns[2]);
}

#[tokio::test]
async fn test_unreachable_api_result_survives_llm_outage() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Tool execution failed"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .with_priority(1)
        .expect(1)
        .mount(&llm)
        .await;
    mount_multiply_call(&llm).await;

    let mut orchestrator = unreachable_orchestrator(&llm);
    let err = orchestrator.handle_input("What is 6 times 7?").await.unwrap_err();
    assert!(matches!(err, CoreError::ModelRequest(_)));

    let turns = orchestrator.conversation().turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0], ConversationTurn::user("What is 6 times 7?"));
    assert!(matches!(&turns[1], ConversationTurn::ToolCall(call) if call.name == "multiply"));
    assert_connection_failure(&turns[2]);
}
