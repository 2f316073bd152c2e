// beech-core/src/agent_tests.rs
#![cfg(test)]

use crate::agent::ChatOrchestrator;
use crate::config::ChatLimits;
use crate::errors::{ChatError, ToolError};
use crate::models::chat::{ApiResponse, ChatMessage, Choice};
use crate::models::tools::{ToolCall, ToolDefinition, ToolFunction, ToolInput, ToolParametersDefinition};
use crate::models::transcript::{FunctionCallStatus, Role, TranscriptMessage};
use crate::providers::Provider;
use crate::tools::{ToolOutcome, ToolProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

// --- Scripted provider: answers from a queue and records every request ---
struct ScriptedProvider {
    replies: StdMutex<VecDeque<Result<ChatMessage, String>>>,
    received: StdMutex<Vec<Vec<ChatMessage>>>,
    tool_counts: StdMutex<Vec<usize>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<ChatMessage, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(replies.into()),
            received: StdMutex::new(Vec::new()),
            tool_counts: StdMutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse> {
        self.received.lock().unwrap().push(messages);
        self.tool_counts
            .lock()
            .unwrap()
            .push(tools.map(|t| t.len()).unwrap_or(0));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()))
            .map_err(|e| anyhow!(e))?;
        let finish_reason = if reply.has_tool_calls() { "tool_use" } else { "end_turn" };
        Ok(ApiResponse {
            id: "resp_1".to_string(),
            choices: vec![Choice {
                index: 0,
                message: reply,
                finish_reason: finish_reason.to_string(),
            }],
        })
    }
}

// --- Mock tool provider ---
#[derive(Default)]
struct MockTools {
    calls: StdMutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl ToolProvider for MockTools {
    fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        ["get_accounts", "get_account_metrics"]
            .iter()
            .map(|name| ToolDefinition {
                name: name.to_string(),
                description: format!("{} tool", name),
                parameters: ToolParametersDefinition::empty(),
            })
            .collect()
    }

    async fn execute_tool(&self, tool_name: &str, input: ToolInput) -> Result<ToolOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((tool_name.to_string(), input.into_value()));
        match tool_name {
            "get_accounts" => Ok(ToolOutcome::ok(
                json!([{"id": "1234567890", "name": "Acme Gas"}]),
                "Found 1 account",
            )),
            "get_account_metrics" => Ok(ToolOutcome::failure("No data found for this period")),
            other => Err(ToolError::UnknownTool(other.to_string()).into()),
        }
    }
}

struct DuplicateTools;

#[async_trait]
impl ToolProvider for DuplicateTools {
    fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        let def = ToolDefinition {
            name: "get_accounts".to_string(),
            description: "dup".to_string(),
            parameters: ToolParametersDefinition::empty(),
        };
        vec![def.clone(), def]
    }

    async fn execute_tool(&self, _tool_name: &str, _input: ToolInput) -> Result<ToolOutcome> {
        Ok(ToolOutcome::failure("unused"))
    }
}

// --- Helpers ---
fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        call_type: "function".to_string(),
        function: ToolFunction {
            name: name.to_string(),
            arguments: arguments.to_string(),
        },
    }
}

fn tool_request(text: Option<&str>, calls: Vec<ToolCall>) -> ChatMessage {
    ChatMessage {
        role: "assistant".to_string(),
        content: text.map(str::to_string),
        tool_calls: Some(calls),
        tool_call_id: None,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
}

fn limits() -> ChatLimits {
    ChatLimits::default()
}

fn orchestrator(provider: Arc<ScriptedProvider>, tools: Arc<MockTools>, limits: ChatLimits) -> ChatOrchestrator {
    ChatOrchestrator::new(provider, tools, None, limits).expect("valid orchestrator")
}

fn history(n: usize) -> Vec<TranscriptMessage> {
    (0..n)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            TranscriptMessage::new(role, format!("history {}", i))
        })
        .collect()
}

// --- Tests ---

#[tokio::test]
async fn test_plain_answer_without_tools() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let provider = ScriptedProvider::new(vec![Ok(ChatMessage::assistant("Hello! How can I help?"))]);
    let tools = Arc::new(MockTools::default());
    let orch = orchestrator(provider.clone(), tools.clone(), limits());

    let reply = orch.respond_on("hi", &[], today()).await.unwrap();

    assert_eq!(reply.message, "Hello! How can I help?");
    assert!(reply.function_calls.is_empty());
    assert_eq!(reply.stop_reason.as_deref(), Some("end_turn"));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[0][0].role, "system");
    assert!(requests[0][0].content.as_deref().unwrap().contains("Today's date: 7/3/2025"));
    assert_eq!(requests[0][1], ChatMessage::user("hi"));
    assert_eq!(*provider.tool_counts.lock().unwrap(), vec![2]);
}

#[tokio::test]
async fn test_tool_round_feeds_result_back() {
    let provider = ScriptedProvider::new(vec![
        Ok(tool_request(Some("Let me check."), vec![tool_call("call_1", "get_accounts", "{}")])),
        Ok(ChatMessage::assistant("You have one account: Acme Gas.")),
    ]);
    let tools = Arc::new(MockTools::default());
    let orch = orchestrator(provider.clone(), tools.clone(), limits());

    let reply = orch.respond_on("list my accounts", &[], today()).await.unwrap();

    assert_eq!(reply.message, "You have one account: Acme Gas.");
    assert_eq!(reply.function_calls.len(), 1);
    let call = &reply.function_calls[0];
    assert_eq!(call.name, "get_accounts");
    assert_eq!(call.status, FunctionCallStatus::Success);
    assert_eq!(call.result.as_ref().unwrap()["data"][0]["name"], "Acme Gas");

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second.len(), 4);
    assert!(second[2].has_tool_calls());
    assert_eq!(second[3].role, "tool");
    assert_eq!(second[3].tool_call_id.as_deref(), Some("call_1"));
    let tool_result: serde_json::Value = serde_json::from_str(second[3].content.as_deref().unwrap()).unwrap();
    assert_eq!(tool_result["success"], true);
    assert_eq!(tool_result["message"], "Found 1 account");
}

#[tokio::test]
async fn test_multiple_calls_run_in_order() {
    let provider = ScriptedProvider::new(vec![
        Ok(tool_request(
            None,
            vec![
                tool_call("call_1", "get_accounts", "{}"),
                tool_call("call_2", "get_account_metrics", r#"{"customerId": "1234567890"}"#),
            ],
        )),
        Ok(ChatMessage::assistant("Done.")),
    ]);
    let tools = Arc::new(MockTools::default());
    let orch = orchestrator(provider.clone(), tools.clone(), limits());

    let reply = orch.respond_on("metrics please", &[], today()).await.unwrap();

    let names: Vec<String> = tools.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(names, vec!["get_accounts", "get_account_metrics"]);
    assert_eq!(reply.function_calls[1].status, FunctionCallStatus::Error);
    assert_eq!(reply.function_calls[1].arguments, json!({"customerId": "1234567890"}));

    let second = &provider.requests()[1];
    let tool_ids: Vec<_> = second
        .iter()
        .filter(|m| m.role == "tool")
        .map(|m| m.tool_call_id.clone().unwrap())
        .collect();
    assert_eq!(tool_ids, vec!["call_1", "call_2"]);
}

#[tokio::test]
async fn test_tool_errors_do_not_abort_turn() {
    let provider = ScriptedProvider::new(vec![
        Ok(tool_request(
            None,
            vec![
                tool_call("call_1", "delete_everything", "{}"),
                tool_call("call_2", "get_accounts", "{not json"),
            ],
        )),
        Ok(ChatMessage::assistant("Sorry, I couldn't do that.")),
    ]);
    let tools = Arc::new(MockTools::default());
    let orch = orchestrator(provider.clone(), tools.clone(), limits());

    let reply = orch.respond_on("go", &[], today()).await.unwrap();

    assert_eq!(reply.message, "Sorry, I couldn't do that.");
    assert_eq!(reply.function_calls.len(), 2);
    assert!(reply
        .function_calls
        .iter()
        .all(|c| c.status == FunctionCallStatus::Error));
    let unknown = reply.function_calls[0].result.as_ref().unwrap();
    assert_eq!(unknown["success"], false);
    assert_eq!(unknown["message"], "Error: Unknown function: delete_everything");
    assert_eq!(reply.function_calls[1].arguments, json!("{not json"));

    // The malformed call never reached the tool provider.
    assert_eq!(tools.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_same_input_produces_same_requests() {
    let script = || {
        vec![
            Ok(tool_request(None, vec![tool_call("call_1", "get_accounts", "{}")])),
            Ok(ChatMessage::assistant("One account.")),
        ]
    };
    let tools = Arc::new(MockTools::default());
    let first = ScriptedProvider::new(script());
    let second = ScriptedProvider::new(script());
    let history = history(4);

    let a = orchestrator(first.clone(), tools.clone(), limits())
        .respond_on("accounts?", &history, today())
        .await
        .unwrap();

    let orch = orchestrator(second.clone(), tools.clone(), limits());
    let b = orch.respond_on("accounts?", &history, today()).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(first.requests(), second.requests());
}

#[tokio::test]
async fn test_orchestrator_is_reusable_across_turns() {
    let provider = ScriptedProvider::new(vec![
        Ok(ChatMessage::assistant("First.")),
        Ok(ChatMessage::assistant("Second.")),
    ]);
    let orch = orchestrator(provider.clone(), Arc::new(MockTools::default()), limits());

    orch.respond_on("same", &[], today()).await.unwrap();
    orch.respond_on("same", &[], today()).await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), Arc::new(MockTools::default()), limits());

    let err = orch.respond_on("   \n", &[], today()).await.unwrap_err();

    assert!(matches!(err, ChatError::EmptyMessage));
    assert!(err.is_client_error());
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_reply_without_text_is_no_response() {
    let provider = ScriptedProvider::new(vec![Ok(ChatMessage {
        role: "assistant".to_string(),
        content: Some("  ".to_string()),
        ..Default::default()
    })]);
    let orch = orchestrator(provider, Arc::new(MockTools::default()), limits());

    let err = orch.respond_on("hi", &[], today()).await.unwrap_err();
    assert!(matches!(err, ChatError::NoResponse));
}

#[tokio::test]
async fn test_provider_error_is_api_error() {
    let provider = ScriptedProvider::new(vec![Err("overloaded".to_string())]);
    let orch = orchestrator(provider, Arc::new(MockTools::default()), limits());

    let err = orch.respond_on("hi", &[], today()).await.unwrap_err();
    assert!(matches!(err, ChatError::Api(_)));
    assert!(!err.is_client_error());
    assert!(err.to_string().contains("overloaded"));
}

#[tokio::test]
async fn test_iteration_bound_returns_latest_text() {
    let replies = (0..6)
        .map(|i| {
            let text = format!("Still working {}", i);
            Ok(tool_request(Some(&text), vec![tool_call(&format!("call_{}", i), "get_accounts", "{}")]))
        })
        .collect();
    let provider = ScriptedProvider::new(replies);
    let tools = Arc::new(MockTools::default());
    let bounded = ChatLimits {
        max_iterations: 3,
        ..ChatLimits::default()
    };
    let orch = orchestrator(provider.clone(), tools.clone(), bounded);

    let reply = orch.respond_on("loop", &[], today()).await.unwrap();

    // Three tool rounds, each followed by a model call. Tools requested by
    // the final call are never run.
    let requests = provider.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[3].last().unwrap().role, "tool");
    assert_eq!(tools.calls.lock().unwrap().len(), 3);
    assert_eq!(reply.message, "Still working 3");
    assert_eq!(reply.function_calls.len(), 3);
    assert_eq!(reply.stop_reason.as_deref(), Some("tool_use"));
}

#[tokio::test]
async fn test_single_tool_round_gets_follow_up_call() {
    let provider = ScriptedProvider::new(vec![
        Ok(tool_request(None, vec![tool_call("call_1", "get_accounts", "{}")])),
        Ok(ChatMessage::assistant("You have one account.")),
    ]);
    let tools = Arc::new(MockTools::default());
    let bounded = ChatLimits {
        max_iterations: 1,
        ..ChatLimits::default()
    };
    let orch = orchestrator(provider.clone(), tools.clone(), bounded);

    let reply = orch.respond_on("How many accounts?", &[], today()).await.unwrap();

    assert_eq!(provider.requests().len(), 2);
    assert_eq!(tools.calls.lock().unwrap().len(), 1);
    assert_eq!(reply.message, "You have one account.");
    assert_eq!(reply.function_calls.len(), 1);
    assert_eq!(reply.function_calls[0].status, FunctionCallStatus::Success);
}

#[tokio::test]
async fn test_iteration_bound_without_text_is_no_response() {
    let replies = (0..3)
        .map(|i| Ok(tool_request(None, vec![tool_call(&format!("call_{}", i), "get_accounts", "{}")])))
        .collect();
    let provider = ScriptedProvider::new(replies);
    let tools = Arc::new(MockTools::default());
    let bounded = ChatLimits {
        max_iterations: 2,
        ..ChatLimits::default()
    };
    let orch = orchestrator(provider, tools.clone(), bounded);

    let err = orch.respond_on("loop", &[], today()).await.unwrap_err();
    assert!(matches!(err, ChatError::NoResponse));
    assert_eq!(tools.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_history_is_windowed() {
    let provider = ScriptedProvider::new(vec![Ok(ChatMessage::assistant("ok"))]);
    let windowed = ChatLimits {
        history_window: 3,
        ..ChatLimits::default()
    };
    let orch = orchestrator(provider.clone(), Arc::new(MockTools::default()), windowed);
    let mut history = history(6);
    history.push(TranscriptMessage::new(Role::Assistant, ""));

    orch.respond_on("next", &history, today()).await.unwrap();

    let sent = &provider.requests()[0];
    let contents: Vec<&str> = sent[1..]
        .iter()
        .map(|m| m.content.as_deref().unwrap())
        .collect();
    // The empty trailing message counts towards the window but is not sent.
    assert_eq!(contents, vec!["history 4", "history 5", "next"]);
    assert_eq!(sent[1].role, "user");
    assert_eq!(sent[2].role, "assistant");
}

#[tokio::test]
async fn test_system_prompt_override() {
    let provider = ScriptedProvider::new(vec![Ok(ChatMessage::assistant("ok"))]);
    let orch = ChatOrchestrator::new(
        provider.clone(),
        Arc::new(MockTools::default()),
        Some("Terse assistant. Date {today}.".to_string()),
        limits(),
    )
    .unwrap();

    orch.respond_on("hi", &[], today()).await.unwrap();

    assert_eq!(
        provider.requests()[0][0],
        ChatMessage::system("Terse assistant. Date 7/3/2025.")
    );
}

#[test]
fn test_construction_rejects_bad_setup() {
    let provider = ScriptedProvider::new(vec![]);
    let err = ChatOrchestrator::new(provider.clone(), Arc::new(DuplicateTools), None, limits())
        .err()
        .unwrap();
    assert!(matches!(err, ChatError::Tool(_)));

    let zero = ChatLimits {
        max_iterations: 0,
        ..ChatLimits::default()
    };
    let err = ChatOrchestrator::new(provider, Arc::new(MockTools::default()), None, zero)
        .err()
        .unwrap();
    assert!(matches!(err, ChatError::Config(_)));
}
