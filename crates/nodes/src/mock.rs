//! Test doubles for the handler trait and its collaborators.
//!
//! Useful in unit and integration tests where a real chat provider or network
//! is either unavailable or irrelevant.  Every double records the calls it
//! receives so tests can assert on them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::chat::TokenUsage;
use crate::{
    ChatClient, ChatMessage, ChatResponse, ExecutionContext, HttpRequest, HttpResponse,
    HttpTransport, NodeError, StepHandler, Webhook, WebhookDirectory,
};

// ---------------------------------------------------------------------------
// MockNode
// ---------------------------------------------------------------------------

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Always fail with the given message.
    Fail(String),
    /// Fail the first `failures` calls, then return the value.
    FailThenReturn { failures: usize, value: Value },
}

/// A step handler that records every config it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// Variable snapshots seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<Map<String, Value>>>>,
    /// `(workflow_id, execution_id, step_id)` of every call.
    pub invocations: Arc<Mutex<Vec<(String, uuid::Uuid, String)>>>,
}

impl MockNode {
    fn with(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self::with(name, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always fails.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with(name, MockBehaviour::Fail(msg.into()))
    }

    /// Create a mock that fails `failures` times before succeeding.
    pub fn flaky(name: impl Into<String>, failures: usize, value: Value) -> Self {
        Self::with(name, MockBehaviour::FailThenReturn { failures, value })
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl StepHandler for MockNode {
    async fn execute(&self, _config: &Value, ctx: &ExecutionContext<'_>) -> Result<Value, NodeError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(ctx.variables.clone());
            calls.len()
        };
        self.invocations.lock().unwrap().push((
            ctx.workflow_id.to_owned(),
            ctx.execution_id,
            ctx.step_id.to_owned(),
        ));

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::Fail(msg) => Err(NodeError::Failed(msg.clone())),
            MockBehaviour::FailThenReturn { failures, value } => {
                if attempt <= *failures {
                    Err(NodeError::Failed(format!("{} attempt {attempt} failed", self.name)))
                } else {
                    Ok(value.clone())
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockChat
// ---------------------------------------------------------------------------

/// One recorded chat call: messages, max tokens, temperature.
pub type ChatCall = (Vec<ChatMessage>, u32, f32);

/// Chat client that answers every request with a canned reply (or error).
pub struct MockChat {
    reply: Result<String, String>,
    calls: Mutex<Vec<ChatCall>>,
}

impl MockChat {
    pub fn replying(content: impl Into<String>) -> Self {
        Self { reply: Ok(content.into()), calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self { reply: Err(msg.into()), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<ChatResponse, NodeError> {
        self.calls.lock().unwrap().push((messages.to_vec(), max_tokens, temperature));
        match &self.reply {
            Ok(content) => Ok(ChatResponse {
                content: content.clone(),
                usage: Some(TokenUsage::default()),
            }),
            Err(msg) => Err(NodeError::Chat(msg.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// HTTP transport that records requests and replays scripted responses.
///
/// Responses are consumed in order; the last one repeats once the script
/// runs out.
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn scripted(script: Vec<Result<HttpResponse, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(status: u16, body: Value) -> Self {
        Self::scripted(vec![Ok(HttpResponse { status, body })])
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::scripted(vec![Err(msg.into())])
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NodeError> {
        self.requests.lock().unwrap().push(request);

        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 { script.pop_front() } else { script.front().cloned() };
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(msg)) => Err(NodeError::Transport(msg)),
            None => Err(NodeError::Transport("mock transport has no scripted response".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// TestContext
// ---------------------------------------------------------------------------

/// In-memory webhook directory.
#[derive(Default)]
pub struct MockWebhooks(pub HashMap<String, Webhook>);

impl WebhookDirectory for MockWebhooks {
    fn webhook(&self, name: &str) -> Option<Webhook> {
        self.0.get(name).cloned()
    }
}

/// Owns the data an [`ExecutionContext`] borrows, for handler-level tests.
pub struct TestContext {
    pub variables: Map<String, Value>,
    pub webhooks: MockWebhooks,
}

impl TestContext {
    /// `variables` must be a JSON object; anything else yields an empty mapping.
    pub fn new(variables: Value) -> Self {
        let variables = match variables {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { variables, webhooks: MockWebhooks::default() }
    }

    pub fn with_webhook(mut self, name: impl Into<String>, webhook: Webhook) -> Self {
        self.webhooks.0.insert(name.into(), webhook);
        self
    }

    pub fn context(&self) -> ExecutionContext<'_> {
        ExecutionContext {
            workflow_id: "test-workflow",
            execution_id: uuid::Uuid::nil(),
            step_id: "test-step",
            variables: &self.variables,
            webhooks: &self.webhooks,
        }
    }
}
