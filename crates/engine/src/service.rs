//! The host-facing surface: workflow and webhook registration, execution,
//! and execution lookup, all behind one handle.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use nodes::{default_registry, webhook, ChatClient, HandlerRegistry, HttpTransport, Webhook, WebhookDirectory};

use crate::executor::{ExecutorConfig, WorkflowExecutor};
use crate::models::{WorkflowDefinition, WorkflowExecution};
use crate::registry::WorkflowRegistry;
use crate::store::ExecutionStore;
use crate::EngineError;

pub struct WorkflowService {
    registry: Arc<WorkflowRegistry>,
    store: Arc<ExecutionStore>,
    executor: WorkflowExecutor,
    transport: Arc<dyn HttpTransport>,
}

impl WorkflowService {
    /// Service with the built-in handlers wired to `chat` and `transport`.
    pub fn new(
        chat: Arc<dyn ChatClient>,
        transport: Arc<dyn HttpTransport>,
        config: ExecutorConfig,
    ) -> Self {
        let handlers = default_registry(chat, Arc::clone(&transport));
        Self::with_handlers(handlers, transport, config)
    }

    /// Service with a caller-supplied handler registry.
    pub fn with_handlers(
        handlers: HandlerRegistry,
        transport: Arc<dyn HttpTransport>,
        config: ExecutorConfig,
    ) -> Self {
        let registry = Arc::new(WorkflowRegistry::new());
        let store = Arc::new(ExecutionStore::new());
        let executor = WorkflowExecutor::new(Arc::clone(&registry), Arc::clone(&store), handlers, config);
        Self { registry, store, executor, transport }
    }

    // ------ Workflows ------

    pub fn register_workflow(&self, definition: WorkflowDefinition) {
        self.registry.register(definition);
    }

    pub fn list_workflows(&self) -> Vec<Arc<WorkflowDefinition>> {
        self.registry.list()
    }

    pub fn get_workflow(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.registry.get(id)
    }

    // ------ Executions ------

    pub async fn execute_workflow(
        &self,
        id: &str,
        input: Map<String, Value>,
    ) -> Result<WorkflowExecution, EngineError> {
        self.executor.execute(id, input).await
    }

    pub async fn execute_workflow_with_cancel(
        &self,
        id: &str,
        input: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowExecution, EngineError> {
        self.executor.execute_with_cancel(id, input, cancel).await
    }

    pub fn get_execution(&self, id: Uuid) -> Option<WorkflowExecution> {
        self.store.get(id)
    }

    /// Newest first, capped at the configured list limit.
    pub fn list_executions(&self, workflow_id: Option<&str>) -> Vec<WorkflowExecution> {
        self.store.list(workflow_id, self.executor.config().list_limit)
    }

    // ------ Webhooks ------

    pub fn register_webhook(&self, name: impl Into<String>, webhook: Webhook) {
        self.registry.register_webhook(name, webhook);
    }

    pub fn get_webhook(&self, name: &str) -> Option<Webhook> {
        self.registry.webhook(name)
    }

    pub fn list_webhooks(&self) -> Vec<(String, Webhook)> {
        self.registry.list_webhooks()
    }

    /// Send `data` to a named webhook and return its parsed response body.
    ///
    /// # Errors
    /// - [`EngineError::WebhookNotFound`] if no webhook has that name.
    /// - [`EngineError::Node`] if the request could not be completed.
    #[instrument(skip(self, data))]
    pub async fn call_webhook(&self, name: &str, data: Value) -> Result<Value, EngineError> {
        let hook = self
            .registry
            .webhook(name)
            .ok_or_else(|| EngineError::WebhookNotFound(name.to_owned()))?;

        let response = webhook::invoke(self.transport.as_ref(), &hook, data).await?;
        info!(webhook = name, "webhook call completed");
        Ok(response)
    }
}
