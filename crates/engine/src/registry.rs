//! Workflow registry: named workflow definitions and named webhooks.
//!
//! Both maps are shared by every in-flight execution, so they live in
//! `DashMap`s rather than behind the executor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

use nodes::{Webhook, WebhookDirectory};

use crate::models::WorkflowDefinition;

struct Registered {
    /// Position of the first registration under this ID.
    seq: u64,
    definition: Arc<WorkflowDefinition>,
}

#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: DashMap<String, Registered>,
    webhooks: DashMap<String, Webhook>,
    next_seq: AtomicU64,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition under its ID.  Re-registering an ID replaces the
    /// definition but keeps its position in [`list`](Self::list).
    pub fn register(&self, definition: WorkflowDefinition) {
        let id = definition.id.clone();
        let definition = Arc::new(definition);

        match self.workflows.entry(id) {
            Entry::Occupied(mut slot) => {
                warn!(workflow_id = %slot.key(), "overwriting existing workflow registration");
                slot.get_mut().definition = definition;
            }
            Entry::Vacant(slot) => {
                info!(workflow_id = %slot.key(), steps = definition.steps.len(), "workflow registered");
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Registered { seq, definition });
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.get(id).map(|r| Arc::clone(&r.definition))
    }

    /// All definitions, in first-registration order.
    pub fn list(&self) -> Vec<Arc<WorkflowDefinition>> {
        let mut entries: Vec<(u64, Arc<WorkflowDefinition>)> = self
            .workflows
            .iter()
            .map(|r| (r.seq, Arc::clone(&r.definition)))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, d)| d).collect()
    }

    pub fn register_webhook(&self, name: impl Into<String>, webhook: Webhook) {
        let name = name.into();
        info!(webhook = %name, url = %webhook.url, "webhook registered");
        self.webhooks.insert(name, webhook);
    }

    /// All webhooks, sorted by name.
    pub fn list_webhooks(&self) -> Vec<(String, Webhook)> {
        let mut hooks: Vec<(String, Webhook)> = self
            .webhooks
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        hooks.sort_by(|a, b| a.0.cmp(&b.0));
        hooks
    }
}

impl WebhookDirectory for WorkflowRegistry {
    fn webhook(&self, name: &str) -> Option<Webhook> {
        self.webhooks.get(name).map(|r| r.value().clone())
    }
}
