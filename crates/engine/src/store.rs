//! In-memory execution store.  Records are never evicted automatically.

use dashmap::DashMap;
use uuid::Uuid;

use crate::models::WorkflowExecution;

#[derive(Default)]
pub struct ExecutionStore {
    executions: DashMap<Uuid, WorkflowExecution>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot of an execution.
    pub fn save(&self, execution: &WorkflowExecution) {
        self.executions.insert(execution.id, execution.clone());
    }

    pub fn get(&self, id: Uuid) -> Option<WorkflowExecution> {
        self.executions.get(&id).map(|r| r.value().clone())
    }

    /// Most recent executions first, optionally for one workflow, at most `limit`.
    pub fn list(&self, workflow_id: Option<&str>, limit: usize) -> Vec<WorkflowExecution> {
        let mut executions: Vec<WorkflowExecution> = self
            .executions
            .iter()
            .filter(|r| workflow_id.map_or(true, |id| r.workflow_id == id))
            .map(|r| r.value().clone())
            .collect();

        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id)));
        executions.truncate(limit);
        executions
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}
