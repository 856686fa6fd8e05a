//! `engine` crate: workflow models, dependency resolution, the retry
//! controller, the in-memory registry and execution store, and the execution
//! engine that ties them together.

pub mod models;
pub mod error;
pub mod dag;
mod retry;
pub mod registry;
pub mod store;
pub mod executor;
pub mod service;

pub use models::{
    ExecutionStatus, RetryConfig, StepKind, StepResult, StepStatus, Trigger, TriggerKind,
    WorkflowDefinition, WorkflowExecution, WorkflowStep,
};
pub use error::EngineError;
pub use dag::{resolve_order, validate, Diagnostic};
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use registry::WorkflowRegistry;
pub use store::ExecutionStore;
pub use service::WorkflowService;

/// Error recorded on a step skipped because a dependency did not complete.
pub const DEPENDENCIES_NOT_MET: &str = "Dependencies not met";

/// Error recorded on an execution aborted through its cancellation token.
pub const EXECUTION_CANCELLED: &str = "execution cancelled";

#[cfg(test)]
mod executor_tests;
