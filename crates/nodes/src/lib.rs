//! `nodes` crate: the `StepHandler` trait, built-in step handlers, and the
//! collaborator seams (chat completion, HTTP transport) they call out to.
//!
//! Every step kind (`agent`, `http`, `transform`, `condition`, `wait`) has
//! one [`StepHandler`] implementation.  The engine crate dispatches execution
//! through this trait object and never sees the handlers' internals.

pub mod error;
pub mod traits;
pub mod template;
pub mod webhook;
pub mod transport;
pub mod chat;
pub mod handlers;
pub mod mock;

pub use error::NodeError;
pub use traits::{ExecutionContext, StepHandler, StepKind, WebhookDirectory};
pub use webhook::{Authentication, Webhook};
pub use transport::{HttpRequest, HttpResponse, HttpTransport};
pub use chat::{ChatClient, ChatMessage, ChatResponse};
pub use handlers::{default_registry, HandlerRegistry};
