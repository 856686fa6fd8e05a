//! `workflow-engine` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`    : check a workflow JSON file and print its execution order.
//! - `run`         : execute a workflow JSON file and print the execution record.
//! - `call-webhook`: invoke a named webhook from a webhooks JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{ExecutionStatus, ExecutorConfig, WorkflowDefinition, WorkflowService};
use nodes::chat::{OpenAiChatClient, OpenAiChatConfig};
use nodes::transport::{HttpClientConfig, ReqwestTransport};
use nodes::Webhook;

#[derive(Parser)]
#[command(
    name = "workflow-engine",
    about = "Run declarative step workflows with dependency ordering and retries",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow definition JSON file.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Execution input as a JSON object; overrides the workflow's variables.
        #[arg(long, default_value = "{}")]
        input: String,
        /// Cancel the execution if it is still running after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// JSON file mapping webhook names to webhook configurations.
        #[arg(long)]
        webhooks: Option<PathBuf>,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Invoke a named webhook directly.
    CallWebhook {
        name: String,
        /// JSON file mapping webhook names to webhook configurations.
        #[arg(long)]
        webhooks: PathBuf,
        /// Request payload as JSON.
        #[arg(long, default_value = "{}")]
        data: String,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
}

/// Collaborator settings shared by the commands that talk to the network.
#[derive(Args)]
struct RuntimeArgs {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[arg(long, env = "WORKFLOW_CHAT_BASE_URL", default_value = "https://api.openai.com/v1")]
    chat_base_url: String,
    #[arg(long, env = "WORKFLOW_CHAT_MODEL", default_value = "gpt-4o-mini")]
    chat_model: String,
    #[arg(long, env = "WORKFLOW_CHAT_API_KEY", hide_env_values = true)]
    chat_api_key: Option<String>,
    /// Timeout for each outbound HTTP request.
    #[arg(long, env = "WORKFLOW_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    http_timeout_secs: u64,
    /// Retry backoff base for steps whose retryConfig omits backoffMs.
    #[arg(long, env = "WORKFLOW_DEFAULT_BACKOFF_MS", default_value_t = 1000)]
    default_backoff_ms: u64,
}

impl RuntimeArgs {
    fn build_service(&self) -> Result<WorkflowService> {
        let transport = ReqwestTransport::new(&HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            ..HttpClientConfig::default()
        })?;

        let chat = OpenAiChatClient::new(OpenAiChatConfig {
            base_url: self.chat_base_url.clone(),
            model: self.chat_model.clone(),
            api_key: self.chat_api_key.clone(),
            ..OpenAiChatConfig::default()
        })?;

        let config = ExecutorConfig {
            default_backoff: Duration::from_millis(self.default_backoff_ms),
            ..ExecutorConfig::default()
        };

        Ok(WorkflowService::new(Arc::new(chat), Arc::new(transport), config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => validate(&path),
        Command::Run { path, input, timeout_ms, webhooks, runtime } => {
            run(&path, &input, timeout_ms, webhooks.as_deref(), &runtime).await
        }
        Command::CallWebhook { name, webhooks, data, runtime } => {
            let service = runtime.build_service()?;
            register_webhooks(&service, &webhooks)?;
            let data: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;

            let response = service.call_webhook(&name, data).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

fn validate(path: &Path) -> Result<()> {
    let workflow = load_workflow(path)?;

    match engine::validate(&workflow) {
        Ok((order, diagnostics)) => {
            for diagnostic in &diagnostics {
                println!("warning: {diagnostic}");
            }
            println!("✅ Workflow '{}' is valid. Execution order: {order:?}", workflow.id);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Validation failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(
    path: &Path,
    input: &str,
    timeout_ms: Option<u64>,
    webhooks: Option<&Path>,
    runtime: &RuntimeArgs,
) -> Result<()> {
    let workflow = load_workflow(path)?;
    let input: Map<String, Value> =
        serde_json::from_str(input).context("--input must be a JSON object")?;

    let service = runtime.build_service()?;
    if let Some(webhooks) = webhooks {
        register_webhooks(&service, webhooks)?;
    }

    let workflow_id = workflow.id.clone();
    service.register_workflow(workflow);

    let cancel = CancellationToken::new();
    if let Some(ms) = timeout_ms {
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            warn!("timeout of {ms}ms reached, cancelling execution");
            deadline.cancel();
        });
    }

    let execution = service
        .execute_workflow_with_cancel(&workflow_id, input, &cancel)
        .await?;
    println!("{}", serde_json::to_string_pretty(&execution)?);

    if execution.status != ExecutionStatus::Completed {
        bail!(
            "execution {} ended {}: {}",
            execution.id,
            execution.status,
            execution.error.as_deref().unwrap_or("no error recorded")
        );
    }
    Ok(())
}

fn load_workflow(path: &Path) -> Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid workflow JSON in {}", path.display()))
}

fn register_webhooks(service: &WorkflowService, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let webhooks: BTreeMap<String, Webhook> = serde_json::from_str(&content)
        .with_context(|| format!("invalid webhooks JSON in {}", path.display()))?;

    info!("registering {} webhooks from {}", webhooks.len(), path.display());
    for (name, webhook) in webhooks {
        service.register_webhook(name, webhook);
    }
    Ok(())
}
