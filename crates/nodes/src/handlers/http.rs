use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::parse_config;
use crate::template::interpolate;
use crate::webhook::build_headers;
use crate::{ExecutionContext, HttpRequest, HttpTransport, NodeError, StepHandler, WebhookDirectory};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpStepConfig {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    webhook_name: Option<String>,
}

/// Issues an HTTP request and returns the parsed response body.
pub struct HttpHandler {
    transport: Arc<dyn HttpTransport>,
}

impl HttpHandler {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StepHandler for HttpHandler {
    async fn execute(&self, config: &Value, ctx: &ExecutionContext<'_>) -> Result<Value, NodeError> {
        let config: HttpStepConfig = parse_config(config)?;

        let url = interpolate(&config.url, ctx.variables);

        // The body is interpolated in its serialized form so placeholders
        // inside nested strings are substituted too.
        let body = match &config.body {
            Some(body) => {
                let raw = serde_json::to_string(body)
                    .map_err(|e| NodeError::InvalidConfig(format!("unserializable body: {e}")))?;
                let resolved = interpolate(&raw, ctx.variables);
                let parsed = serde_json::from_str(&resolved).map_err(|e| {
                    NodeError::InvalidConfig(format!("body is not valid JSON after interpolation: {e}"))
                })?;
                Some(parsed)
            }
            None => None,
        };

        let webhook = match config.webhook_name.as_deref() {
            Some(name) => {
                let found = ctx.webhooks.webhook(name);
                if found.is_none() {
                    warn!(
                        execution_id = %ctx.execution_id,
                        step_id = ctx.step_id,
                        webhook = name,
                        "http step references unknown webhook"
                    );
                }
                found
            }
            None => None,
        };

        let request = HttpRequest {
            method: config.method.unwrap_or_else(|| "POST".to_owned()),
            url,
            headers: build_headers(webhook.as_ref(), config.headers.as_ref()),
            body,
        };
        debug!(
            workflow_id = ctx.workflow_id,
            execution_id = %ctx.execution_id,
            step_id = ctx.step_id,
            method = %request.method,
            url = %request.url,
            "sending http step request"
        );

        let response = self.transport.send(request).await?;
        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, TestContext};
    use crate::webhook::{Authentication, BasicCredentials};
    use crate::Webhook;
    use serde_json::json;

    #[tokio::test]
    async fn interpolates_url_and_body() {
        let transport = Arc::new(MockTransport::responding(200, json!({ "id": 7 })));
        let handler = HttpHandler::new(transport.clone());
        let ctx = TestContext::new(json!({ "user": "ann", "city": "Oslo" }));

        let out = handler
            .execute(
                &json!({
                    "url": "https://api.example.test/users/{{user}}",
                    "body": { "where": { "city": "{{city}}" } }
                }),
                &ctx.context(),
            )
            .await
            .unwrap();

        assert_eq!(out, json!({ "id": 7 }));
        let requests = transport.requests();
        let sent = &requests[0];
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.url, "https://api.example.test/users/ann");
        assert_eq!(sent.body, Some(json!({ "where": { "city": "Oslo" } })));
        assert_eq!(sent.headers["Content-Type"], "application/json");
    }

    #[tokio::test]
    async fn merges_webhook_headers_and_basic_auth() {
        let transport = Arc::new(MockTransport::responding(200, json!("ok")));
        let handler = HttpHandler::new(transport.clone());
        let ctx = TestContext::new(json!({})).with_webhook(
            "crm",
            Webhook {
                url: "https://crm.example.test".into(),
                method: "POST".into(),
                headers: Some(BTreeMap::from([("X-Tenant".to_owned(), "acme".to_owned())])),
                authentication: Some(Authentication::Basic {
                    credentials: BasicCredentials { username: "user".into(), password: "pass".into() },
                }),
            },
        );

        handler
            .execute(
                &json!({
                    "url": "https://crm.example.test/leads",
                    "method": "GET",
                    "webhookName": "crm",
                    "headers": { "X-Trace": "1" }
                }),
                &ctx.context(),
            )
            .await
            .unwrap();

        let requests = transport.requests();
        let sent = &requests[0];
        assert_eq!(sent.method, "GET");
        assert_eq!(sent.body, None);
        assert_eq!(sent.headers["X-Tenant"], "acme");
        assert_eq!(sent.headers["X-Trace"], "1");
        assert_eq!(sent.headers["Authorization"], "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn unknown_webhook_is_ignored() {
        let transport = Arc::new(MockTransport::responding(200, json!(null)));
        let handler = HttpHandler::new(transport.clone());
        let ctx = TestContext::new(json!({}));

        handler
            .execute(&json!({ "url": "https://x.test", "webhookName": "nope" }), &ctx.context())
            .await
            .unwrap();

        assert!(!transport.requests()[0].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn transport_errors_fail_the_step() {
        let handler = HttpHandler::new(Arc::new(MockTransport::failing("connection refused")));
        let ctx = TestContext::new(json!({}));

        let err = handler
            .execute(&json!({ "url": "https://x.test" }), &ctx.context())
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Transport("connection refused".into()));
    }
}
