//! Named webhook configurations and the header/authentication routine shared
//! by `http` steps and direct webhook invocation.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{HttpRequest, HttpTransport, NodeError};

/// Header name used by `api-key` authentication when none is configured.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// An externally callable HTTP endpoint, registered by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

fn default_method() -> String {
    "POST".to_owned()
}

/// Credential-to-header mapping for a webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Authentication {
    /// `Authorization: Basic base64(username:password)`
    Basic { credentials: BasicCredentials },
    /// `Authorization: Bearer <token>`
    Bearer { credentials: BearerCredentials },
    /// `<headerName>: <key>`
    ApiKey { credentials: ApiKeyCredentials },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BearerCredentials {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCredentials {
    #[serde(alias = "apiKey")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
}

impl Authentication {
    /// The single header this authentication contributes.
    pub fn header(&self) -> (String, String) {
        match self {
            Self::Basic { credentials } => {
                let raw = format!("{}:{}", credentials.username, credentials.password);
                ("Authorization".to_owned(), format!("Basic {}", STANDARD.encode(raw)))
            }
            Self::Bearer { credentials } => {
                ("Authorization".to_owned(), format!("Bearer {}", credentials.token))
            }
            Self::ApiKey { credentials } => (
                credentials
                    .header_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_owned()),
                credentials.key.clone(),
            ),
        }
    }
}

/// Build outgoing request headers.
///
/// Precedence, lowest first: `Content-Type: application/json`, the webhook's
/// own headers, `overrides`, then the webhook's authentication header.
/// Header names are case-insensitive: a later layer replaces an earlier
/// header whatever its casing, and the later spelling is kept.
pub fn build_headers(
    webhook: Option<&Webhook>,
    overrides: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    set_header(&mut headers, "Content-Type".to_owned(), "application/json".to_owned());

    let layers = webhook.and_then(|w| w.headers.as_ref()).into_iter().chain(overrides);
    for (name, value) in layers.flatten() {
        set_header(&mut headers, name.clone(), value.clone());
    }
    if let Some(auth) = webhook.and_then(|w| w.authentication.as_ref()) {
        let (name, value) = auth.header();
        set_header(&mut headers, name, value);
    }

    headers
}

fn set_header(headers: &mut BTreeMap<String, String>, name: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

/// Send `data` to a webhook and return the parsed JSON (or raw text) body.
pub async fn invoke(
    transport: &dyn HttpTransport,
    webhook: &Webhook,
    data: Value,
) -> Result<Value, NodeError> {
    let request = HttpRequest {
        method: webhook.method.clone(),
        url: webhook.url.clone(),
        headers: build_headers(Some(webhook), None),
        body: Some(data),
    };
    debug!(url = %request.url, method = %request.method, "invoking webhook");

    let response = transport.send(request).await?;
    Ok(response.body)
}
