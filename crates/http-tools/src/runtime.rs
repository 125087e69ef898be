//! Tool execution.
//!
//! The [`Dispatcher`] turns a tool name plus a flat argument bag into exactly one outbound HTTP
//! request and folds whatever happens into an [`ExecutionResult`] envelope. There is no retry and
//! no backoff: wrapped APIs are expected to be synchronous, low-latency services, and every
//! request carries a bounded timeout so an unresponsive API cannot stall the caller.

use crate::descriptor::{EndpointTarget, HttpMethod, ToolDescriptor};
use crate::error::{HttpToolsError, Result};
use crate::registry::ToolRegistry;
use crate::safety::read_body_limited;
use base64::Engine as _;
use mime::Mime;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound for one tool call (connect + response body).
    pub request_timeout: Duration,
    /// Maximum buffered response body size. `None` = unlimited.
    pub max_response_bytes: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_response_bytes: None,
        }
    }
}

/// Uniform result of a tool call.
///
/// `success` mirrors a 2xx status. Transport failures, unknown tools, and undecodable bodies
/// produce `success: false` with `error` set and no status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    #[must_use]
    pub fn from_status(status_code: u16, data: Value) -> Self {
        Self {
            success: (200..300).contains(&status_code),
            status_code: Some(status_code),
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: None,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Where a single call argument ends up in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentLocation {
    Path,
    Query,
    Body,
}

/// Classify one argument key. First match wins:
/// 1. `{key}` appears in the URL template -> path
/// 2. GET / DELETE -> query
/// 3. anything else -> JSON body field
#[must_use]
pub fn classify_argument(endpoint: &EndpointTarget, key: &str) -> ArgumentLocation {
    if endpoint.url.contains(&format!("{{{key}}}")) {
        ArgumentLocation::Path
    } else if endpoint.method.uses_query_string() {
        ArgumentLocation::Query
    } else {
        ArgumentLocation::Body
    }
}

/// The request an argument bag maps to, before it is handed to the HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParts {
    /// URL with path parameters substituted (values are inserted verbatim, not percent-encoded).
    pub url: String,
    pub query_params: Vec<(String, String)>,
    pub body: Map<String, Value>,
}

#[must_use]
pub fn build_request_parts(
    endpoint: &EndpointTarget,
    arguments: &Map<String, Value>,
) -> RequestParts {
    let mut path_params: Vec<(&str, &Value)> = Vec::new();
    let mut query_params: Vec<(String, String)> = Vec::new();
    let mut body = Map::new();

    for (key, value) in arguments {
        match classify_argument(endpoint, key) {
            ArgumentLocation::Path => path_params.push((key, value)),
            ArgumentLocation::Query => push_query_pairs(&mut query_params, key, value),
            ArgumentLocation::Body => {
                body.insert(key.clone(), value.clone());
            }
        }
    }

    // Classification always looks at the original template, so substitute afterwards.
    let mut url = endpoint.url.clone();
    for (key, value) in path_params {
        url = url.replace(&format!("{{{key}}}"), &value_to_string(value));
    }

    RequestParts {
        url,
        query_params,
        body,
    }
}

fn push_query_pairs(out: &mut Vec<(String, String)>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items.iter().filter(|v| !v.is_null()) {
                out.push((key.to_string(), value_to_string(item)));
            }
        }
        other => out.push((key.to_string(), value_to_string(other))),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Executes registered tools against their wrapped HTTP APIs.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    client: Client,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher over a shared registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(registry: Arc<ToolRegistry>, config: DispatchConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            registry,
            client,
            config,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute a tool by name.
    ///
    /// Never fails: every problem (unknown tool, unsupported method, network error, undecodable
    /// body) comes back as `success: false` with an `error` message.
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> ExecutionResult {
        let Some(tool) = self.registry.get(tool_name) else {
            tracing::warn!(tool = %tool_name, "tool call for unknown tool");
            let err = HttpToolsError::ToolNotFound(tool_name.to_string());
            return ExecutionResult::failure(err.to_string());
        };

        match self.send(&tool, arguments).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %tool.name, error = %e, "tool call failed");
                ExecutionResult::failure(e.to_string())
            }
        }
    }

    /// Issue the HTTP request for one descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported methods, invalid URLs, transport failures, oversized
    /// bodies, and JSON-typed bodies that do not parse.
    pub async fn send(
        &self,
        tool: &ToolDescriptor,
        arguments: &Map<String, Value>,
    ) -> Result<ExecutionResult> {
        let method = reqwest_method(tool.endpoint.method)?;
        let parts = build_request_parts(&tool.endpoint, arguments);
        let url = Url::parse(&parts.url)
            .map_err(|e| HttpToolsError::InvalidUrl(format!("'{}': {e}", parts.url)))?;

        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if tool.endpoint.method.uses_query_string() {
            if !parts.query_params.is_empty() {
                request = request.query(&parts.query_params);
            }
        } else {
            request = request.json(&parts.body);
        }

        tracing::debug!(
            tool = %tool.name,
            method = %tool.endpoint.method,
            query_params = parts.query_params.len(),
            body_fields = parts.body.len(),
            "dispatching tool call"
        );

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = read_body_limited(response, self.config.max_response_bytes).await?;
        let data = decode_body(&bytes, content_type.as_deref())?;

        Ok(ExecutionResult::from_status(status, data))
    }
}

fn reqwest_method(method: HttpMethod) -> Result<Method> {
    match method {
        HttpMethod::Get => Ok(Method::GET),
        HttpMethod::Post => Ok(Method::POST),
        HttpMethod::Put => Ok(Method::PUT),
        HttpMethod::Delete => Ok(Method::DELETE),
        HttpMethod::Patch => Err(HttpToolsError::UnsupportedMethod(method.to_string())),
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let Ok(m) = ct.parse::<Mime>() else {
        return false;
    };
    m.type_() == mime::APPLICATION && (m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
}

fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<Value> {
    if is_json_content_type(content_type) {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }
        return serde_json::from_slice(bytes).map_err(|e| {
            HttpToolsError::InvalidResponse(format!("body declared as JSON does not parse: {e}"))
        });
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(Value::String(s.to_string())),
        Err(_) => Ok(json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        })),
    }
}
