//! Test helpers: a mock wrapped API served in-process and readiness polling.
//!
//! The mock mirrors the calculator service used to exercise tool dispatch end to end, plus a few
//! diagnostic routes:
//! - `POST /calculate/{add|subtract|multiply|divide}` with `{"a": .., "b": ..}`
//! - `ANY /echo/{*path}` echoes method, path, query, content type, and JSON body
//! - `GET /text` returns a `text/plain` body
//! - `ANY /slow` sleeps for five seconds before answering
//! - `GET /openapi.yaml` serves the calculator spec pointing back at this server

use anyhow::Context as _;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::net::TcpListener;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A mock API bound to an ephemeral localhost port. Shuts down on drop.
pub struct MockApi {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    _server: JoinHandle<()>,
}

impl MockApi {
    /// Start the mock API and wait until `/health` answers.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server does not become healthy in time.
    pub async fn spawn() -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock api")?;
        let addr = listener.local_addr().context("mock api local_addr")?;
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, router()).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(10)).await?;

        Ok(Self {
            base_url,
            shutdown: Some(shutdown_tx),
            _server: handle,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path on the mock API.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/calculate/{op}", post(calculate))
        .route("/echo/{*path}", any(echo))
        .route("/text", get(text))
        .route("/slow", any(slow))
        .route("/openapi.yaml", get(openapi_yaml))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "Calculator API"}))
}

async fn calculate(Path(op): Path<String>, body: Bytes) -> (StatusCode, Json<Value>) {
    let input: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let (Some(a), Some(b)) = (input.get("a"), input.get("b")) else {
        return bad_request("Missing parameters a and b");
    };
    let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
        return bad_request("Parameters a and b must be numbers");
    };

    let (symbol, result) = match op.as_str() {
        "add" => ("+", a + b),
        "subtract" => ("-", a - b),
        "multiply" => ("*", a * b),
        "divide" if b == 0.0 => return bad_request("Division by zero is not allowed"),
        "divide" => ("/", a / b),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("Unknown operation: {op}")})),
            );
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "operation": op,
            "a": a,
            "b": b,
            "result": result,
            "expression": format!("{a} {symbol} {b} = {result}"),
        })),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query().unwrap_or(""),
        "contentType": content_type,
        "body": body,
    }))
}

/// Serves [`calculator_spec_yaml`] with the server URL taken from the request's `Host`.
async fn openapi_yaml(headers: HeaderMap) -> (StatusCode, String) {
    let Some(host) = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "missing Host header".to_string());
    };
    (StatusCode::OK, calculator_spec_yaml(&format!("http://{host}")))
}

async fn text() -> &'static str {
    "plain response"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({"slow": true}))
}

/// `OpenAPI` document for the calculator served by [`MockApi`].
///
/// All four arithmetic operations carry `x-ai-tool`; `/health` does not.
#[must_use]
pub fn calculator_spec_yaml(base_url: &str) -> String {
    let mut spec = format!(
        r#"openapi: 3.0.0
info:
  title: Calculator API
  version: 1.0.0
  description: Basic arithmetic
servers:
  - url: {base_url}
paths:
  /health:
    get:
      summary: Health check
      responses:
        "200":
          description: ok
"#
    );
    for (op, description) in [
        ("add", "Add two numbers"),
        ("subtract", "Subtract b from a"),
        ("multiply", "Multiply two numbers"),
        ("divide", "Divide a by b"),
    ] {
        spec.push_str(&format!(
            r#"  /calculate/{op}:
    post:
      summary: {op}
      x-ai-tool: true
      x-ai-description: {description}
      x-ai-category: math
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [a, b]
              properties:
                a: {{ type: number }}
                b: {{ type: number }}
      responses:
        200:
          description: ok
        400:
          description: invalid input
"#
        ));
    }
    spec
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails or if the bound socket's
/// local address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status (2xx/3xx).
///
/// # Errors
///
/// Returns an error if the timeout elapses before the endpoint returns a success status.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
}
