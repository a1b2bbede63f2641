//! Blocking JSON-over-HTTP transport shared by the REST adapters.
//!
//! Every HTTP status comes back as `Ok(HttpResponse)`; adapters decide which
//! statuses mean "absent" or "already exists". Only transport failures
//! (refused, DNS, timeout) map to `VectorDbError::Unavailable`.

use serde_json::Value;
use std::time::Duration;
use veclayer_core::{VectorDbError, VectorDbResult};

/// A decoded HTTP answer.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed body; `Value::Null` for an empty body
    pub body: Value,
}

impl HttpResponse {
    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort error text from the body.
    ///
    /// Qdrant reports `{"status": {"error": ..}}`, Chroma `{"error", "message"}`,
    /// Milvus `{"message"}`, OpenSearch `{"error": {"type", "reason"}}`.
    pub fn error_message(&self) -> String {
        let candidates = [
            self.body.pointer("/status/error"),
            self.body.pointer("/error/reason"),
            self.body.get("message"),
            self.body.get("error"),
            self.body.get("detail"),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.body.to_string())
    }

    /// Body of a 2xx answer, or a `Backend` error carrying the status.
    pub fn into_success(self, backend: &'static str) -> VectorDbResult<Value> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(VectorDbError::backend(
                backend,
                self.status.to_string(),
                self.error_message(),
            ))
        }
    }
}

/// Pooled blocking client bound to one base URL.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    headers: Vec<(String, String)>,
    backend: &'static str,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport. `timeout` bounds each whole request.
    pub fn new(backend: &'static str, base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        HttpTransport {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: Vec::new(),
            backend,
        }
    }

    /// Attach a header to every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET path`
    pub fn get(&self, path: &str) -> VectorDbResult<HttpResponse> {
        self.send("GET", path, None)
    }

    /// `DELETE path`
    pub fn delete(&self, path: &str) -> VectorDbResult<HttpResponse> {
        self.send("DELETE", path, None)
    }

    /// `POST path` with a JSON body
    pub fn post(&self, path: &str, body: &Value) -> VectorDbResult<HttpResponse> {
        self.send("POST", path, Some(body))
    }

    /// `PUT path` with a JSON body
    pub fn put(&self, path: &str, body: &Value) -> VectorDbResult<HttpResponse> {
        self.send("PUT", path, Some(body))
    }

    /// `POST path` with a newline-delimited JSON body, one value per line.
    pub fn post_ndjson(&self, path: &str, lines: &[Value]) -> VectorDbResult<HttpResponse> {
        let mut text = String::new();
        for line in lines {
            text.push_str(&line.to_string());
            text.push('\n');
        }
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(
            backend = self.backend,
            method = "POST",
            %url,
            lines = lines.len(),
            "http request"
        );
        let request = self
            .request("POST", &url)
            .set("Content-Type", "application/x-ndjson");
        self.finish(request.send_string(&text))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let mut request = self.agent.request(method, url);
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }
        request
    }

    fn send(&self, method: &str, path: &str, body: Option<&Value>) -> VectorDbResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(backend = self.backend, method, %url, "http request");

        let request = self.request(method, &url);
        let result = match body {
            Some(json) => request.send_json(json.clone()),
            None => request.call(),
        };
        self.finish(result)
    }

    fn finish(
        &self,
        result: Result<ureq::Response, ureq::Error>,
    ) -> VectorDbResult<HttpResponse> {
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(t)) => {
                return Err(VectorDbError::unavailable(self.backend, t.to_string()));
            }
        };

        let status = response.status();
        let text = response
            .into_string()
            .map_err(|e| VectorDbError::unavailable(self.backend, e.to_string()))?;
        Ok(HttpResponse {
            status,
            body: parse_body(&text),
        })
    }
}

/// Parse a response body; non-JSON text is kept as a JSON string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
