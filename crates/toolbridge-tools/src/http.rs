//! HTTP access to the target API.
//!
//! [`ApiClient`] is the one HTTP session for the target API, built once at
//! startup and shared by the document fetch and every operation tool.
//! [`HttpOperationTool`] binds an extracted operation to that session.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::{Map, Value};

use toolbridge_common::Tool;

use crate::ToolImplementation;
use crate::error::{SchemaError, ToolInvocationError};
use crate::openapi::{ExtractedOperation, OpenApiDocument, extract};

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default total request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Well-known location of the OpenAPI document.
pub const OPENAPI_PATH: &str = "/openapi.json";

const BODY_EXCERPT_CHARS: usize = 300;

/// HTTP session for the target API.
///
/// Cheaply cloneable; clones share the underlying connection pool. No retry
/// layer: a failed call is reported once and the model decides what to do.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for `base_url` with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL or the HTTP client
    /// fails to build.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL or the HTTP client
    /// fails to build.
    pub fn with_timeouts(base_url: &str, connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).with_context(|| format!("invalid API base URL '{base_url}'"))?;

        let inner = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { inner, base_url })
    }

    /// The base URL all paths are joined onto.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins an API path onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetches and parses the API's OpenAPI document.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::DocumentFetch`] on transport failure
    /// - [`SchemaError::DocumentStatus`] on a non-2xx status
    /// - [`SchemaError::InvalidDocument`] if the body is not a JSON document
    pub async fn fetch_document(&self) -> Result<OpenApiDocument, SchemaError> {
        let url = self.endpoint(OPENAPI_PATH);
        debug!("GET {url}");

        let response = self
            .inner
            .get(&url)
            .send()
            .await
            .map_err(|source| SchemaError::DocumentFetch {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SchemaError::DocumentStatus {
                url,
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|source| SchemaError::DocumentFetch { url, source })?;
        OpenApiDocument::from_json(&text)
    }

    /// POSTs to `path` and parses the JSON response.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolInvocationError`] for transport failures, non-2xx
    /// statuses and non-JSON bodies.
    pub async fn post(
        &self,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ToolInvocationError> {
        let url = self.endpoint(path);
        reqwest::Url::parse(&url).map_err(|e| ToolInvocationError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let mut request = self.inner.post(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("POST {url} query={query:?} body={body:?}");
        let response = request
            .send()
            .await
            .map_err(|source| ToolInvocationError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ToolInvocationError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(ToolInvocationError::Status {
                url,
                status: status.as_u16(),
                body: excerpt(&text),
            });
        }

        serde_json::from_str(&text).map_err(|source| ToolInvocationError::InvalidBody { url, source })
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    short.push_str("...");
    short
}

/// Renders an argument for the query string.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A tool backed by one POST operation of the target API.
#[derive(Debug, Clone)]
pub struct HttpOperationTool {
    definition: Tool,
    path: String,
    query_params: BTreeSet<String>,
    has_body: bool,
    api: ApiClient,
}

impl HttpOperationTool {
    /// Binds an extracted operation to an API session.
    #[must_use]
    pub fn new(operation: ExtractedOperation, api: ApiClient) -> Self {
        Self {
            definition: operation.tool,
            path: operation.path,
            query_params: operation.query_params,
            has_body: operation.has_body,
            api,
        }
    }

    /// The API path this tool posts to.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Splits arguments into query pairs and an optional JSON body.
    fn route(&self, args: &Map<String, Value>) -> (Vec<(String, String)>, Option<Value>) {
        let mut query = Vec::new();
        let mut body = Map::new();

        for (name, value) in args {
            if self.query_params.contains(name) {
                query.push((name.clone(), query_value(value)));
            } else if self.has_body {
                body.insert(name.clone(), value.clone());
            } else {
                warn!(
                    "Ignoring argument '{name}' for tool '{}': not a declared parameter",
                    self.definition.name()
                );
            }
        }

        (query, self.has_body.then_some(Value::Object(body)))
    }
}

#[async_trait]
impl ToolImplementation for HttpOperationTool {
    fn get_definition(&self) -> Tool {
        self.definition.clone()
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolInvocationError> {
        let (query, body) = self.route(args);
        self.api.post(&self.path, &query, body.as_ref()).await
    }
}

/// Fetches the API's document and binds every POST operation as a tool.
///
/// # Errors
///
/// Any [`SchemaError`]; a partial tool set is never returned.
pub async fn discover_tools(api: &ApiClient) -> Result<Vec<HttpOperationTool>, SchemaError> {
    let document = api.fetch_document().await?;
    let operations = extract(&document)?;
    info!(
        "Discovered {} tool(s) from {}",
        operations.len(),
        api.endpoint(OPENAPI_PATH)
    );
    Ok(operations
        .into_iter()
        .map(|op| HttpOperationTool::new(op, api.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn openapi_document() -> Value {
        json!({
            "openapi": "3.1.0",
            "info": {"title": "FastAPI", "version": "0.1.0"},
            "paths": {
                "/multiply": {
                    "post": {
                        "summary": "Get Multiplication",
                        "parameters": [
                            {"name": "a", "in": "query", "required": true, "schema": {"type": "number", "title": "A"}},
                            {"name": "b", "in": "query", "required": true, "schema": {"type": "number", "title": "B"}}
                        ]
                    }
                },
                "/sum": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {"schema": {"$ref": "#/components/schemas/SumRequest"}}
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "SumRequest": {
                        "type": "object",
                        "properties": {"values": {"type": "array", "items": {"type": "number"}}},
                        "required": ["values"]
                    }
                }
            }
        })
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let api = ApiClient::new("http://localhost:8001/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:8001");
        assert_eq!(api.endpoint("/multiply"), "http://localhost:8001/multiply");
        assert_eq!(api.endpoint("multiply"), "http://localhost:8001/multiply");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("localhost 8001").is_err());
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        assert_eq!(excerpt("  short  "), "short");
        let long = "x".repeat(BODY_EXCERPT_CHARS + 10);
        let short = excerpt(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), BODY_EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_query_value_rendering() {
        assert_eq!(query_value(&json!("abc")), "abc");
        assert_eq!(query_value(&json!(3)), "3");
        assert_eq!(query_value(&json!(2.5)), "2.5");
        assert_eq!(query_value(&json!(true)), "true");
    }

    #[tokio::test]
    async fn test_discover_tools() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openapi_document()))
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let tools = discover_tools(&api).await.unwrap();

        let names: Vec<String> = tools
            .iter()
            .map(|t| t.get_definition().function.name)
            .collect();
        assert_eq!(names, vec!["multiply".to_string(), "sum".to_string()]);
        assert_eq!(tools[0].path(), "/multiply");

        let sum = tools[1].get_definition();
        assert_eq!(
            sum.function.parameters.properties["values"].items,
            Some(json!({"type": "number"}))
        );
    }

    #[tokio::test]
    async fn test_fetch_document_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let err = api.fetch_document().await.unwrap_err();
        assert!(matches!(err, SchemaError::DocumentStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_document_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let err = api.fetch_document().await.unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_fetch_document_unreachable() {
        // Port 9 (discard) is closed on test hosts.
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let err = api.fetch_document().await.unwrap_err();
        assert!(matches!(err, SchemaError::DocumentFetch { .. }));
    }

    #[tokio::test]
    async fn test_query_operation_sends_query_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/multiply"))
            .and(query_param("a", "3"))
            .and(query_param("b", "4"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"a": 3.0, "b": 4.0, "result": 12.0})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openapi_document()))
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let tools = discover_tools(&api).await.unwrap();

        let mut args = Map::new();
        args.insert("a".into(), json!(3));
        args.insert("b".into(), json!(4));
        let payload = tools[0].execute(&args).await.unwrap();
        assert_eq!(payload["result"], json!(12.0));
    }

    #[tokio::test]
    async fn test_body_operation_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sum"))
            .and(body_json(json!({"values": [1, 2, 3]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 6})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openapi_document()))
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let tools = discover_tools(&api).await.unwrap();

        let mut args = Map::new();
        args.insert("values".into(), json!([1, 2, 3]));
        let payload = tools[1].execute(&args).await.unwrap();
        assert_eq!(payload, json!({"result": 6}));
    }

    #[tokio::test]
    async fn test_status_error_carries_body_excerpt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/multiply"))
            .respond_with(ResponseTemplate::new(422).set_body_string("{\"detail\":\"missing b\"}"))
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let err = api.post("/multiply", &[], None).await.unwrap_err();
        let expected = format!("HTTP 422 from POST {}/multiply: {{\"detail\":\"missing b\"}}", server.uri());
        assert_eq!(err.to_string(), expected);
    }

    #[tokio::test]
    async fn test_non_json_success_is_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/multiply"))
            .respond_with(ResponseTemplate::new(200).set_body_string("twelve"))
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let err = api.post("/multiply", &[], None).await.unwrap_err();
        assert!(matches!(err, ToolInvocationError::InvalidBody { .. }));
    }
}
