//! Upstream REST client
//!
//! Thin JSON-over-HTTP wrappers around the upstream server's model
//! surface. These calls sit outside the transactional core: callers use
//! them for plain reads and non-transactional writes, the engine uses
//! `create_session` to start a transaction and `validate` after a
//! successful commit.

use async_trait::async_trait;
use modelgate_core::ModelValidator;
use modelgate_core_types::{ClientId, ModelUri, SessionUri};
use modelgate_errors::{GateError, GateErrorKind, Result};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

/// Client for the upstream server's REST API
#[derive(Debug, Clone)]
pub struct UpstreamRestClient {
    http: reqwest::Client,
    base_url: Url,
    client_id: ClientId,
}

impl UpstreamRestClient {
    /// Create a client against `base_url` (e.g. `http://localhost:8081/api/v2/`)
    pub fn new(base_url: Url, client_id: ClientId) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            client_id,
        }
    }

    /// The client id sent with session-creation requests
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn endpoint(&self, path: &str, model_uri: &ModelUri) -> Result<Url> {
        let mut url = self.base_url.join(path).map_err(|error| {
            GateError::new(GateErrorKind::Internal)
                .with_op("endpoint")
                .with_message(format!("invalid endpoint '{path}': {error}"))
        })?;
        url.query_pairs_mut()
            .append_pair("modeluri", model_uri.as_str());
        Ok(url)
    }

    async fn run(&self, op: &'static str, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|error| http_error(op, &error))?
            .error_for_status()
            .map_err(|error| http_error(op, &error))?;

        let body: Value = response
            .json()
            .await
            .map_err(|error| http_error(op, &error))?;

        debug!(target: "modelgate::rest", op, "upstream call succeeded");

        // The upstream wraps payloads as {type, data}; unwrap when present
        match body {
            Value::Object(mut fields) if fields.contains_key("data") => {
                Ok(fields.remove("data").unwrap_or(Value::Null))
            }
            other => Ok(other),
        }
    }

    /// Fetch a model
    pub async fn get_model(&self, model_uri: &ModelUri) -> Result<Value> {
        let url = self.endpoint("models", model_uri)?;
        self.run("get_model", self.http.get(url)).await
    }

    /// Create a model resource
    pub async fn create_model(&self, model_uri: &ModelUri, model: Value) -> Result<Value> {
        let url = self.endpoint("models", model_uri)?;
        self.run("create_model", self.http.post(url).json(&json!({ "data": model })))
            .await
    }

    /// Replace a model resource
    pub async fn update_model(&self, model_uri: &ModelUri, model: Value) -> Result<Value> {
        let url = self.endpoint("models", model_uri)?;
        self.run("update_model", self.http.patch(url).json(&json!({ "data": model })))
            .await
    }

    /// Delete a model resource
    pub async fn delete_model(&self, model_uri: &ModelUri) -> Result<Value> {
        let url = self.endpoint("models", model_uri)?;
        self.run("delete_model", self.http.delete(url)).await
    }

    /// Undo the last command on a model
    pub async fn undo(&self, model_uri: &ModelUri) -> Result<Value> {
        let url = self.endpoint("undo", model_uri)?;
        self.run("undo", self.http.get(url)).await
    }

    /// Redo the last undone command on a model
    pub async fn redo(&self, model_uri: &ModelUri) -> Result<Value> {
        let url = self.endpoint("redo", model_uri)?;
        self.run("redo", self.http.get(url)).await
    }

    /// Run upstream validation and return its diagnostics
    pub async fn validate(&self, model_uri: &ModelUri) -> Result<Value> {
        let url = self.endpoint("validation", model_uri)?;
        self.run("validate", self.http.get(url)).await
    }

    /// The endpoint serving incremental updates for a model
    ///
    /// Returned in HTTP-scheme form; the subscription socket is opened
    /// against its websocket variant.
    pub fn subscription_endpoint(&self, model_uri: &ModelUri) -> Result<SessionUri> {
        let url = self.endpoint("subscribe", model_uri)?;
        Ok(SessionUri::new(url.to_string()))
    }

    /// Create a transactional session, returning its session URI
    pub async fn create_session(&self, model_uri: &ModelUri) -> Result<SessionUri> {
        let url = self.endpoint("transaction", model_uri)?;
        let body = self
            .run(
                "create_session",
                self.http
                    .post(url)
                    .json(&json!({ "data": self.client_id.as_str() })),
            )
            .await?;

        match body {
            Value::String(uri) => Ok(SessionUri::new(uri)),
            other => Err(GateError::new(GateErrorKind::ExternalService)
                .with_op("create_session")
                .with_model_uri(model_uri.clone())
                .with_message(format!("unexpected session reply: {other}"))),
        }
    }
}

fn http_error(op: &'static str, error: &reqwest::Error) -> GateError {
    GateError::new(GateErrorKind::ExternalService)
        .with_op(op)
        .with_message(error.to_string())
}

/// Validator backed by the upstream validation endpoint
#[derive(Debug, Clone)]
pub struct RestModelValidator {
    rest: UpstreamRestClient,
}

impl RestModelValidator {
    pub fn new(rest: UpstreamRestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ModelValidator for RestModelValidator {
    async fn validate(&self, model_uri: &ModelUri) -> Result<Value> {
        self.rest.validate(model_uri).await
    }
}
