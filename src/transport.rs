//! HTTP submission of encoded documents.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::SubmissionSettings;
use crate::document::DocumentBuilder;
use crate::error::TransportError;

pub const API_ID_HEADER: &str = "api_id";
pub const API_KEY_HEADER: &str = "api_key";

/// Outcome of one submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResponse {
    pub success: bool,
    /// `None` when no HTTP response was received
    pub status: Option<u16>,
    pub application_id: Option<String>,
    pub message: Option<String>,
    pub errors: Vec<String>,
    pub body: String,
}

impl SubmissionResponse {
    /// Interpret a response.
    ///
    /// A 2xx status succeeds unless the body is JSON with `"success": false`.
    pub fn from_http(status: u16, body: &str) -> Self {
        let json: Option<Value> = serde_json::from_str(body).ok();
        let field = |key: &str| json.as_ref().and_then(|j| j.get(key));

        let text = |key: &str| {
            field(key).and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };

        let errors = match field("errors") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        };

        let reported = field("success").and_then(Value::as_bool);
        Self {
            success: (200..300).contains(&status) && reported.unwrap_or(true),
            status: Some(status),
            application_id: text("applicationId"),
            message: text("message"),
            errors,
            body: body.to_string(),
        }
    }

    /// A submission that never reached the server
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            application_id: None,
            message: Some(message.into()),
            errors: Vec::new(),
            body: String::new(),
        }
    }
}

/// Posts documents to the configured endpoint.
pub struct SubmissionClient {
    client: Client,
    settings: SubmissionSettings,
}

impl SubmissionClient {
    pub fn new(settings: SubmissionSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.read_timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &SubmissionSettings {
        &self.settings
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in [
            (API_ID_HEADER, &self.settings.api_id),
            (API_KEY_HEADER, &self.settings.api_key),
        ] {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(_) => warn!(header = name, "Credential is not a valid header value, not sending it"),
            }
        }
        headers
    }

    /// POST `document`, wrapping it first when configured to.
    pub async fn submit(&self, document: &Value) -> Result<SubmissionResponse, TransportError> {
        let endpoint = self
            .settings
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(TransportError::MissingEndpoint)?;

        let payload = if self.settings.wrap_test_data {
            DocumentBuilder::wrap_test_data(document.clone())
        } else {
            document.clone()
        };
        let body = serde_json::to_string(&payload)?;
        if self.settings.log_payload {
            debug!(payload = %body, "Submission payload");
        }

        info!(endpoint, bytes = body.len(), "Submitting document");
        let response = self
            .client
            .post(endpoint)
            .headers(self.headers())
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.classify(e))?;
        let parsed = SubmissionResponse::from_http(status, &text);

        if parsed.success {
            info!(status, application_id = ?parsed.application_id, "Submission accepted");
        } else {
            warn!(status, message = ?parsed.message, errors = ?parsed.errors, "Submission rejected");
        }
        Ok(parsed)
    }

    /// Like [`submit`](Self::submit), but transport failures become an
    /// unsuccessful response instead of an error.
    pub async fn submit_lenient(&self, document: &Value) -> SubmissionResponse {
        match self.submit(document).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Submission failed");
                SubmissionResponse::failed(e.to_string())
            }
        }
    }

    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.settings.read_timeout_secs)
        } else {
            TransportError::Http(e)
        }
    }
}
