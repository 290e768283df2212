//! HTTP client for the remote transformer

use luaguard_core::ObfuscationRequest;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Body posted to the transform endpoint
#[derive(Debug, Serialize)]
pub struct TransformRequest<'a> {
    pub code: &'a str,
    /// Language variant wire name
    pub version: &'a str,
    pub preset: &'a str,
}

impl<'a> From<&'a ObfuscationRequest> for TransformRequest<'a> {
    fn from(request: &'a ObfuscationRequest) -> Self {
        Self {
            code: &request.source_code,
            version: request.language_variant.as_str(),
            preset: request.preset.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransformResponse {
    pub success: bool,
    #[serde(rename = "obfuscatedCode")]
    pub obfuscated_code: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// How a remote attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// Timeout, transport error, overload or a malformed answer
    Unavailable(String),
    /// The server says the input itself is bad
    Rejected {
        status: u16,
        message: String,
        details: Option<String>,
    },
    /// Any other error status
    Failed { status: u16, message: String },
}

/// Sort a non-success status into rejection, unavailability or plain failure
pub fn classify_status(status: StatusCode, body: ErrorResponse) -> RemoteFailure {
    let message = body
        .error
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    match status.as_u16() {
        400 | 413 | 415 | 422 => RemoteFailure::Rejected {
            status: status.as_u16(),
            message,
            details: body.details,
        },
        408 | 429 => RemoteFailure::Unavailable(format!("{} ({})", message, status.as_u16())),
        s if status.is_server_error() => RemoteFailure::Unavailable(format!("{} ({})", message, s)),
        s => RemoteFailure::Failed { status: s, message },
    }
}

/// Thin wrapper around the transform endpoint
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    url: String,
}

impl RemoteClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One attempt at the remote transform; no retries
    pub async fn transform(&self, request: &ObfuscationRequest) -> Result<String, RemoteFailure> {
        let resp = self
            .client
            .post(&self.url)
            .json(&TransformRequest::from(request))
            .send()
            .await
            .map_err(|e| RemoteFailure::Unavailable(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<ErrorResponse>().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: TransformResponse = resp
            .json()
            .await
            .map_err(|e| RemoteFailure::Unavailable(format!("malformed response: {}", e)))?;
        match body {
            TransformResponse {
                success: true,
                obfuscated_code: Some(code),
                ..
            } => Ok(code),
            _ => Err(RemoteFailure::Unavailable(
                "response did not contain obfuscated code".to_string(),
            )),
        }
    }
}
