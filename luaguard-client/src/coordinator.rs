//! Remote-first obfuscation with local fallback

use luaguard_core::{ObfuscationRequest, ObfuscationResult, Pipeline};
use tracing::{info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::remote::{RemoteClient, RemoteFailure};

/// Client-facing entry point
///
/// Each call is independent: one remote attempt bounded by the configured
/// timeout, then (if enabled) the local pipeline on the same task.
#[derive(Debug, Clone)]
pub struct ObfuscationCoordinator {
    remote: Option<RemoteClient>,
    config: CoordinatorConfig,
    pipeline: Pipeline,
}

impl ObfuscationCoordinator {
    pub fn new(config: CoordinatorConfig, pipeline: Pipeline) -> Self {
        Self {
            remote: Some(RemoteClient::new(config.endpoint_url())),
            config,
            pipeline,
        }
    }

    /// A coordinator that never leaves the process
    pub fn local_only(pipeline: Pipeline) -> Self {
        Self {
            remote: None,
            config: CoordinatorConfig::default(),
            pipeline,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Validate raw inputs, then obfuscate
    pub async fn obfuscate_source(
        &self,
        source_code: &str,
        language_variant: &str,
        preset: &str,
    ) -> Result<ObfuscationResult> {
        let request = ObfuscationRequest::parse(source_code, language_variant, preset)?;
        self.obfuscate(&request).await
    }

    /// Obfuscate remotely, falling back to the local pipeline when the
    /// remote is unavailable
    pub async fn obfuscate(&self, request: &ObfuscationRequest) -> Result<ObfuscationResult> {
        request.validate()?;

        let Some(remote) = &self.remote else {
            info!("Obfuscating locally ({}, {})", request.preset, request.language_variant);
            return self.run_local(request);
        };

        info!("Requesting remote obfuscation from {}", remote.url());
        let attempt = tokio::time::timeout(self.config.timeout(), remote.transform(request)).await;
        let failure = match attempt {
            Ok(Ok(output)) => return Ok(ObfuscationResult::from_output(request, output)),
            Ok(Err(failure)) => failure,
            Err(_) => RemoteFailure::Unavailable(format!(
                "no response within {} ms",
                self.config.timeout_ms
            )),
        };

        match failure {
            RemoteFailure::Unavailable(reason) if self.config.enable_fallback => {
                warn!("Remote transformer unavailable ({}), using local pipeline", reason);
                self.run_local(request)
            }
            RemoteFailure::Unavailable(reason) => Err(CoordinatorError::Transport(reason)),
            RemoteFailure::Rejected {
                status,
                message,
                details,
            } => Err(CoordinatorError::ServerRejected {
                status,
                message,
                details,
            }),
            RemoteFailure::Failed { status, message } => Err(CoordinatorError::Server { status, message }),
        }
    }

    fn run_local(&self, request: &ObfuscationRequest) -> Result<ObfuscationResult> {
        Ok(self.pipeline.obfuscate(request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use luaguard_core::{LanguageVariant, Preset};
    use serde_json::{json, Value};

    const SOURCE: &str = "local greeting = \"hi\"\nprint(greeting)";

    /// Serve `router` on an ephemeral port and return its base URL
    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A transformer that always answers `status` with `body`, counting hits
    async fn fixed_server(status: StatusCode, body: Value) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/api/obfuscate",
                post(move |State(hits): State<Arc<AtomicUsize>>| {
                    let body = body.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        (status, Json(body))
                    }
                }),
            )
            .with_state(hits.clone());
        (spawn_server(router).await, hits)
    }

    fn coordinator(base_url: String, enable_fallback: bool) -> ObfuscationCoordinator {
        let config = CoordinatorConfig {
            base_url,
            timeout_ms: 2_000,
            enable_fallback,
            ..Default::default()
        };
        ObfuscationCoordinator::new(config, Pipeline::with_defaults())
    }

    fn request() -> ObfuscationRequest {
        ObfuscationRequest::new(SOURCE, LanguageVariant::Luau, Preset::Medium)
    }

    fn is_local(result: &ObfuscationResult) -> bool {
        result.metadata.stats.is_some() && result.output_code.starts_with("-- Protected with LuaGuard")
    }

    #[tokio::test]
    async fn test_remote_success_is_verbatim() {
        let router = Router::new().route(
            "/api/obfuscate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["version"], "luau");
                assert_eq!(body["preset"], "medium");
                assert_eq!(body["code"], SOURCE);
                Json(json!({
                    "success": true,
                    "obfuscatedCode": "--remote\nreturn 1",
                    "metadata": {"engine": "native"}
                }))
            }),
        );
        let url = spawn_server(router).await;

        let result = coordinator(url, true).obfuscate(&request()).await.unwrap();
        assert_eq!(result.output_code, "--remote\nreturn 1");
        assert!(result.metadata.stats.is_none());
        assert_eq!(result.metadata.output_size, result.output_code.len());
    }

    #[tokio::test]
    async fn test_server_error_falls_back() {
        let (url, hits) = fixed_server(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "busy"})).await;
        let result = coordinator(url, true).obfuscate(&request()).await.unwrap();
        assert!(is_local(&result));
        assert!(!result.output_code.contains("greeting"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_is_surfaced() {
        let (url, _) = fixed_server(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "Unsupported syntax", "details": "line 2"}),
        )
        .await;
        let err = coordinator(url, true).obfuscate(&request()).await.unwrap_err();
        match err {
            CoordinatorError::ServerRejected {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Unsupported syntax");
                assert_eq!(details.as_deref(), Some("line 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_status_is_propagated() {
        let (url, _) = fixed_server(StatusCode::UNAUTHORIZED, json!({"error": "missing key"})).await;
        let err = coordinator(url, true).obfuscate(&request()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Server { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_malformed_success_falls_back() {
        let (url, _) = fixed_server(StatusCode::OK, json!({"success": false})).await;
        let result = coordinator(url, true).obfuscate(&request()).await.unwrap();
        assert!(is_local(&result));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let result = coordinator(url.clone(), true).obfuscate(&request()).await.unwrap();
        assert!(is_local(&result));

        let err = coordinator(url, false).obfuscate(&request()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Transport(_)));
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let router = Router::new().route(
            "/api/obfuscate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"success": true, "obfuscatedCode": "late"}))
            }),
        );
        let url = spawn_server(router).await;
        let config = CoordinatorConfig {
            base_url: url,
            timeout_ms: 100,
            ..Default::default()
        };

        let coordinator = ObfuscationCoordinator::new(config.clone(), Pipeline::with_defaults());
        let result = coordinator.obfuscate(&request()).await.unwrap();
        assert!(is_local(&result));

        let strict = ObfuscationCoordinator::new(
            CoordinatorConfig {
                enable_fallback: false,
                ..config
            },
            Pipeline::with_defaults(),
        );
        let err = strict.obfuscate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("100 ms"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_call() {
        let (url, hits) = fixed_server(StatusCode::OK, json!({"success": true, "obfuscatedCode": "x"})).await;
        let coordinator = coordinator(url, true);

        let err = coordinator.obfuscate_source("  ", "luau", "weak").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Validation(_)));
        let err = coordinator.obfuscate_source(SOURCE, "python", "weak").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Validation(_)));
        let err = coordinator.obfuscate_source(SOURCE, "luau", "extreme").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Validation(_)));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_local_pass_failure_is_distinct() {
        let coordinator = ObfuscationCoordinator::local_only(Pipeline::with_defaults());
        let err = coordinator
            .obfuscate_source("print(\"unterminated)", "lua51", "weak")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InternalPass(_)));

        let ok = coordinator.obfuscate_source(SOURCE, "lua51", "minify").await.unwrap();
        assert!(is_local(&ok));
    }
}
