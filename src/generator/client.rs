use std::time::Duration;

use reqwest::Client;

use super::error::GeneratorError;
use super::types::{GenerateRequest, GenerateResponse};
use super::DiagramGenerator;

/// HTTP client for the external diagram-generation service.
///
/// The service is network-callable, non-cancelable, and potentially slow:
/// dropping an in-flight request abandons the connection but the remote task
/// keeps running to its own completion. Callers bound the wait with their own
/// timeout and discard late results.
pub struct HttpGenerator {
    api_key: String,
    client: Client,
    base_url: String,
}

impl HttpGenerator {
    /// Create a client for the service at `base_url` (the configured
    /// deployment, or a mock server in tests).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            client,
            base_url,
        }
    }
}

impl DiagramGenerator for HttpGenerator {
    async fn run(&self, job_id: &str, owner_id: &str) -> Result<GenerateResponse, GeneratorError> {
        let req = GenerateRequest {
            job_id: job_id.to_string(),
            owner_id: owner_id.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout
                } else {
                    GeneratorError::Network(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<GenerateResponse>(&body)
            .map_err(|e| GeneratorError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn run_posts_request_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("x-api-key", "sk-test"))
            .and(body_json(serde_json::json!({
                "jobId": "req-1",
                "ownerId": "owner-1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "diagram": "graph TD; A-->B;",
                "format": "mermaid",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::with_base_url("sk-test".into(), server.uri());
        let resp = generator.run("req-1", "owner-1").await.unwrap();

        assert_eq!(resp.diagram, "graph TD; A-->B;");
        assert_eq!(resp.format, "mermaid");
    }

    #[tokio::test]
    async fn run_maps_http_failure_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("generator exploded"))
            .mount(&server)
            .await;

        let generator = HttpGenerator::with_base_url("sk-test".into(), server.uri());
        let err = generator.run("req-1", "owner-1").await.unwrap_err();

        assert!(!err.is_timeout());
        match err {
            GeneratorError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "generator exploded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_maps_garbage_body_to_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let generator = HttpGenerator::with_base_url("sk-test".into(), server.uri());
        let err = generator.run("req-1", "owner-1").await.unwrap_err();
        assert!(matches!(err, GeneratorError::Parse(_)));
    }
}
