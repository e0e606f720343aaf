//! HTTP implementation of [`SagaBackend`] over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use common::SagaId;
use domain::{OrderRequest, SagaSnapshot};
use reqwest::{Client, Response, StatusCode, Url};

use super::{BackendError, SagaBackend};

/// Talks to the order backend's REST endpoints:
///
/// - `POST {base}/submit-order`
/// - `GET  {base}/order-status/{sagaId}`
/// - `POST {base}/cancel-order/{sagaId}`
#[derive(Debug, Clone)]
pub struct HttpSagaBackend {
    client: Client,
    base_url: Url,
}

impl HttpSagaBackend {
    /// Creates a backend client with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::with_client(client, base_url)
    }

    /// Creates a backend over an existing client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Transport(format!("invalid backend URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "backend URL cannot carry a path: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn read_snapshot(response: Response) -> Result<SagaSnapshot, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

/// Picks a human-readable message out of an error response body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str(body) {
        for key in ["message", "error", "failureReason"] {
            if let Some(serde_json::Value::String(message)) = fields.get(key) {
                return message.clone();
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}

#[async_trait]
impl SagaBackend for HttpSagaBackend {
    #[tracing::instrument(skip(self, request), fields(symbol = %request.stock_symbol))]
    async fn submit(&self, request: &OrderRequest) -> Result<SagaSnapshot, BackendError> {
        let response = self
            .client
            .post(self.endpoint(&["submit-order"]))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        Self::read_snapshot(response).await
    }

    #[tracing::instrument(skip(self), fields(saga_id = %saga_id))]
    async fn status(&self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError> {
        let response = self
            .client
            .get(self.endpoint(&["order-status", saga_id.as_str()]))
            .send()
            .await
            .map_err(transport)?;
        Self::read_snapshot(response).await
    }

    #[tracing::instrument(skip(self), fields(saga_id = %saga_id))]
    async fn cancel(&self, saga_id: &SagaId) -> Result<SagaSnapshot, BackendError> {
        let response = self
            .client
            .post(self.endpoint(&["cancel-order", saga_id.as_str()]))
            .send()
            .await
            .map_err(transport)?;
        Self::read_snapshot(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpSagaBackend {
        HttpSagaBackend::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoints_append_to_base_path() {
        let backend = backend("http://localhost:8080/orders/api/v1");
        assert_eq!(
            backend.endpoint(&["submit-order"]).as_str(),
            "http://localhost:8080/orders/api/v1/submit-order"
        );

        let trailing = backend_with_slash();
        assert_eq!(
            trailing.endpoint(&["order-status", "abc"]).as_str(),
            "http://localhost:8080/orders/api/v1/order-status/abc"
        );
    }

    fn backend_with_slash() -> HttpSagaBackend {
        backend("http://localhost:8080/orders/api/v1/")
    }

    #[test]
    fn test_saga_ids_are_percent_encoded() {
        let backend = backend("http://localhost:8080");
        assert_eq!(
            backend.endpoint(&["cancel-order", "a b/c"]).as_str(),
            "http://localhost:8080/cancel-order/a%20b%2Fc"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            HttpSagaBackend::new("not a url", Duration::from_secs(1)),
            Err(BackendError::Transport(_))
        ));
        assert!(HttpSagaBackend::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"quantity too large"}"#),
            "quantity too large"
        );
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"error":"saga already terminal"}"#),
            "saga already terminal"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }
}
