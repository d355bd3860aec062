//! Authenticated request pipeline shared by both provider clients.

use metrics::counter;
use reqwest::{Client, Method, StatusCode};
use service_core::observability::TracedRequest;
use service_core::retry::RetryConfig;
use std::sync::Arc;
use std::time::Duration;

use super::{ProviderError, TokenManager};
use crate::config::ProviderHttpConfig;
use crate::models::PaymentMethod;

/// Retry budget for provider 5xx responses: two retries, exponential delay.
pub fn default_provider_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(500),
        max_backoff: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        add_jitter: true,
    }
}

/// HTTP client with per-call timeouts, so a retry never overlaps a call
/// that is still in flight.
pub fn build_http_client(config: &ProviderHttpConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .build()
}

/// Status and body of a provider response that passed the resilience layer.
#[derive(Debug)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub body: String,
}

pub struct ProviderHttpClient {
    client: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
    retry: RetryConfig,
    /// Gopay also signals expired credentials with 403.
    refresh_on_forbidden: bool,
}

impl ProviderHttpClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        retry: RetryConfig,
        refresh_on_forbidden: bool,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            retry,
            refresh_on_forbidden,
        }
    }

    pub fn provider(&self) -> PaymentMethod {
        self.tokens.provider()
    }

    fn is_auth_rejection(&self, status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED
            || (self.refresh_on_forbidden && status == StatusCode::FORBIDDEN)
    }

    /// Send an authenticated request.
    ///
    /// - 5xx is retried up to `retry.max_retries` times with backoff.
    /// - An auth rejection clears the token, fetches a new one and retries
    ///   once. A second rejection clears the token again and fails with
    ///   [`ProviderError::Authentication`].
    /// - Every other status is handed back to the caller.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        request_id: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let provider = self.provider();
        let url = format!("{}{}", self.base_url, path);

        let mut token = self.tokens.current_token().await?;
        let mut server_retries = 0u32;
        let mut refreshed = false;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = TracedRequest::new(request)
                .send_with_request_id(request_id)
                .await
                .map_err(|source| {
                    tracing::error!(
                        provider = %provider,
                        url = %url,
                        request_id = %request_id,
                        error = %source,
                        "Provider request failed"
                    );
                    ProviderError::Transport { provider, source }
                })?;

            let status = response.status();
            tracing::debug!(
                provider = %provider,
                url = %url,
                status = %status,
                request_id = %request_id,
                "Provider response"
            );

            if status.is_server_error() {
                if server_retries < self.retry.max_retries {
                    let backoff = self.retry.backoff_duration(server_retries);
                    tracing::warn!(
                        provider = %provider,
                        status = %status,
                        attempt = server_retries + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        request_id = %request_id,
                        "Provider server error, retrying after backoff"
                    );
                    counter!(
                        "provider_request_retries_total",
                        "provider" => provider.as_str(),
                        "reason" => "server_error"
                    )
                    .increment(1);
                    tokio::time::sleep(backoff).await;
                    server_retries += 1;
                    continue;
                }
                return Err(ProviderError::Server {
                    provider,
                    status: status.as_u16(),
                });
            }

            if self.is_auth_rejection(status) {
                self.tokens.invalidate().await;

                if refreshed {
                    tracing::error!(
                        provider = %provider,
                        status = %status,
                        request_id = %request_id,
                        "Provider still rejects credentials after token refresh"
                    );
                    return Err(ProviderError::Authentication {
                        provider,
                        reason: format!("{} after token refresh", status),
                    });
                }

                tracing::warn!(
                    provider = %provider,
                    status = %status,
                    url = %url,
                    request_id = %request_id,
                    "Provider rejected token, refreshing"
                );
                counter!(
                    "provider_request_retries_total",
                    "provider" => provider.as_str(),
                    "reason" => "token_refresh"
                )
                .increment(1);
                token = self.tokens.fetch_new_token().await?;
                refreshed = true;
                continue;
            }

            let body = response
                .text()
                .await
                .map_err(|source| ProviderError::Transport { provider, source })?;

            return Ok(ProviderResponse { status, body });
        }
    }
}

/// Serialize a request body, mapping failures to [`ProviderError::InvalidRequest`].
pub fn encode<T: serde::Serialize>(
    provider: PaymentMethod,
    body: &T,
) -> Result<serde_json::Value, ProviderError> {
    serde_json::to_value(body).map_err(|e| ProviderError::InvalidRequest {
        provider,
        reason: e.to_string(),
    })
}

/// Parse a JSON body, mapping failures to [`ProviderError::InvalidResponse`].
pub fn decode<T: serde::de::DeserializeOwned>(
    provider: PaymentMethod,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
        provider,
        reason: e.to_string(),
    })
}
