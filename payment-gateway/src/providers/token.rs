//! Bearer-token lifecycle for one e-wallet provider.
//!
//! Each provider owns exactly one [`TokenManager`], which is injected into
//! that provider's client. The token lives in a single slot: a refresh
//! replaces it under one write guard, an observed unauthorized response
//! clears it, and the next call fetches a fresh one lazily.
//!
//! Concurrent callers that find the slot empty may each fetch a token. The
//! last write wins, which is acceptable because every fetched token is valid
//! when it is written.

use chrono::Utc;
use metrics::counter;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ProviderError;
use crate::config::{GopayConfig, ShopeePayConfig};
use crate::models::PaymentMethod;

/// Provider-specific authentication credentials.
#[derive(Clone, Debug)]
pub enum ProviderCredentials {
    Gopay {
        client_id: String,
        client_secret: Secret<String>,
        signature: Secret<String>,
    },
    ShopeePay {
        merchant_id: String,
        api_key: Secret<String>,
        signature: Secret<String>,
    },
}

#[derive(Serialize)]
struct GopayAuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    signature: &'a str,
    timestamp: i64,
}

#[derive(Serialize)]
struct ShopeePayAuthRequest<'a> {
    merchant_id: &'a str,
    api_key: &'a str,
    signature: &'a str,
    timestamp: i64,
}

/// Authentication response. Both providers return at least `token`.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

impl ProviderCredentials {
    pub fn provider(&self) -> PaymentMethod {
        match self {
            Self::Gopay { .. } => PaymentMethod::Gopay,
            Self::ShopeePay { .. } => PaymentMethod::ShopeePay,
        }
    }

    /// Path of the authentication endpoint, relative to the provider base URL.
    pub fn auth_path(&self) -> &'static str {
        match self {
            Self::Gopay { .. } => "/auth/token",
            Self::ShopeePay { .. } => "/authentication",
        }
    }

    fn auth_body(&self, timestamp: i64) -> serde_json::Value {
        let body = match self {
            Self::Gopay {
                client_id,
                client_secret,
                signature,
            } => serde_json::to_value(GopayAuthRequest {
                client_id,
                client_secret: client_secret.expose_secret(),
                signature: signature.expose_secret(),
                timestamp,
            }),
            Self::ShopeePay {
                merchant_id,
                api_key,
                signature,
            } => serde_json::to_value(ShopeePayAuthRequest {
                merchant_id,
                api_key: api_key.expose_secret(),
                signature: signature.expose_secret(),
                timestamp,
            }),
        };
        // Plain string/integer fields always serialize.
        body.unwrap_or_default()
    }
}

impl From<&GopayConfig> for ProviderCredentials {
    fn from(config: &GopayConfig) -> Self {
        Self::Gopay {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            signature: config.signature.clone(),
        }
    }
}

impl From<&ShopeePayConfig> for ProviderCredentials {
    fn from(config: &ShopeePayConfig) -> Self {
        Self::ShopeePay {
            merchant_id: config.merchant_id.clone(),
            api_key: config.api_key.clone(),
            signature: config.signature.clone(),
        }
    }
}

pub struct TokenManager {
    client: Client,
    base_url: String,
    credentials: ProviderCredentials,
    slot: RwLock<Option<String>>,
}

impl TokenManager {
    pub fn new(client: Client, base_url: impl Into<String>, credentials: ProviderCredentials) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            slot: RwLock::new(None),
        }
    }

    pub fn provider(&self) -> PaymentMethod {
        self.credentials.provider()
    }

    /// Cached token, or a freshly fetched one when the slot is empty.
    pub async fn current_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.slot.read().await.clone() {
            return Ok(token);
        }
        self.fetch_new_token().await
    }

    /// Authenticate against the provider and replace the cached token.
    ///
    /// On failure the slot is left empty.
    #[tracing::instrument(skip(self), fields(provider = %self.provider()))]
    pub async fn fetch_new_token(&self) -> Result<String, ProviderError> {
        let provider = self.provider();
        let url = format!("{}{}", self.base_url, self.credentials.auth_path());
        let body = self.credentials.auth_body(Utc::now().timestamp_millis());
        let request_id = Uuid::new_v4().to_string();

        let response = match self
            .client
            .traced_post(&url)
            .json(&body)
            .send_with_request_id(&request_id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.invalidate().await;
                tracing::error!(error = %e, request_id = %request_id, "Token request failed");
                return Err(ProviderError::Authentication {
                    provider,
                    reason: format!("error fetching auth token: {}", e),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.invalidate().await;
            tracing::error!(status = %status, request_id = %request_id, "Token request rejected");
            return Err(ProviderError::Authentication {
                provider,
                reason: format!("failed to authenticate: {}", status),
            });
        }

        let auth: AuthResponse = match response.json().await {
            Ok(auth) => auth,
            Err(e) => {
                self.invalidate().await;
                return Err(ProviderError::Authentication {
                    provider,
                    reason: format!("unreadable auth response: {}", e),
                });
            }
        };

        {
            let mut slot = self.slot.write().await;
            *slot = Some(auth.token.clone());
        }

        counter!("provider_token_refresh_total", "provider" => provider.as_str()).increment(1);
        tracing::info!("Provider token refreshed");

        Ok(auth.token)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }

    pub async fn has_token(&self) -> bool {
        self.slot.read().await.is_some()
    }
}
