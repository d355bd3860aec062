//! Gopay wallet client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use service_core::retry::RetryConfig;
use std::sync::Arc;

use super::http::{decode, encode};
use super::{
    decimal_from_f64, decimal_to_f64, ProviderBalance, ProviderError, ProviderHttpClient,
    ProviderTopUpRequest, ProviderTopUpResult, TokenManager, WalletProvider,
};
use crate::models::{PaymentMethod, TransactionStatus};

const PROVIDER: PaymentMethod = PaymentMethod::Gopay;

#[derive(Debug, Serialize)]
struct GopayTopUpRequest<'a> {
    wallet_id: &'a str,
    amount: f64,
    payment_method: &'a str,
    reference_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct GopayBalanceResponse {
    status: String,
    data: GopayBalanceData,
}

#[derive(Debug, Deserialize)]
struct GopayBalanceData {
    wallet_id: String,
    balance: f64,
    currency: String,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GopayTopUpResponse {
    status: String,
    transaction_id: String,
    amount: f64,
}

pub struct GopayClient {
    http: ProviderHttpClient,
}

impl GopayClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http: ProviderHttpClient::new(client, base_url, tokens, retry, true),
        }
    }
}

#[async_trait]
impl WalletProvider for GopayClient {
    fn payment_method(&self) -> PaymentMethod {
        PROVIDER
    }

    #[tracing::instrument(skip(self), fields(provider = "GOPAY"))]
    async fn get_balance(
        &self,
        wallet_id: &str,
        request_id: &str,
    ) -> Result<ProviderBalance, ProviderError> {
        let path = format!("/v1/wallets/{}/balance", wallet_id);
        let response = self.http.send(Method::GET, &path, None, request_id).await?;

        if !response.status.is_success() {
            tracing::warn!(status = %response.status, body = %response.body, "Gopay balance lookup rejected");
            return Err(ProviderError::Rejected {
                provider: PROVIDER,
                status: response.status.as_u16(),
                body: response.body,
            });
        }

        let parsed: GopayBalanceResponse = decode(PROVIDER, &response.body)?;
        tracing::debug!(status = %parsed.status, "Gopay balance retrieved");

        Ok(ProviderBalance {
            wallet_id: parsed.data.wallet_id,
            balance: decimal_from_f64(PROVIDER, parsed.data.balance)?,
            currency: parsed.data.currency,
            last_updated: parsed.data.last_updated,
        })
    }

    #[tracing::instrument(
        skip(self, request),
        fields(provider = "GOPAY", reference_id = %request.reference_id)
    )]
    async fn top_up(
        &self,
        request: &ProviderTopUpRequest,
    ) -> Result<Option<ProviderTopUpResult>, ProviderError> {
        let body = encode(
            PROVIDER,
            &GopayTopUpRequest {
                wallet_id: &request.wallet_id,
                amount: decimal_to_f64(PROVIDER, request.amount)?,
                payment_method: "BANK_TRANSFER",
                reference_id: &request.reference_id,
            },
        )?;

        let response = self
            .http
            .send(Method::POST, "/v1/wallets/topup", Some(&body), &request.reference_id)
            .await?;

        if response.status.is_client_error() {
            tracing::warn!(status = %response.status, body = %response.body, "Gopay top-up rejected");
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                reason: format!("unexpected status {}", response.status),
            });
        }

        let parsed: GopayTopUpResponse = decode(PROVIDER, &response.body)?;
        let status = TransactionStatus::from_provider(&parsed.status);
        if status == TransactionStatus::Failed {
            tracing::warn!(provider_status = %parsed.status, "Gopay reported failed top-up");
            return Ok(None);
        }

        tracing::info!(
            provider_transaction_id = %parsed.transaction_id,
            provider_status = %parsed.status,
            "Gopay top-up accepted"
        );

        Ok(Some(ProviderTopUpResult {
            provider_transaction_id: parsed.transaction_id,
            status,
            provider_status: parsed.status,
            amount: decimal_from_f64(PROVIDER, parsed.amount)?,
        }))
    }
}
