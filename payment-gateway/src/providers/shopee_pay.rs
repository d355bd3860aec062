//! ShopeePay wallet client.
//!
//! ShopeePay amounts are whole rupiah; a fractional top-up amount is refused
//! before any request is sent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use service_core::retry::RetryConfig;
use std::sync::Arc;

use super::http::{decode, encode};
use super::{
    decimal_from_f64, ProviderBalance, ProviderError, ProviderHttpClient, ProviderTopUpRequest,
    ProviderTopUpResult, TokenManager, WalletProvider,
};
use crate::models::{PaymentMethod, TransactionStatus};

const PROVIDER: PaymentMethod = PaymentMethod::ShopeePay;

#[derive(Debug, Serialize)]
struct ShopeePayBalanceRequest<'a> {
    user_id: &'a str,
    request_id: &'a str,
    include_details: bool,
}

#[derive(Debug, Serialize)]
struct SourceDetails<'a> {
    bank_code: &'a str,
    account_number: &'a str,
}

#[derive(Debug, Serialize)]
struct ShopeePayTopUpRequest<'a> {
    user_id: &'a str,
    topup_amount: i64,
    source_type: &'a str,
    request_id: &'a str,
    source_details: SourceDetails<'a>,
}

#[derive(Debug, Deserialize)]
struct ShopeePayBalanceResponse {
    result: String,
    balance_info: BalanceInfo,
}

#[derive(Debug, Deserialize)]
struct BalanceInfo {
    user_id: String,
    available_balance: f64,
    currency_code: String,
    last_transaction_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ShopeePayTopUpResponse {
    result: String,
    topup_details: TopUpDetails,
}

#[derive(Debug, Deserialize)]
struct TopUpDetails {
    transaction_id: String,
    amount: f64,
    status: String,
}

pub struct ShopeePayClient {
    http: ProviderHttpClient,
}

impl ShopeePayClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http: ProviderHttpClient::new(client, base_url, tokens, retry, false),
        }
    }
}

#[async_trait]
impl WalletProvider for ShopeePayClient {
    fn payment_method(&self) -> PaymentMethod {
        PROVIDER
    }

    #[tracing::instrument(skip(self), fields(provider = "SHOPEE_PAY"))]
    async fn get_balance(
        &self,
        wallet_id: &str,
        request_id: &str,
    ) -> Result<ProviderBalance, ProviderError> {
        let body = encode(
            PROVIDER,
            &ShopeePayBalanceRequest {
                user_id: wallet_id,
                request_id,
                include_details: true,
            },
        )?;

        let response = self
            .http
            .send(Method::POST, "/v1/wallet/balance", Some(&body), request_id)
            .await?;

        if !response.status.is_success() {
            tracing::warn!(status = %response.status, body = %response.body, "ShopeePay balance lookup rejected");
            return Err(ProviderError::Rejected {
                provider: PROVIDER,
                status: response.status.as_u16(),
                body: response.body,
            });
        }

        let parsed: ShopeePayBalanceResponse = decode(PROVIDER, &response.body)?;
        tracing::debug!(result = %parsed.result, "ShopeePay balance retrieved");

        Ok(ProviderBalance {
            wallet_id: parsed.balance_info.user_id,
            balance: decimal_from_f64(PROVIDER, parsed.balance_info.available_balance)?,
            currency: parsed.balance_info.currency_code,
            last_updated: parsed.balance_info.last_transaction_date,
        })
    }

    #[tracing::instrument(
        skip(self, request),
        fields(provider = "SHOPEE_PAY", reference_id = %request.reference_id)
    )]
    async fn top_up(
        &self,
        request: &ProviderTopUpRequest,
    ) -> Result<Option<ProviderTopUpResult>, ProviderError> {
        if !request.amount.fract().is_zero() {
            return Err(ProviderError::InvalidRequest {
                provider: PROVIDER,
                reason: format!("amount {} must be a whole number", request.amount),
            });
        }
        let topup_amount = request
            .amount
            .to_i64()
            .ok_or_else(|| ProviderError::InvalidRequest {
                provider: PROVIDER,
                reason: format!("amount {} is out of range", request.amount),
            })?;

        let body = encode(
            PROVIDER,
            &ShopeePayTopUpRequest {
                user_id: &request.wallet_id,
                topup_amount,
                source_type: "BANK_ACCOUNT",
                request_id: &request.reference_id,
                source_details: SourceDetails {
                    bank_code: "BNI",
                    account_number: &request.account_id,
                },
            },
        )?;

        let response = self
            .http
            .send(Method::POST, "/v1/wallet/topup", Some(&body), &request.reference_id)
            .await?;

        if response.status.is_client_error() {
            tracing::warn!(status = %response.status, body = %response.body, "ShopeePay top-up rejected");
            return Ok(None);
        }
        if !response.status.is_success() {
            return Err(ProviderError::InvalidResponse {
                provider: PROVIDER,
                reason: format!("unexpected status {}", response.status),
            });
        }

        let parsed: ShopeePayTopUpResponse = decode(PROVIDER, &response.body)?;
        let status = TransactionStatus::from_provider(&parsed.topup_details.status);
        if status == TransactionStatus::Failed
            || TransactionStatus::from_provider(&parsed.result) == TransactionStatus::Failed
        {
            tracing::warn!(
                result = %parsed.result,
                provider_status = %parsed.topup_details.status,
                "ShopeePay reported failed top-up"
            );
            return Ok(None);
        }

        tracing::info!(
            provider_transaction_id = %parsed.topup_details.transaction_id,
            provider_status = %parsed.topup_details.status,
            "ShopeePay top-up accepted"
        );

        Ok(Some(ProviderTopUpResult {
            provider_transaction_id: parsed.topup_details.transaction_id,
            status,
            provider_status: parsed.topup_details.status,
            amount: decimal_from_f64(PROVIDER, parsed.topup_details.amount)?,
        }))
    }
}
