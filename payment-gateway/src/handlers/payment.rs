//! E-wallet endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    middleware::Subject,
    models::{EWalletBalanceResponse, TopUpRequest, TransactionResponse, WalletQuery, WebResponse},
    AppState,
};

pub async fn get_wallet_balance(
    State(state): State<AppState>,
    Subject(username): Subject,
    Query(query): Query<WalletQuery>,
) -> Result<Json<WebResponse<EWalletBalanceResponse>>, AppError> {
    let balance = state
        .top_ups
        .get_ewallet_balance(&username, &query.ewallet)
        .await?;
    Ok(Json(WebResponse::ok(
        "E-wallet balance retrieved successfully",
        balance,
    )))
}

pub async fn top_up(
    State(state): State<AppState>,
    Subject(username): Subject,
    Json(payload): Json<TopUpRequest>,
) -> Result<Json<WebResponse<TransactionResponse>>, AppError> {
    let span = tracing::info_span!("topup", trace_id = %Uuid::new_v4(), username = %username);

    async move {
        tracing::info!(
            payment_method = %payload.payment_method,
            amount = %payload.amount,
            "Top-up requested"
        );
        let transaction = state.top_ups.top_up(&username, &payload).await?;
        Ok(Json(WebResponse::ok("Top up successful", transaction)))
    }
    .instrument(span)
    .await
}
