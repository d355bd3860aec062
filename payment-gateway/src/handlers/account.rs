use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    middleware::Subject,
    models::{AccountResponse, BalanceResponse, WebResponse},
    AppState,
};

pub async fn get_account(
    State(state): State<AppState>,
    Subject(username): Subject,
) -> Result<Json<WebResponse<AccountResponse>>, AppError> {
    let account = state.accounts.get_account_by_username(&username).await?;
    Ok(Json(WebResponse::ok("Account retrieved successfully", account)))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Subject(username): Subject,
) -> Result<Json<WebResponse<BalanceResponse>>, AppError> {
    let balance = state.accounts.get_balance_by_username(&username).await?;
    Ok(Json(WebResponse::ok("Balance retrieved successfully", balance)))
}
