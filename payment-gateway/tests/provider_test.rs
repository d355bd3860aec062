mod common;

use common::{dec, fast_retry, gopay_credentials, shopee_pay_credentials};
use payment_gateway::models::TransactionStatus;
use payment_gateway::providers::{
    GopayClient, ProviderError, ProviderTopUpRequest, ShopeePayClient, TokenManager,
    WalletProvider,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOPAY_WALLET: &str = "898+628123456789";
const SHOPEE_WALLET: &str = "897+628123456789";

fn gopay(server: &MockServer) -> (GopayClient, Arc<TokenManager>) {
    let client = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(
        client.clone(),
        server.uri(),
        gopay_credentials(),
    ));
    (
        GopayClient::new(client, server.uri(), tokens.clone(), fast_retry()),
        tokens,
    )
}

fn shopee_pay(server: &MockServer) -> (ShopeePayClient, Arc<TokenManager>) {
    let client = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(
        client.clone(),
        server.uri(),
        shopee_pay_credentials(),
    ));
    (
        ShopeePayClient::new(client, server.uri(), tokens.clone(), fast_retry()),
        tokens,
    )
}

fn top_up_request(amount: &str, reference_id: &str) -> ProviderTopUpRequest {
    ProviderTopUpRequest {
        wallet_id: GOPAY_WALLET.to_string(),
        amount: dec(amount),
        reference_id: reference_id.to_string(),
        account_id: "ACC-0001".to_string(),
    }
}

async fn mount_token(server: &MockServer, auth_path: &str, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(auth_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

fn gopay_balance_body() -> serde_json::Value {
    json!({
        "status": "SUCCESS",
        "data": {
            "wallet_id": GOPAY_WALLET,
            "balance": 250000.0,
            "currency": "IDR",
            "last_updated": "2024-01-01T10:00:00Z"
        }
    })
}

fn gopay_topup_body(status: &str) -> serde_json::Value {
    json!({
        "status": status,
        "transaction_id": "GP-991",
        "wallet_id": GOPAY_WALLET,
        "amount": 50000.0,
        "new_balance": 300000.0,
        "transaction_time": "2024-01-01T10:00:00Z"
    })
}

#[tokio::test]
async fn gopay_balance_reuses_cached_token() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/wallets/{}/balance", GOPAY_WALLET)))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("x-request-id", "req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gopay_balance_body()))
        .expect(2)
        .mount(&server)
        .await;

    let (client, _) = gopay(&server);

    for _ in 0..2 {
        let balance = client.get_balance(GOPAY_WALLET, "req-1").await.unwrap();
        assert_eq!(balance.wallet_id, GOPAY_WALLET);
        assert_eq!(balance.balance, dec("250000"));
        assert_eq!(balance.currency, "IDR");
        assert!(balance.last_updated.is_some());
    }
}

#[tokio::test]
async fn unauthorized_triggers_one_refresh_and_one_retry() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "stale", 1).await;
    mount_token(&server, "/auth/token", "fresh", 1).await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gopay_balance_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens) = gopay(&server);

    let balance = client.get_balance(GOPAY_WALLET, "req-2").await.unwrap();
    assert_eq!(balance.balance, dec("250000"));
    assert!(tokens.has_token().await);
}

#[tokio::test]
async fn unauthorized_after_refresh_fails_and_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authentication"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "sp" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/wallet/balance"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let (client, tokens) = shopee_pay(&server);

    let err = client.get_balance(SHOPEE_WALLET, "req-3").await.unwrap_err();
    assert!(err.is_authentication(), "got {:?}", err);
    assert!(!tokens.has_token().await);
}

#[tokio::test]
async fn gopay_treats_forbidden_as_expired_token() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "stale", 1).await;
    mount_token(&server, "/auth/token", "fresh", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gopay_topup_body("SUCCESS")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = gopay(&server);

    let result = client
        .top_up(&top_up_request("50000", "TRX-1704067200-GPX"))
        .await
        .unwrap()
        .expect("top-up accepted");
    assert_eq!(result.provider_transaction_id, "GP-991");
    assert_eq!(result.status, TransactionStatus::Success);
}

#[tokio::test]
async fn shopee_pay_forbidden_is_not_a_token_problem() {
    let server = MockServer::start().await;
    mount_token(&server, "/authentication", "sp", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallet/balance"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens) = shopee_pay(&server);

    let err = client.get_balance(SHOPEE_WALLET, "req-4").await.unwrap_err();
    assert!(
        matches!(err, ProviderError::Rejected { status: 403, .. }),
        "got {:?}",
        err
    );
    assert!(tokens.has_token().await);
}

#[tokio::test]
async fn server_errors_are_retried_twice_then_fail() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "tok", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (client, _) = gopay(&server);

    let err = client
        .top_up(&top_up_request("50000", "TRX-1-GPX"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProviderError::Server { status: 503, .. }),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn transient_server_error_recovers() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "tok", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gopay_topup_body("COMPLETED")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = gopay(&server);

    let result = client
        .top_up(&top_up_request("50000", "TRX-2-GPX"))
        .await
        .unwrap();
    assert!(result.is_some());
}

#[tokio::test]
async fn business_rejection_returns_none() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "tok", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "message": "duplicate reference" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = gopay(&server);

    let result = client
        .top_up(&top_up_request("50000", "TRX-3-GPX"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn failed_provider_status_returns_none() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "tok", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gopay_topup_body("FAILED")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = gopay(&server);

    let result = client
        .top_up(&top_up_request("50000", "TRX-4-GPX"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn gopay_top_up_wire_format() {
    let server = MockServer::start().await;
    mount_token(&server, "/auth/token", "tok", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallets/topup"))
        .and(header("x-request-id", "TRX-1704067200-GPX"))
        .and(body_json(json!({
            "wallet_id": GOPAY_WALLET,
            "amount": 50000.0,
            "payment_method": "BANK_TRANSFER",
            "reference_id": "TRX-1704067200-GPX"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gopay_topup_body("PENDING")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = gopay(&server);

    let result = client
        .top_up(&top_up_request("50000", "TRX-1704067200-GPX"))
        .await
        .unwrap()
        .expect("top-up accepted");
    assert_eq!(result.status, TransactionStatus::Pending);
    assert_eq!(result.provider_status, "PENDING");
    assert_eq!(result.amount, dec("50000"));
}

#[tokio::test]
async fn shopee_pay_top_up_wire_format() {
    let server = MockServer::start().await;
    mount_token(&server, "/authentication", "sp", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallet/topup"))
        .and(header("authorization", "Bearer sp"))
        .and(body_json(json!({
            "user_id": SHOPEE_WALLET,
            "topup_amount": 25000,
            "source_type": "BANK_ACCOUNT",
            "request_id": "TRX-1704067200-SPX",
            "source_details": {
                "bank_code": "BNI",
                "account_number": "ACC-0001"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "SUCCESS",
            "request_id": "TRX-1704067200-SPX",
            "topup_details": {
                "transaction_id": "SP-5521",
                "amount": 25000.0,
                "status": "SUCCESS"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = shopee_pay(&server);

    let result = client
        .top_up(&ProviderTopUpRequest {
            wallet_id: SHOPEE_WALLET.to_string(),
            amount: dec("25000.00"),
            reference_id: "TRX-1704067200-SPX".to_string(),
            account_id: "ACC-0001".to_string(),
        })
        .await
        .unwrap()
        .expect("top-up accepted");
    assert_eq!(result.provider_transaction_id, "SP-5521");
    assert_eq!(result.status, TransactionStatus::Success);
}

#[tokio::test]
async fn shopee_pay_refuses_fractional_amounts_without_calling_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = shopee_pay(&server);

    let err = client
        .top_up(&top_up_request("100.50", "TRX-5-SPX"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProviderError::InvalidRequest { .. }),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn shopee_pay_balance_lookup() {
    let server = MockServer::start().await;
    mount_token(&server, "/authentication", "sp", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/wallet/balance"))
        .and(body_json(json!({
            "user_id": SHOPEE_WALLET,
            "request_id": "req-6",
            "include_details": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "SUCCESS",
            "request_id": "req-6",
            "balance_info": {
                "user_id": SHOPEE_WALLET,
                "available_balance": 80000.0,
                "pending_balance": 0.0,
                "currency_code": "IDR",
                "last_transaction_date": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = shopee_pay(&server);

    let balance = client.get_balance(SHOPEE_WALLET, "req-6").await.unwrap();
    assert_eq!(balance.balance, dec("80000"));
    assert_eq!(balance.currency, "IDR");
    assert!(balance.last_updated.is_none());
}
