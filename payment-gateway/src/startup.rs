//! Application wiring and server lifecycle.

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::middleware::SubjectVerifier;
use crate::providers::{
    build_http_client, default_provider_retry, GopayClient, ProviderCredentials, ShopeePayClient,
    TokenManager, WalletProvider,
};
use crate::services::{
    AccountService, Database, PgAccountRepository, PgUserRepository, RedisCache,
    RedisStreamTransport, SideEffectCoordinator, TopUpService, TransactionPublisher,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub top_ups: Arc<TopUpService>,
    pub verifier: Arc<SubjectVerifier>,
}

impl AsRef<SubjectVerifier> for AppState {
    fn as_ref(&self) -> &SubjectVerifier {
        &self.verifier
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/payment/account", get(handlers::account::get_account))
        .route("/api/payment/balance", get(handlers::account::get_balance))
        .route(
            "/api/payment/wallet",
            get(handlers::payment::get_wallet_balance),
        )
        .route("/api/payment/wallet/topup", post(handlers::payment::top_up))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let database = Database::connect(
            config.database.url.expose_secret(),
            config.database.max_connections,
        )
        .await?;
        database.run_migrations().await?;

        let cache = RedisCache::connect(config.redis.url.expose_secret())
            .await
            .map_err(AppError::InternalError)?;
        let transport = RedisStreamTransport::new(cache.connection());

        let publisher = Arc::new(TransactionPublisher::new(
            Arc::new(transport),
            config.events.transaction_topic.clone(),
        ));
        let cache = Arc::new(cache);

        let http = build_http_client(&config.provider_http).map_err(|e| {
            tracing::error!("Failed to build provider HTTP client: {}", e);
            AppError::ConfigError(e.into())
        })?;

        let gopay_tokens = Arc::new(TokenManager::new(
            http.clone(),
            config.gopay.base_url.clone(),
            ProviderCredentials::from(&config.gopay),
        ));
        let shopee_tokens = Arc::new(TokenManager::new(
            http.clone(),
            config.shopee_pay.base_url.clone(),
            ProviderCredentials::from(&config.shopee_pay),
        ));

        let providers: Vec<Arc<dyn WalletProvider>> = vec![
            Arc::new(GopayClient::new(
                http.clone(),
                config.gopay.base_url.clone(),
                gopay_tokens,
                default_provider_retry(),
            )),
            Arc::new(ShopeePayClient::new(
                http,
                config.shopee_pay.base_url.clone(),
                shopee_tokens,
                default_provider_retry(),
            )),
        ];

        let users = Arc::new(PgUserRepository::new(&database));
        let accounts = Arc::new(PgAccountRepository::new(&database));

        let account_service = Arc::new(AccountService::new(
            users.clone(),
            accounts.clone(),
            cache.clone(),
        ));
        let side_effects = Arc::new(SideEffectCoordinator::new(
            account_service.clone(),
            cache,
            publisher,
        ));

        let state = AppState {
            accounts: account_service,
            top_ups: Arc::new(TopUpService::new(users, accounts, providers, side_effects)),
            verifier: Arc::new(SubjectVerifier::new(config.jwt.secret.as_ref())),
        };

        // Port 0 binds a random port for tests.
        let addr = SocketAddr::new(
            config.server.host.parse().map_err(|e: std::net::AddrParseError| {
                AppError::ConfigError(anyhow::anyhow!("Invalid host {}: {}", config.server.host, e))
            })?,
            config.server.port,
        );
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        tracing::info!(port = self.port, "Payment gateway listening");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
