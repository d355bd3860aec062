use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub gopay: GopayConfig,
    pub shopee_pay: ShopeePayConfig,
    pub provider_http: ProviderHttpConfig,
    pub events: EventsConfig,
    pub jwt: JwtConfig,
    pub observability: ObservabilityConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GopayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub signature: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ShopeePayConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub api_key: Secret<String>,
    pub signature: Secret<String>,
}

/// Timeouts applied to every outbound provider call.
#[derive(Deserialize, Clone, Debug)]
pub struct ProviderHttpConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ProviderHttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct EventsConfig {
    pub transaction_topic: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct JwtConfig {
    /// HS256 secret. When unset, the subject is read without signature
    /// verification and the upstream gateway is trusted to have verified it.
    pub secret: Option<Secret<String>>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{} must be set", name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = optional("PAYMENT_GATEWAY_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parsed_or("PAYMENT_GATEWAY_PORT", 8080u16)?;

        let db_url = required("PAYMENT_DATABASE_URL")?;
        let max_connections = parsed_or("PAYMENT_DATABASE_MAX_CONNECTIONS", 10u32)?;

        let redis_url =
            optional("PAYMENT_REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string());

        let gopay = GopayConfig {
            base_url: required("GOPAY_BASE_URL")?,
            client_id: required("GOPAY_CLIENT_ID")?,
            client_secret: Secret::new(required("GOPAY_CLIENT_SECRET")?),
            signature: Secret::new(required("GOPAY_SIGNATURE")?),
        };

        let shopee_pay = ShopeePayConfig {
            base_url: required("SHOPEE_PAY_BASE_URL")?,
            merchant_id: required("SHOPEE_PAY_MERCHANT_ID")?,
            api_key: Secret::new(required("SHOPEE_PAY_API_KEY")?),
            signature: Secret::new(required("SHOPEE_PAY_SIGNATURE")?),
        };

        let provider_http = ProviderHttpConfig {
            request_timeout: Duration::from_millis(parsed_or("PROVIDER_TIMEOUT_MS", 10_000u64)?),
            connect_timeout: Duration::from_millis(parsed_or(
                "PROVIDER_CONNECT_TIMEOUT_MS",
                3_000u64,
            )?),
        };

        let transaction_topic = optional("TRANSACTION_EVENTS_TOPIC")
            .unwrap_or_else(|| "transaction-events".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
            },
            redis: RedisConfig {
                url: Secret::new(redis_url),
            },
            gopay,
            shopee_pay,
            provider_http,
            events: EventsConfig { transaction_topic },
            jwt: JwtConfig {
                secret: optional("JWT_SECRET").map(Secret::new),
            },
            observability: ObservabilityConfig {
                log_level: optional("LOG_LEVEL")
                    .unwrap_or_else(|| "info,payment_gateway=debug".to_string()),
                otlp_endpoint: optional("OTLP_ENDPOINT"),
            },
            service_name: "payment-gateway".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_or_falls_back_to_default() {
        assert_eq!(
            parsed_or("PAYMENT_GATEWAY_TEST_UNSET_VARIABLE", 42u16).unwrap(),
            42
        );
    }

    #[test]
    fn test_required_reports_variable_name() {
        let err = required("PAYMENT_GATEWAY_TEST_MISSING_VARIABLE").unwrap_err();
        assert!(err
            .to_string()
            .contains("PAYMENT_GATEWAY_TEST_MISSING_VARIABLE must be set"));
    }
}
