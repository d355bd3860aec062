use service_core::error::AppError;
use thiserror::Error;

use crate::models::PaymentMethod;

/// Failure of an outbound call to an e-wallet provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Token fetch failed, or the provider still refused the request after a
    /// token refresh.
    #[error("{provider} authentication failed: {reason}")]
    Authentication {
        provider: PaymentMethod,
        reason: String,
    },

    /// 5xx that outlived the retry budget.
    #[error("{provider} returned server error {status}")]
    Server { provider: PaymentMethod, status: u16 },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: PaymentMethod,
        #[source]
        source: reqwest::Error,
    },

    /// 4xx on a call where a rejection is not an expected business outcome.
    #[error("{provider} rejected the request with status {status}")]
    Rejected {
        provider: PaymentMethod,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unreadable response: {reason}")]
    InvalidResponse {
        provider: PaymentMethod,
        reason: String,
    },

    /// The request cannot be expressed in the provider's wire format.
    #[error("{provider} cannot accept request: {reason}")]
    InvalidRequest {
        provider: PaymentMethod,
        reason: String,
    },
}

impl ProviderError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, ProviderError::Authentication { .. })
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Authentication { .. } => AppError::ProviderAuth(err.into()),
            ProviderError::Rejected { status: 404, .. } => AppError::NotFound(err.into()),
            ProviderError::Rejected { .. } | ProviderError::InvalidRequest { .. } => {
                AppError::BadRequest(err.into())
            }
            ProviderError::Server { .. }
            | ProviderError::Transport { .. }
            | ProviderError::InvalidResponse { .. } => AppError::BadGateway(err.to_string()),
        }
    }
}
