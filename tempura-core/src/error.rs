//! Failure taxonomy for the weather client.
//!
//! Providers report raw outcomes as [`FetchFailure`]; [`classify`] turns them
//! into the closed set of [`AppError`] values the rest of the app deals with.

use thiserror::Error;

/// Wait applied when a 429 response carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// What went wrong talking to the provider, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// No response at all: DNS, connect, TLS, or the request timed out.
    Transport { timed_out: bool, detail: String },
    /// The provider answered with a non-success status.
    Status {
        status: u16,
        retry_after: Option<u64>,
        body: String,
    },
    /// Success status, but the body could not be parsed.
    Decode { status: u16, detail: String },
}

impl FetchFailure {
    pub fn timed_out(detail: impl Into<String>) -> Self {
        Self::Transport {
            timed_out: true,
            detail: detail.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::Status {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => None,
            Self::Status { status, .. } | Self::Decode { status, .. } => Some(*status),
        }
    }
}

/// Every failure the weather client can return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Location not found")]
    LocationNotFound,

    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Network unavailable")]
    NetworkUnavailable,

    #[error("Weather service error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("Unexpected weather service response: {detail}")]
    Unknown { status: Option<u16>, detail: String },
}

impl AppError {
    /// What the user can do about it.
    pub fn remediation(&self) -> String {
        match self {
            Self::InvalidApiKey => "Check your OpenWeatherMap API key (run `tempura configure`). \
                 New keys can take up to 15 minutes to activate."
                .to_string(),
            Self::LocationNotFound => "Try another spelling or the \"City, Country\" format, \
                 e.g. \"Paris, FR\" or \"Portland, US\"."
                .to_string(),
            Self::RateLimited { retry_after_secs } => format!(
                "Too many requests. Wait {retry_after_secs} seconds before refreshing."
            ),
            Self::NetworkUnavailable => {
                "Could not reach the weather service. Check your internet connection.".to_string()
            }
            Self::ServerError { status } => format!(
                "The weather service is having trouble (HTTP {status}). Try again in a few minutes."
            ),
            Self::Unknown { status: Some(status), .. } => format!(
                "Unexpected response (HTTP {status}). Run with --verbose for details."
            ),
            Self::Unknown { status: None, .. } => {
                "Unexpected response. Run with --verbose for details.".to_string()
            }
        }
    }

    /// Whether trying again later can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::NetworkUnavailable | Self::ServerError { .. }
        )
    }

    /// Minimum wait before the next attempt, if the provider asked for one.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => {
                Some(std::time::Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }
}

/// Map a raw provider outcome to its [`AppError`]. Pure and total.
pub fn classify(failure: &FetchFailure) -> AppError {
    match failure {
        FetchFailure::Transport { .. } => AppError::NetworkUnavailable,
        FetchFailure::Status { status: 401, .. } => AppError::InvalidApiKey,
        FetchFailure::Status { status: 404, .. } => AppError::LocationNotFound,
        FetchFailure::Status {
            status: 429,
            retry_after,
            ..
        } => AppError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        FetchFailure::Status {
            status: status @ 500..=599,
            ..
        } => AppError::ServerError { status: *status },
        FetchFailure::Status { status, body, .. } => AppError::Unknown {
            status: Some(*status),
            detail: if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.clone()
            },
        },
        FetchFailure::Decode { status, detail } => AppError::Unknown {
            status: Some(*status),
            detail: detail.clone(),
        },
    }
}

/// Parse a `Retry-After` header given in delta-seconds. HTTP-date values are
/// not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}
