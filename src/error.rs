use reqwest::StatusCode;
use thiserror::Error;

/// Raised when the upstream client cannot be constructed.
///
/// Only the ingestion half of the service depends on it; the API keeps
/// serving stored data without an upstream.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("invalid value for {key}")]
    InvalidHeader {
        key: &'static str,
        #[source]
        source: reqwest::header::InvalidHeaderValue,
    },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// A failed call to the VRM API. Logged by the client and surfaced to the
/// ingestion cycle as "no data".
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A failed read or write against the time-series store.
#[derive(Debug, Error)]
#[error("storage fault")]
pub struct StorageFault(#[from] pub sqlx::Error);

/// Why a manual refresh did not run to completion.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("VRM client not configured")]
    NotConfigured,

    #[error(transparent)]
    Storage(#[from] StorageFault),
}

/// Why a history read was not served.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("hours must be between {min} and {max}, got {requested}")]
    HoursOutOfRange { requested: i64, min: i64, max: i64 },

    #[error(transparent)]
    Storage(#[from] StorageFault),
}
