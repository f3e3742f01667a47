pub mod models;

use std::{sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde_json::Value;
use tracing::{debug, error};

use crate::{
    config::VrmSettings,
    error::{ConfigurationError, UpstreamError},
};

/// Client for the Victron VRM REST API.
///
/// Holds a single `reqwest::Client` (and its TLS context) for the lifetime
/// of the process; clones share it. The access token is read once, at
/// construction, and sent on every request.
#[derive(Debug, Clone)]
pub struct VrmClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    installation_id: String,
}

impl VrmClient {
    /// Fails fast when the token or installation id is missing or blank.
    pub fn new(settings: &VrmSettings) -> Result<Self, ConfigurationError> {
        let token = non_blank(settings.token.as_deref())
            .ok_or(ConfigurationError::MissingSetting("VRM_TOKEN"))?;
        let installation_id = non_blank(settings.installation_id.as_deref())
            .ok_or(ConfigurationError::MissingSetting("VRM_INSTALLATION_ID"))?;

        let mut auth = HeaderValue::from_str(&format!("Token {token}")).map_err(|source| {
            ConfigurationError::InvalidHeader {
                key: "VRM_TOKEN",
                source,
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-authorization", auth);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ConfigurationError::HttpClient)?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: settings.base_url.trim_end_matches('/').to_owned(),
                installation_id: installation_id.to_owned(),
            }),
        })
    }

    pub fn installation_id(&self) -> &str {
        &self.inner.installation_id
    }

    /// Fetch the installation's diagnostics payload.
    ///
    /// Upstream failures are logged and reported as `None`; they never
    /// propagate past the client.
    pub async fn get_diagnostics(&self) -> Option<Value> {
        match self.try_get_diagnostics().await {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!(
                    installation_id = %self.inner.installation_id,
                    error = ?e,
                    "Failed to fetch VRM diagnostics"
                );
                None
            }
        }
    }

    /// Fallible variant of [`get_diagnostics`](Self::get_diagnostics).
    pub async fn try_get_diagnostics(&self) -> Result<Value, UpstreamError> {
        let url = format!(
            "{}/installations/{}/diagnostics",
            self.inner.base_url, self.inner.installation_id
        );
        debug!(url = %url, "Fetching VRM diagnostics");

        let response = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| UpstreamError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status { url, status });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Request {
                url: url.clone(),
                source,
            })?;

        serde_json::from_slice::<Value>(&bytes).map_err(|source| UpstreamError::Decode { url, source })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
