//! REST client for the dashboard backend.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;
use crate::settings::{SettingsBackend, SettingsDocument};

const SETTINGS_PATH: &str = "/api/settings/";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("settings backend unavailable: {0}")]
    Unavailable(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct SettingsEnvelope {
    #[serde(default)]
    settings_data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct SettingsPayload<'a> {
    settings_data: &'a SettingsDocument,
}

/// Settings endpoints over HTTP with token authentication.
#[derive(Debug, Clone)]
pub struct HttpSettingsBackend {
    client: Client,
    base_url: String,
}

impl HttpSettingsBackend {
    pub fn from_config(config: &AppConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.auth_token.as_deref() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Token {token}"))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl SettingsBackend for HttpSettingsBackend {
    fn fetch(&self) -> ApiResult<Option<Value>> {
        let response = self.client.get(self.url(SETTINGS_PATH)).send()?;
        let response = ensure_success(response)?;
        let envelope: SettingsEnvelope = response.json()?;
        Ok(envelope.settings_data.filter(|data| !data.is_null()))
    }

    fn push(&self, settings: &SettingsDocument) -> ApiResult<()> {
        let response = self
            .client
            .patch(self.url(SETTINGS_PATH))
            .json(&SettingsPayload {
                settings_data: settings,
            })
            .send()?;
        ensure_success(response)?;
        Ok(())
    }
}

/// Stands in when the HTTP client cannot be built; every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SettingsBackend for UnavailableBackend {
    fn fetch(&self) -> ApiResult<Option<Value>> {
        Err(ApiError::Unavailable(self.reason.clone()))
    }

    fn push(&self, _settings: &SettingsDocument) -> ApiResult<()> {
        Err(ApiError::Unavailable(self.reason.clone()))
    }
}

fn ensure_success(
    response: reqwest::blocking::Response,
) -> ApiResult<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_trims_trailing_slash_from_base_url() {
        let config = AppConfig {
            api_base_url: "http://localhost:8000/".to_string(),
            auth_token: Some("demo-token".to_string()),
            ..AppConfig::default()
        };
        let backend = HttpSettingsBackend::from_config(&config).unwrap();
        assert_eq!(
            backend.url(SETTINGS_PATH),
            "http://localhost:8000/api/settings/"
        );
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let config = AppConfig {
            auth_token: Some("bad\ntoken".to_string()),
            ..AppConfig::default()
        };
        let err = HttpSettingsBackend::from_config(&config).unwrap_err();
        assert!(matches!(err, ApiError::InvalidHeader(_)));
    }

    #[test]
    fn unavailable_backend_fails_every_call() {
        let backend = UnavailableBackend::new("invalid header value");
        assert!(matches!(
            backend.fetch().unwrap_err(),
            ApiError::Unavailable(reason) if reason == "invalid header value"
        ));
        assert!(matches!(
            backend.push(&SettingsDocument::default()).unwrap_err(),
            ApiError::Unavailable(_)
        ));
    }

    #[test]
    fn payload_wraps_full_document() {
        let document = SettingsDocument::default();
        let payload = serde_json::to_value(SettingsPayload {
            settings_data: &document,
        })
        .unwrap();
        assert_eq!(payload["settings_data"]["security"]["sessionTimeout"], 30);
        assert_eq!(payload["settings_data"]["appearance"]["theme"], "system");
    }

    #[test]
    fn envelope_tolerates_missing_settings_data() {
        let envelope: SettingsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.settings_data.is_none());

        let envelope: SettingsEnvelope =
            serde_json::from_str(r#"{"settings_data": {"appearance": {"theme": "dark"}}}"#)
                .unwrap();
        assert_eq!(
            envelope.settings_data.unwrap()["appearance"]["theme"],
            "dark"
        );
    }
}
