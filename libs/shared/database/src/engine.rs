use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Errors surfaced by the external scheduling engine.
///
/// Conflicts are structured: the engine returns 409 with a machine-readable
/// `code`, which callers branch on instead of inspecting error text.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("engine conflict: {code}")]
    Conflict { code: String, detail: Value },

    #[error("engine returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode engine response: {0}")]
    Decode(String),
}

impl EngineError {
    /// Explicit retryable classification. Transport-level failures and
    /// engine-side faults may be retried; everything else is a contract
    /// problem that retrying will not fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport(e) => e.is_timeout() || e.is_connect(),
            EngineError::Api { status, .. } => *status >= 500,
            EngineError::Conflict { .. } | EngineError::Decode(_) => false,
        }
    }
}

/// HTTP client for the externally-owned booking/validation engine.
pub struct EngineClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EngineClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.engine_url.clone(),
            api_key: config.engine_api_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, EngineError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making engine request to {}", url);

        let headers = self.get_headers(auth_token);

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            if status == StatusCode::CONFLICT {
                if let Ok(detail) = serde_json::from_str::<Value>(&text) {
                    if let Some(code) = detail.get("code").and_then(Value::as_str) {
                        debug!("Engine conflict: {}", code);
                        return Err(EngineError::Conflict {
                            code: code.to_string(),
                            detail,
                        });
                    }
                }
            }

            error!("Engine API error ({}): {}", status, text);
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let raw = response.text().await?;
        serde_json::from_str::<T>(&raw).map_err(|e| {
            error!("Failed to decode engine response: {}", e);
            EngineError::Decode(e.to_string())
        })
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
