use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine_url: String,
    pub engine_api_key: String,
    pub request_timeout_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            engine_url: env::var("SCHEDULING_ENGINE_URL")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULING_ENGINE_URL not set, using empty value");
                    String::new()
                }),
            engine_api_key: env::var("SCHEDULING_ENGINE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULING_ENGINE_API_KEY not set, using empty value");
                    String::new()
                }),
            request_timeout_seconds: env::var("ENGINE_REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.engine_url.is_empty() && !self.engine_api_key.is_empty()
    }
}
