// libs/scheduling-cell/src/services/forecast.rs
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use reqwest::Method;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{EngineClient, EngineError};

use crate::models::{SchedulingError, WeekDemand};

/// Expected-demand feed, keyed by ISO week. Purely informational for the
/// operator; it never filters or ranks slot results.
pub struct ForecastService {
    engine: Arc<EngineClient>,
}

impl ForecastService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: Arc::new(EngineClient::new(config)),
        }
    }

    pub fn with_engine(engine: Arc<EngineClient>) -> Self {
        Self { engine }
    }

    pub async fn demand_for_week(
        &self,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<WeekDemand, SchedulingError> {
        let iso = date.iso_week();
        let path = format!(
            "/api/v1/slots/forecast?year={}&week={}",
            iso.year(),
            iso.week()
        );
        debug!("Fetching week demand: {}", path);

        self.engine
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| match e {
                EngineError::Decode(msg) => SchedulingError::MalformedResponse(msg),
                other => SchedulingError::EngineError(other.to_string()),
            })
    }
}
