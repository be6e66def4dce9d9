use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::{ApiVariant, ImportSource, FETCH_TIMEOUT_SECS};
use crate::fetch_error::FetchError;

/// HTTP client for the WTT3 timetable API.
///
/// One fetcher serves both protocol variants; callers pick the method
/// matching the deployment's [`ApiVariant`]. A bearer credential is attached
/// to every request when one is configured.
#[derive(Clone)]
pub struct TimetableFetcher {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    variant: ApiVariant,
}

impl TimetableFetcher {
    pub fn new(source: &ImportSource) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: source.base_url.trim_end_matches('/').to_string(),
            api_key: source.api_key.clone(),
            variant: source.variant,
        }
    }

    pub fn variant(&self) -> ApiVariant {
        self.variant
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch reservations from the ranged REST endpoint.
    ///
    /// Bounds are optional; omitted bounds are simply not sent, letting the
    /// server apply its own window.
    #[instrument(skip(self))]
    pub async fn fetch_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}/reservations", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(start) = start {
            request = request.query(&[("start", start.to_rfc3339())]);
        }
        if let Some(end) = end {
            request = request.query(&[("end", end.to_rfc3339())]);
        }

        debug!("Fetching reservations from {}", url);
        self.fetch_records(request, &url).await
    }

    /// Fetch one calendar day's schedule from the day-feed endpoint.
    ///
    /// The feed addresses days as `dd_mm_yyyy` and returns a flat list mixing
    /// reservation and non-reservation entries; filtering happens downstream.
    #[instrument(skip(self), fields(day = %day))]
    pub async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}/scheduleDateDetail", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("date", day.format("%d_%m_%Y").to_string())]);

        debug!("Fetching day feed from {}", url);
        self.fetch_records(request, &url).await
    }

    async fn fetch_records(
        &self,
        mut request: RequestBuilder,
        url: &str,
    ) -> Result<Vec<Value>, FetchError> {
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("Received HTTP response with status: {}", status);

        if status.as_u16() == 404 {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if status.is_server_error() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidBody(e.to_string()))?;

        let records = unwrap_envelope(body);
        debug!("Fetched {} records", records.len());
        Ok(records)
    }
}

/// Flatten the three body shapes the API has been observed to return:
/// a bare list, a single object, or a pagination envelope with the list
/// under `results`.
pub fn unwrap_envelope(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![Value::Object(map)],
        },
        other => {
            warn!("Response body is not a JSON object or array: {}", other);
            Vec::new()
        }
    }
}
