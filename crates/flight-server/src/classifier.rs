//! HTTP client for an external terrain classifier.

use crate::backoff::Backoff;
use flight_core::{HeightGrid, LidarSample, Point3, TerrainVerdict};
use reqwest::Client;
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned HTTP {0}")]
    Status(u16),
    #[error("classifier backing off after {failures} failures")]
    BackingOff { failures: u32 },
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    origin: Point3,
    grid: &'a HeightGrid,
}

pub struct RemoteClassifier {
    client: Client,
    url: String,
    timeout: Duration,
    backoff: Mutex<Backoff>,
}

impl RemoteClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_backoff(
            url,
            timeout,
            Backoff::new(Duration::from_millis(500), Duration::from_secs(30)),
        )
    }

    pub fn with_backoff(url: impl Into<String>, timeout: Duration, backoff: Backoff) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
            backoff: Mutex::new(backoff),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask for a verdict on `sample`. Skips the call while backing off.
    pub async fn classify(
        &self,
        sample: &LidarSample,
        now: Instant,
    ) -> Result<TerrainVerdict, ClassifierError> {
        if let Ok(backoff) = self.backoff.lock() {
            if !backoff.ready_at(now) {
                return Err(ClassifierError::BackingOff {
                    failures: backoff.failures(),
                });
            }
        }

        let result = self.request(sample).await;
        if let Ok(mut backoff) = self.backoff.lock() {
            match &result {
                Ok(_) => backoff.succeed(),
                Err(err) => {
                    let delay = backoff.fail_at(now);
                    tracing::warn!(
                        "Classifier at {} failed ({}), retrying in {:?}",
                        self.url,
                        err,
                        delay
                    );
                }
            }
        }
        result
    }

    async fn request(&self, sample: &LidarSample) -> Result<TerrainVerdict, ClassifierError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&ClassifyRequest {
                origin: sample.origin,
                grid: &sample.grid,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }
        Ok(response.json::<TerrainVerdict>().await?)
    }
}
