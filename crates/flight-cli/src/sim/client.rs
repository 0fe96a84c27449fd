//! HTTP client for the flight server tick endpoint.

use anyhow::{bail, Context, Result};
use flight_core::{FlightProfile, Point3};
use reqwest::Client;
use serde::Serialize;

/// Body of one `POST /compute`.
#[derive(Debug, Clone, Serialize)]
pub struct TickPayload {
    pub test: String,
    pub vehicle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<FlightProfile>,
    pub current: Point3,
    pub emergency_stop: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Point3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lidar_below_drone: Option<Vec<Vec<f64>>>,
}

pub struct TickClient {
    client: Client,
    url: String,
}

impl TickClient {
    /// `base_url` is the server root, e.g. `http://localhost:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}/compute", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one tick and return the commanded position.
    pub async fn send(&self, payload: &TickPayload) -> Result<Point3> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .context("Failed to reach flight server")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Tick rejected ({}): {}", status, body);
        }

        response
            .json::<Point3>()
            .await
            .context("Failed to parse commanded position")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_up_ticks_omit_targets_and_lidar() {
        let payload = TickPayload {
            test: "3DA".to_string(),
            vehicle: "default".to_string(),
            profile: None,
            current: Point3::new(1.0, 2.0, 3.0),
            emergency_stop: false,
            targets: Vec::new(),
            lidar_below_drone: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["test"], "3DA");
        assert_eq!(value["current"]["y"], 2.0);
        assert!(value.get("targets").is_none());
        assert!(value.get("lidar_below_drone").is_none());
        assert!(value.get("profile").is_none());
    }

    #[test]
    fn url_points_at_compute() {
        assert_eq!(TickClient::new("http://localhost:5000/").url(), "http://localhost:5000/compute");
    }
}
