//! Render REST client.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use backlog_core::{BoxFuture, FleetApi};

use crate::error::{RenderError, RenderResult};

pub const DEFAULT_BASE_URL: &str = "https://api.render.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the fleet-management API.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub base_url: String,
    pub service_id: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl RenderConfig {
    pub fn new(service_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            service_id: service_id.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderConfig")
            .field("base_url", &self.base_url)
            .field("service_id", &self.service_id)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResponse {
    service_details: Option<ServiceDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDetails {
    num_instances: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScaleRequest {
    num_instances: u32,
}

/// Reads and resizes one Render service.
#[derive(Debug)]
pub struct RenderClient {
    http: Client,
    config: RenderConfig,
}

impl RenderClient {
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .user_agent(concat!("backlogd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    fn service_url(&self) -> String {
        format!(
            "{}/services/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.service_id
        )
    }

    /// Current `numInstances` of the service.
    pub async fn get_instance_count(&self) -> RenderResult<u32> {
        let url = self.service_url();
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(RenderError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let service: ServiceResponse = resp.json().await?;
        let count = service
            .service_details
            .and_then(|d| d.num_instances)
            .ok_or(RenderError::MissingInstanceCount)?;

        if !(1.0..=f64::from(u32::MAX)).contains(&count) {
            return Err(RenderError::InvalidInstanceCount(count));
        }

        debug!(%url, count, "fetched service instance count");
        Ok(count as u32)
    }

    /// Ask Render to scale the service to `instances`.
    pub async fn scale(&self, instances: u32) -> RenderResult<()> {
        let url = format!("{}/scale", self.service_url());
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&ScaleRequest {
                num_instances: instances,
            })
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::ACCEPTED {
            let body = resp.text().await.unwrap_or_default();
            return Err(RenderError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!(%url, instances, "scale request accepted");
        Ok(())
    }
}

impl FleetApi for RenderClient {
    fn current_instances(&self) -> BoxFuture<'_, anyhow::Result<u32>> {
        Box::pin(async move { Ok(self.get_instance_count().await?) })
    }

    fn resize(&self, instances: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { Ok(self.scale(instances).await?) })
    }
}
