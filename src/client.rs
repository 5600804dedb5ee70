//! Client for the front-end's public API

use crate::common::{encode_name, Error, Result};
use crate::partition::integrity::HealthReport;
use crate::web::GlobalTally;
use reqwest::{Response, StatusCode};
use std::time::Duration;

pub struct TallyClient {
    http: reqwest::Client,
    base_url: String,
}

impl TallyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Global tally across all reachable partitions
    pub async fn tally(&self) -> Result<GlobalTally> {
        let response = self
            .http
            .get(format!("{}/api/votes", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check(response).await?;
        response.json().await.map_err(transport_error)
    }

    pub async fn vote(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .put(format!("{}/api/votes/{}", self.base_url, encode_name(name)))
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/api/votes/{}", self.base_url, encode_name(name)))
            .send()
            .await
            .map_err(transport_error)?;
        check(response).await?;
        Ok(())
    }

    /// Latest integrity report of the partition at `partition_url`
    pub async fn partition_health(&self, partition_url: &str) -> Result<HealthReport> {
        let response = self
            .http
            .get(format!("{}/health", partition_url.trim_end_matches('/')))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check(response).await?;
        response.json().await.map_err(transport_error)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(body),
        StatusCode::BAD_REQUEST => Error::InvalidInput(body),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::REQUEST_TIMEOUT => {
            Error::ServiceUnavailable(body)
        }
        _ => Error::Http(format!("{}: {}", status, body)),
    })
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::ServiceUnavailable(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
