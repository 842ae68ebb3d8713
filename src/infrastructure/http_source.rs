// HTTP metrics source - Reads health snapshots from the router's RPC endpoint
use crate::application::metrics_source::{MetricsSource, SourceError};
use crate::domain::snapshot::Snapshot;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpMetricsSource {
    pub fn new(
        base_url: &str,
        endpoint: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: Self::build_url(base_url, endpoint),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_url(base_url: &str, endpoint: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn transport_error(&self, e: reqwest::Error) -> SourceError {
        SourceError::Transport {
            url: self.url.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        let mut request = self
            .client
            .get(&self.url)
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        tracing::debug!("Fetched {} bytes from {}", body.len(), self.url);

        Snapshot::from_json(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }
}
