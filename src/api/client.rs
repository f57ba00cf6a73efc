//! reqwest-backed client for the optimize and analyze collaborators

use super::{
    AnalysisResult, AnalyzeRequest, AnalyzeService, ApiConfig, ApiError, OptimizationResult,
    OptimizeRequest, OptimizeService,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the TokenTerminator service, implementing both
/// collaborator traits against one base URL.
pub struct HttpCollaborator {
    config: ApiConfig,
    client: Client,
}

impl HttpCollaborator {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(%url, "posting to collaborator");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Rejected { status, message });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl OptimizeService for HttpCollaborator {
    async fn optimize(&self, prompt: &str) -> Result<OptimizationResult, ApiError> {
        self.post_json("optimize-prompt", &OptimizeRequest::new(prompt))
            .await
    }
}

#[async_trait]
impl AnalyzeService for HttpCollaborator {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, ApiError> {
        self.post_json("analyze", request).await
    }
}
