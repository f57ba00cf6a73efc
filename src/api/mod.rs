//! Collaborator interfaces for the optimize and analyze services
//!
//! The core never implements optimization or similarity scoring itself; it
//! consumes the output of two HTTP collaborators and treats their internals
//! as opaque.

mod client;
mod request;
mod response;

pub use client::HttpCollaborator;
pub use request::{AnalyzeRequest, OptimizeRequest};
pub use response::{AnalysisResult, OptimizationResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure: the collaborator could not be reached.
    /// Timeouts surface here as ordinary failures of the call.
    #[error("collaborator unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered with a non-2xx status.
    #[error("collaborator rejected the request ({status}): {message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The collaborator answered 2xx but the body could not be decoded.
    #[error("undecodable collaborator response: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection settings for the collaborator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service exposing `/optimize-prompt` and `/analyze`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 60,
        }
    }
}

/// The optimize collaborator: rewrites a prompt and answers both variants.
#[async_trait]
pub trait OptimizeService: Send + Sync {
    async fn optimize(&self, prompt: &str) -> Result<OptimizationResult, ApiError>;
}

/// The analyze collaborator: scores an optimization outcome.
#[async_trait]
pub trait AnalyzeService: Send + Sync {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, ApiError>;
}
