//! Request bodies for the collaborator endpoints

use super::OptimizationResult;
use serde::{Deserialize, Serialize};

/// Body of `POST /optimize-prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub prompt: String,
}

impl OptimizeRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Body of `POST /analyze`.
///
/// Carries the prompt pair and both answers so the collaborator can score
/// token counts, energy, and answer similarity in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub original_prompt: String,
    pub optimized_prompt: String,
    pub original_answer: String,
    pub optimized_answer: String,
}

impl AnalyzeRequest {
    /// Build the analyze body from a submission's prompt and its
    /// optimization outcome.
    pub fn from_submission(prompt: &str, result: &OptimizationResult) -> Self {
        Self {
            original_prompt: prompt.to_string(),
            optimized_prompt: result.optimized_prompt.clone(),
            original_answer: result.original_answer.clone(),
            optimized_answer: result.optimized_answer.clone(),
        }
    }
}
