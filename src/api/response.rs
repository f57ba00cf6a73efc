//! Response bodies for the collaborator endpoints

use serde::{Deserialize, Serialize};

/// Outcome of one `POST /optimize-prompt` call.
///
/// Owned by the pipeline for the duration of one submission and superseded
/// wholesale by the next submission's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    /// The trimmed prompt the service actually answered with.
    pub optimized_prompt: String,
    /// Answer to the optimized prompt.
    pub optimized_answer: String,
    /// Answer to the unmodified prompt, for side-by-side comparison.
    pub original_answer: String,
    /// Whether the service answered from its prompt cache. Older service
    /// builds omit the field.
    #[serde(default)]
    pub is_cached: bool,
}

/// Outcome of one `POST /analyze` call.
///
/// The collaborator does not validate its own output; run [`sanitize`]
/// before trusting token counts or scores.
///
/// [`sanitize`]: AnalysisResult::sanitize
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Token count of the original prompt.
    pub original_tokens: u64,
    /// Token count of the optimized prompt.
    pub optimized_tokens: u64,
    /// Energy saved by answering the shorter prompt, in watts.
    pub energy_saved_watts: f64,
    /// Embedding cosine similarity of the two answers, in [0, 1].
    pub similarity_score_cosine: f64,
    /// LLM-judged similarity of the two answers, in [0, 1].
    #[serde(rename = "similarityScoreGPT")]
    pub similarity_score_gpt: f64,

    /// Advisory fields some service builds include. The ledger recomputes
    /// savings itself and never trusts these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_savings: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_savings_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_saved_dollars: Option<f64>,
}

impl AnalysisResult {
    /// Clamp out-of-range collaborator output in place.
    ///
    /// Returns true when anything was adjusted: an optimized token count
    /// above the original count, a similarity score outside [0, 1], or a
    /// negative energy figure.
    pub fn sanitize(&mut self) -> bool {
        let mut adjusted = false;

        if self.optimized_tokens > self.original_tokens {
            self.optimized_tokens = self.original_tokens;
            adjusted = true;
        }

        for score in [
            &mut self.similarity_score_cosine,
            &mut self.similarity_score_gpt,
        ] {
            if score.is_nan() {
                *score = 0.0;
                adjusted = true;
            } else if !(0.0..=1.0).contains(score) {
                *score = score.clamp(0.0, 1.0);
                adjusted = true;
            }
        }

        if self.energy_saved_watts < 0.0 || self.energy_saved_watts.is_nan() {
            self.energy_saved_watts = 0.0;
            adjusted = true;
        }

        adjusted
    }

    /// Tokens saved by this submission, clamped at zero.
    pub fn tokens_saved(&self) -> u64 {
        self.original_tokens.saturating_sub(self.optimized_tokens)
    }
}
