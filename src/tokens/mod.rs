//! Local token counting
//!
//! The analyze collaborator reports the authoritative counts; this module
//! gives the client a preview before submitting, using the same cl100k
//! encoding family the service counts with.

use tiktoken_rs::{cl100k_base, CoreBPE};

/// Counts tokens locally with a bundled BPE encoder.
pub struct TokenEstimator {
    bpe: CoreBPE,
}

impl TokenEstimator {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            bpe: cl100k_base()?,
        })
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Cheap fallback estimate (~4 characters per token) for when building the
/// BPE tables is not worth it.
pub fn estimate(text: &str) -> usize {
    text.len() / 4
}
