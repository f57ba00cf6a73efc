//! Session accounting for token and energy savings
//!
//! Accumulates per-submission savings into session totals and derives the
//! scaled projections and the energy equivalence shown next to each answer.
//! The ledger lives for one session; it is reset only by an explicit
//! session start, never by a failed submission.

use crate::api::AnalysisResult;
use serde::{Deserialize, Serialize};

/// Scale applied to session energy before display, standing in for "what if
/// this many people optimized the same way".
const ENERGY_DISPLAY_SCALE: f64 = 10_000.0;

/// Reference appliance wattage for the "hours of use" equivalence (a small
/// LED bulb).
const APPLIANCE_WATTS: f64 = 6.0;

/// Estimated dollars per saved prompt token, GPT-3.5-class input pricing.
const DOLLARS_PER_TOKEN: f64 = 0.000_000_5;

/// Session totals. All fields start at zero and are monotonically
/// non-decreasing until the session is reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLedger {
    /// Sum of per-submission token savings, each clamped at zero.
    pub total_tokens_saved: u64,
    /// Sum of per-submission energy savings, in watts.
    pub total_energy_saved: f64,
    /// Number of submissions whose analysis completed.
    pub submission_count: u64,
}

/// Session savings scaled by a projection factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub tokens: u64,
    pub energy: f64,
}

/// Human-facing equivalence for the session's energy savings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyEquivalent {
    /// Nothing measurable saved yet. Rendered as a marker, never as
    /// "0.0 hours".
    Nothing,
    /// Hours a 6 W appliance could run on the scaled savings.
    ApplianceHours(f64),
}

impl std::fmt::Display for EnergyEquivalent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnergyEquivalent::Nothing => write!(f, "no measurable savings yet"),
            EnergyEquivalent::ApplianceHours(hours) => {
                write!(f, "{:.1} hours of a 6 W bulb", hours)
            }
        }
    }
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed analysis into the session totals.
    ///
    /// The saving is `original - optimized`, clamped at zero: the analyze
    /// collaborator's counts are not validated upstream, and a longer
    /// "optimized" prompt must not shrink the session total. Both
    /// accumulated fields update in the same call, so an observer holding
    /// the ledger never sees one without the other.
    pub fn record(&mut self, result: &AnalysisResult) {
        self.total_tokens_saved += result.tokens_saved();
        self.total_energy_saved += result.energy_saved_watts;
        self.submission_count += 1;
    }

    /// Scale the session totals for "if N prompts were optimized" displays.
    pub fn project(&self, factor: u64) -> Projection {
        Projection {
            tokens: self.total_tokens_saved * factor,
            energy: self.total_energy_saved * factor as f64,
        }
    }

    /// Map the session's energy savings to hours of reference-appliance
    /// use. Exactly zero reports the distinct zero-state variant.
    pub fn energy_equivalent(&self) -> EnergyEquivalent {
        let scaled = self.total_energy_saved * ENERGY_DISPLAY_SCALE;
        if scaled == 0.0 {
            EnergyEquivalent::Nothing
        } else {
            EnergyEquivalent::ApplianceHours(scaled / APPLIANCE_WATTS)
        }
    }

    /// Estimated money saved across the session, priced per saved token.
    pub fn cost_saved_dollars(&self) -> f64 {
        self.total_tokens_saved as f64 * DOLLARS_PER_TOKEN
    }

    /// Zero every field for a new session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Display for SessionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Session Savings ===")?;
        writeln!(f, "Submissions: {}", self.submission_count)?;
        writeln!(f, "Tokens saved: {}", self.total_tokens_saved)?;
        writeln!(f, "Energy saved: {:.4} W", self.total_energy_saved)?;
        writeln!(f, "Est. cost saved: ${:.6}", self.cost_saved_dollars())?;
        writeln!(f, "Equivalent: {}", self.energy_equivalent())?;
        Ok(())
    }
}

/// Share of the prompt's tokens removed by optimization, in [0, 100].
///
/// Defined as 0 when the original prompt had no tokens at all; an empty
/// submission saves nothing rather than dividing by zero.
pub fn percent_saved(result: &AnalysisResult) -> f64 {
    if result.original_tokens == 0 {
        return 0.0;
    }
    result.tokens_saved() as f64 / result.original_tokens as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(original: u64, optimized: u64, energy: f64) -> AnalysisResult {
        AnalysisResult {
            original_tokens: original,
            optimized_tokens: optimized,
            energy_saved_watts: energy,
            similarity_score_cosine: 0.9,
            similarity_score_gpt: 0.9,
            token_savings: None,
            token_savings_percentage: None,
            cost_saved_dollars: None,
        }
    }

    #[test]
    fn record_accumulates_clamped_savings() {
        let mut ledger = SessionLedger::new();
        ledger.record(&analysis(100, 60, 0.5));
        ledger.record(&analysis(50, 50, 0.25));
        // Inflated optimized count contributes zero tokens, not a negative.
        ledger.record(&analysis(10, 40, 0.25));

        assert_eq!(ledger.total_tokens_saved, 40);
        assert_eq!(ledger.total_energy_saved, 1.0);
        assert_eq!(ledger.submission_count, 3);
    }

    #[test]
    fn accumulation_is_order_independent() {
        let results = [
            analysis(100, 60, 0.25),
            analysis(80, 20, 0.5),
            analysis(5, 9, 0.125),
        ];

        let mut forward = SessionLedger::new();
        for r in &results {
            forward.record(r);
        }

        let mut reverse = SessionLedger::new();
        for r in results.iter().rev() {
            reverse.record(r);
        }

        assert_eq!(forward, reverse);
    }

    #[test]
    fn percent_saved_guards_division_by_zero() {
        assert_eq!(percent_saved(&analysis(0, 0, 0.0)), 0.0);
    }

    #[test]
    fn percent_saved_reports_share_of_original() {
        assert_eq!(percent_saved(&analysis(100, 60, 0.0)), 40.0);
        assert_eq!(percent_saved(&analysis(100, 100, 0.0)), 0.0);
    }

    #[test]
    fn project_scales_both_totals() {
        let mut ledger = SessionLedger::new();
        ledger.record(&analysis(100, 60, 0.5));

        let projection = ledger.project(1_000_000);
        assert_eq!(projection.tokens, 40_000_000);
        assert_eq!(projection.energy, 500_000.0);
    }

    #[test]
    fn empty_session_reports_zero_state_marker() {
        let ledger = SessionLedger::new();
        assert_eq!(ledger.energy_equivalent(), EnergyEquivalent::Nothing);
        assert_eq!(
            ledger.energy_equivalent().to_string(),
            "no measurable savings yet"
        );
    }

    #[test]
    fn energy_equivalent_divides_by_appliance_wattage() {
        let mut ledger = SessionLedger::new();
        ledger.record(&analysis(10, 5, 0.003));

        // 0.003 W * 10_000 = 30, over a 6 W appliance = 5 hours.
        match ledger.energy_equivalent() {
            EnergyEquivalent::ApplianceHours(hours) => {
                assert!((hours - 5.0).abs() < 1e-9)
            }
            other => panic!("expected hours, got {:?}", other),
        }
    }

    #[test]
    fn reset_zeroes_every_field() {
        let mut ledger = SessionLedger::new();
        ledger.record(&analysis(100, 60, 0.5));
        ledger.reset();
        assert_eq!(ledger, SessionLedger::default());
    }
}
