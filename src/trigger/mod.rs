//! One-shot advertisement trigger
//!
//! Watches the running submission count and fires exactly once per session.
//! Deliberately an armed/fired machine rather than an equality check on the
//! count: duplicate deliveries and counters that jump past the threshold
//! must not produce a second activation.

/// Submissions before the trigger fires.
pub const DEFAULT_AD_THRESHOLD: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerState {
    Armed,
    Fired,
}

/// Threshold watcher over an externally supplied running count.
#[derive(Debug, Clone)]
pub struct AdTrigger {
    threshold: u64,
    state: TriggerState,
}

impl AdTrigger {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            state: TriggerState::Armed,
        }
    }

    /// Feed the current submission count. Returns true exactly once: the
    /// first call while armed with `count >= threshold`.
    pub fn advance(&mut self, count: u64) -> bool {
        match self.state {
            TriggerState::Armed if count >= self.threshold => {
                self.state = TriggerState::Fired;
                true
            }
            _ => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.state == TriggerState::Fired
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Re-arm for a new session.
    pub fn reset(&mut self) {
        self.state = TriggerState::Armed;
    }
}

impl Default for AdTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_AD_THRESHOLD)
    }
}
