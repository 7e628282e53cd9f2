//! Clock subscription handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one run of periodic ticks.
///
/// The engine mints a new subscription every time it starts counting down,
/// so a tick carrying an older subscription is recognisably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TickSubscription(u64);

impl TickSubscription {
    pub fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TickSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick#{}", self.0)
    }
}

/// Identifies one scheduled wakeup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WakeupToken(u64);

impl WakeupToken {
    pub fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WakeupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wakeup#{}", self.0)
    }
}

/// Delivery from a clock back to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// One second elapsed for this subscription
    Tick(TickSubscription),

    /// A delay scheduled with this token ran out
    Wakeup(WakeupToken),
}
