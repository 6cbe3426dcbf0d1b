//! Host clock. Owns simulation time, the step cap and the step counter.

use crate::types::SimTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub time:  SimTime,
    /// Largest step the host integrator takes on its own.
    pub dtmax: f64,
    pub steps: u64,
}

impl SimClock {
    pub fn new(time: SimTime, dtmax: f64) -> Self {
        assert!(dtmax > 0.0, "dtmax must be positive");
        Self { time, dtmax, steps: 0 }
    }

    /// Advance by `dt`. Returns the new time.
    pub fn advance(&mut self, dt: f64) -> SimTime {
        debug_assert!(dt > 0.0, "advance() with non-positive dt {dt}");
        self.time += dt;
        self.steps += 1;
        self.time
    }

    /// Advance to exactly `target`, which must lie ahead of the clock.
    pub fn advance_to(&mut self, target: SimTime) -> SimTime {
        debug_assert!(target > self.time, "advance_to() backwards: {target} <= {}", self.time);
        self.time = target;
        self.steps += 1;
        self.time
    }
}
