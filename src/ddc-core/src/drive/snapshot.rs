// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-cycle observable state record.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::link::token_hex;

/// Immutable record published to observers once per cycle.
///
/// Identity is the cycle counter alone: two snapshots are equal iff their
/// counters are equal, and ordering follows the counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Cycle counter; wraps to 1, never 0 after the first cycle.
    pub counter: u64,
    /// Measured cycle duration in seconds, fixed to three decimals.
    pub cycle_time: f64,
    /// Hex form of the low 32 bits of the sequence token.
    pub token: String,
    /// Cumulative position of motor A in encoder pulses.
    pub position_a: i64,
    /// Cumulative position of motor B in encoder pulses.
    pub position_b: i64,
    /// Last commanded output for motor A, in [-1, 1].
    pub output_a: f64,
    /// Last commanded output for motor B, in [-1, 1].
    pub output_b: f64,
}

impl TickSnapshot {
    /// Placeholder published before the first cycle fires.
    pub fn empty() -> Self {
        Self {
            counter: 0,
            cycle_time: 0.0,
            token: token_hex(0),
            position_a: 0,
            position_b: 0,
            output_a: 0.0,
            output_b: 0.0,
        }
    }
}

impl Default for TickSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for TickSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.counter == other.counter
    }
}

impl Eq for TickSnapshot {}

impl PartialOrd for TickSnapshot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TickSnapshot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter.cmp(&other.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_the_counter() {
        let mut first = TickSnapshot::empty();
        first.counter = 7;
        first.position_a = 100;
        let mut second = TickSnapshot::empty();
        second.counter = 7;
        second.position_a = -5;
        assert_eq!(first, second);

        second.counter = 8;
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = TickSnapshot::empty();
        assert_eq!(snap.counter, 0);
        assert_eq!(snap.token, "0");
        assert_eq!(snap.cycle_time, 0.0);
    }
}
