// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Incremental position tracking from directionless encoder totals.
//!
//! The encoder counters only ever count pulses; they carry no direction
//! signal. Direction is attributed from the output that was in effect while
//! the pulses accrued, which is the output issued one cycle earlier: the
//! sign used for integration lags the measured delta by exactly one cycle.

use super::{quantize, OUTPUT_SCALE};

/// Two-slot history of raw totals and issued outputs, plus the signed
/// position accumulator, for one motor.
#[derive(Debug, Clone)]
pub struct MotorTracker {
    /// `[previous, current]` raw cumulative encoder totals.
    totals: [i64; 2],
    /// `[previous, current]` issued output fractions.
    outputs: [f64; 2],
    position: i64,
}

impl Default for MotorTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorTracker {
    pub fn new() -> Self {
        Self {
            totals: [0, 0],
            outputs: [quantize(0.0, OUTPUT_SCALE); 2],
            position: 0,
        }
    }

    /// Cumulative signed position in encoder pulses.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// The output issued on the most recent cycle.
    pub fn last_output(&self) -> f64 {
        self.outputs[1]
    }

    /// `(previous, current)` raw totals.
    pub fn totals(&self) -> (i64, i64) {
        (self.totals[0], self.totals[1])
    }

    /// Fold a fresh raw total into the history and advance the position
    /// accumulator. Must only be called after a validated exchange.
    ///
    /// The totals and outputs shift down one slot, the delta is plain
    /// subtraction (the counter is trusted to be directly subtractable),
    /// and the sign comes from the *previous* output slot, the output
    /// that was driving the motor while this delta was measured.
    pub fn update(&mut self, raw_total: i64) -> i64 {
        self.totals[0] = self.totals[1];
        self.totals[1] = raw_total;
        self.outputs[0] = self.outputs[1];

        let delta = self.totals[1] - self.totals[0];
        let sign = if self.outputs[0] > 0.0 {
            1
        } else if self.outputs[0] < 0.0 {
            -1
        } else {
            0
        };
        self.position += sign * delta;
        self.position
    }

    /// Record the output commanded this cycle. Becomes the integration sign
    /// for the delta measured on the next cycle.
    pub fn record_output(&mut self, output: f64) {
        self.outputs[1] = output;
    }

    pub fn reset(&mut self) {
        self.totals = [0, 0];
        self.outputs = [quantize(0.0, OUTPUT_SCALE); 2];
        self.position = 0;
    }
}

/// Tracking state for both motors of the axle.
#[derive(Debug, Clone, Default)]
pub struct AxleTracking {
    pub a: MotorTracker,
    pub b: MotorTracker,
}

impl AxleTracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold both raw totals in; returns the updated positions.
    pub fn update(&mut self, raw_a: i64, raw_b: i64) -> (i64, i64) {
        (self.a.update(raw_a), self.b.update(raw_b))
    }

    pub fn record_outputs(&mut self, output_a: f64, output_b: f64) {
        self.a.record_output(output_a);
        self.b.record_output(output_b);
    }

    pub fn reset(&mut self) {
        self.a.reset();
        self.b.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_has_no_direction() {
        // No output was ever issued, so the delta of the very first
        // exchange cannot be attributed a direction.
        let mut tracking = AxleTracking::new();
        let (pos_a, pos_b) = tracking.update(5, 3);
        assert_eq!((pos_a, pos_b), (0, 0));
        assert_eq!(tracking.a.totals(), (0, 5));
        assert_eq!(tracking.b.totals(), (0, 3));
    }

    #[test]
    fn test_position_advances_with_previous_sign() {
        let mut motor = MotorTracker::new();
        motor.update(5);
        motor.record_output(1.0);
        // delta 10, previous output +1.0
        assert_eq!(motor.update(15), 10);
        assert_eq!(motor.position(), 10);
    }

    #[test]
    fn test_sign_lags_one_cycle() {
        let mut motor = MotorTracker::new();
        motor.update(0);
        motor.record_output(-0.5);
        // The new cycle's output is +0.8, but the measured delta accrued
        // while -0.5 was driving: position must move by -10, not +10.
        assert_eq!(motor.update(10), -10);
        motor.record_output(0.8);
        assert_eq!(motor.update(20), 0);
        assert_eq!(motor.position(), 0);
    }

    #[test]
    fn test_zero_output_freezes_position() {
        let mut motor = MotorTracker::new();
        motor.update(0);
        motor.record_output(0.0);
        assert_eq!(motor.update(100), 0);
    }

    #[test]
    fn test_negative_delta_is_not_corrected() {
        // The counter source is trusted; a shrinking total is integrated
        // as-is rather than treated as wraparound.
        let mut motor = MotorTracker::new();
        motor.update(50);
        motor.record_output(1.0);
        assert_eq!(motor.update(40), -10);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut tracking = AxleTracking::new();
        tracking.update(5, 3);
        tracking.record_outputs(0.4, -0.4);
        tracking.update(9, 9);

        tracking.reset();
        let first = format!("{:?}", tracking);
        tracking.reset();
        assert_eq!(format!("{:?}", tracking), first);
        assert_eq!(tracking.a.position(), 0);
        assert_eq!(tracking.a.totals(), (0, 0));
        assert_eq!(tracking.a.last_output(), 0.0);
    }
}
