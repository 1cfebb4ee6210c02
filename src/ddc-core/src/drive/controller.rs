// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Builtin proportional position controller.
//!
//! Both motors are driven toward the shared pulse setpoint. The output of
//! each motor is the position error scaled by the gain, clamped to the
//! magnitude of that motor's limit.

use super::{quantize, ControlLimits, ControlOutput, PositionControl, OUTPUT_SCALE};

pub struct ProportionalControl {
    gain: f64,
}

impl ProportionalControl {
    pub fn new(gain: f64) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f64) {
        self.gain = gain;
    }

    fn output_for(&self, setpoint: i64, position: i64, limit: f64) -> f64 {
        let error = (setpoint - position) as f64;
        let bound = limit.abs();
        quantize((self.gain * error).clamp(-bound, bound), OUTPUT_SCALE)
    }
}

impl PositionControl for ProportionalControl {
    fn compute(
        &mut self,
        setpoint: i64,
        position_a: i64,
        position_b: i64,
        limits: &ControlLimits,
    ) -> ControlOutput {
        ControlOutput {
            a: Some(self.output_for(setpoint, position_a, limits.max_a)),
            b: Some(self.output_for(setpoint, position_b, limits.max_b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_proportional_to_error() {
        let mut ctl = ProportionalControl::new(0.01);
        let limits = ControlLimits {
            max_a: 1.0,
            max_b: 1.0,
        };
        let out = ctl.compute(50, 0, 25, &limits);
        assert_eq!(out.a, Some(0.5));
        assert_eq!(out.b, Some(0.25));
    }

    #[test]
    fn test_output_clamps_to_limit_magnitude() {
        let mut ctl = ProportionalControl::new(1.0);
        let limits = ControlLimits {
            max_a: 0.6,
            max_b: -0.4,
        };
        let out = ctl.compute(1000, 0, 2000, &limits);
        assert_eq!(out.a, Some(0.6));
        // Negative limits bound by magnitude; error below setpoint drives
        // backwards, clamped at -0.4.
        assert_eq!(out.b, Some(-0.4));
    }

    #[test]
    fn test_zero_gain_holds_still() {
        let mut ctl = ProportionalControl::new(0.0);
        let limits = ControlLimits {
            max_a: 1.0,
            max_b: 1.0,
        };
        let out = ctl.compute(500, 0, 0, &limits);
        assert_eq!(out.a, Some(0.0));
        assert_eq!(out.b, Some(0.0));
    }

    #[test]
    fn test_output_is_quantized() {
        let mut ctl = ProportionalControl::new(0.0001);
        let limits = ControlLimits {
            max_a: 1.0,
            max_b: 1.0,
        };
        let out = ctl.compute(1234, 0, 0, &limits);
        assert_eq!(out.a, Some(0.123));
    }

    #[test]
    fn test_gain_is_adjustable() {
        let mut ctl = ProportionalControl::new(0.0);
        ctl.set_gain(0.5);
        assert_eq!(ctl.gain(), 0.5);
    }
}
