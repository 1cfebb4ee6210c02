// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Mutable drive state owned by the drive task.

use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::link::handshake::HandshakeLink;

use super::snapshot::TickSnapshot;
use super::tracker::AxleTracking;
use super::{pulses_from_turns, quantize, ControlLimits, CYCLE_TIME_SCALE, OUTPUT_SCALE};

/// Whether the control loop is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Stopped,
    Running,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Stopped => write!(f, "Stopped"),
            RunStatus::Running => write!(f, "Running"),
        }
    }
}

/// All state mutated by the drive task. A single task owns an instance;
/// the command surface reaches it only through the request queue.
#[derive(Debug)]
pub struct DriveState {
    pub run: RunStatus,
    pub link: HandshakeLink,
    pub tracking: AxleTracking,
    /// Cycle counter; wraps to 1, never 0 after the first cycle.
    pub counter: u64,
    /// Last measured cycle duration in seconds.
    pub cycle_time: f64,
    /// Last gated outputs, as sent to the actuator.
    pub output_a: f64,
    pub output_b: f64,
    /// Destination in revolutions, as supplied by the command surface.
    pub destination_turns: f64,
    /// Target cumulative position in pulses.
    pub setpoint_pulses: i64,
    pub limits: ControlLimits,
    pub control_enabled: bool,
    pub pulses_per_rev: u32,
    last_edge: Option<Instant>,
}

impl DriveState {
    pub fn new(pulses_per_rev: u32) -> Self {
        let zero = quantize(0.0, OUTPUT_SCALE);
        Self {
            run: RunStatus::Stopped,
            link: HandshakeLink::new(),
            tracking: AxleTracking::new(),
            counter: 0,
            cycle_time: 0.0,
            output_a: zero,
            output_b: zero,
            destination_turns: 0.0,
            setpoint_pulses: 0,
            limits: ControlLimits::default(),
            control_enabled: false,
            pulses_per_rev,
            last_edge: None,
        }
    }

    /// Advance the cycle counter, wrapping to 1 so it never reads 0 again
    /// after the first cycle.
    pub fn advance_counter(&mut self) {
        self.counter = match self.counter.checked_add(1) {
            Some(next) => next,
            None => 1,
        };
    }

    /// Record a cycle edge and return the measured duration since the
    /// previous one. The first edge after startup has no reference and
    /// measures 0.0.
    pub fn measure_cycle(&mut self, now: Instant) -> f64 {
        let elapsed = match self.last_edge {
            Some(past) => now.duration_since(past).as_secs_f64(),
            None => 0.0,
        };
        self.last_edge = Some(now);
        self.cycle_time = quantize(elapsed, CYCLE_TIME_SCALE);
        self.cycle_time
    }

    /// Derive the pulse setpoint from a destination in revolutions.
    /// Tracking state is not touched.
    pub fn set_destination(&mut self, turns: f64) -> i64 {
        self.destination_turns = turns;
        self.setpoint_pulses = pulses_from_turns(turns, self.pulses_per_rev);
        self.setpoint_pulses
    }

    /// Zero the tracking histories and outputs at fixed precision.
    /// Setpoint and limits are deliberately left alone.
    pub fn clear_tracking(&mut self) {
        let zero = quantize(0.0, OUTPUT_SCALE);
        self.tracking.reset();
        self.output_a = zero;
        self.output_b = zero;
    }

    /// Produce the observable record for the current cycle.
    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot {
            counter: self.counter,
            cycle_time: self.cycle_time,
            token: self.link.token_hex(),
            position_a: self.tracking.a.position(),
            position_b: self.tracking.b.position(),
            output_a: self.output_a,
            output_b: self.output_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_counter_wraps_to_one() {
        let mut state = DriveState::new(6);
        state.counter = u64::MAX;
        state.advance_counter();
        assert_eq!(state.counter, 1);
        state.advance_counter();
        assert_eq!(state.counter, 2);
    }

    #[test]
    fn test_first_cycle_measures_zero() {
        let mut state = DriveState::new(6);
        let now = Instant::now();
        assert_eq!(state.measure_cycle(now), 0.0);
        let later = now + Duration::from_millis(250);
        assert_eq!(state.measure_cycle(later), 0.25);
    }

    #[test]
    fn test_destination_to_setpoint() {
        let mut state = DriveState::new(6);
        assert_eq!(state.set_destination(2.5), 15);
        assert_eq!(state.destination_turns, 2.5);
        assert_eq!(state.set_destination(-1.1), -7);
    }

    #[test]
    fn test_clear_tracking_keeps_configuration() {
        let mut state = DriveState::new(6);
        state.set_destination(3.0);
        state.limits.max_a = 0.7;
        state.tracking.update(10, 10);
        state.output_a = 0.5;

        state.clear_tracking();
        assert_eq!(state.tracking.a.position(), 0);
        assert_eq!(state.output_a, 0.0);
        assert_eq!(state.setpoint_pulses, 18);
        assert_eq!(state.limits.max_a, 0.7);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut state = DriveState::new(6);
        state.advance_counter();
        state.tracking.update(4, 2);
        let snap = state.snapshot();
        assert_eq!(snap.counter, 1);
        assert_eq!(snap.token, "0");
        assert_eq!(snap.position_a, 0);
        assert_eq!(snap.position_b, 0);
    }
}
