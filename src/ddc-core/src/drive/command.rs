// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use super::MotorId;

/// Internal command handled by the drive task.
#[derive(Debug, Clone)]
pub enum DriveCommand {
    GetSnapshot,
    /// Arm the loop; the next exchange restarts the token sequence.
    Start,
    /// Disarm the loop, clear tracking, force outputs to zero.
    Stop,
    /// Clear tracking and zero the token without changing run status.
    Reset,
    /// Stop and release the hardware bench.
    Shutdown,
    SetControlEnabled(bool),
    SetLimit {
        motor: MotorId,
        value: f64,
    },
    /// Destination in revolutions; converted to a pulse setpoint.
    SetDestination(f64),
    SetGain(f64),
    /// Direct actuator path; bypasses the output gate.
    SetManualOutput {
        motor: MotorId,
        value: f64,
    },
}
