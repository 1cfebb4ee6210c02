// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Output gate between the controller and the actuator.
//!
//! Fail-safe wins over everything: any handshake or transport failure zeroes
//! both outputs no matter what the controller computed. With the link healthy
//! but closed-loop control disabled, computed outputs are discarded rather
//! than applied; manual outputs travel a separate direct path that never
//! passes through this gate.

use super::{quantize, ControlOutput, OUTPUT_SCALE};

/// Decide what actually reaches the actuator.
///
/// The gate does not re-clamp (the controller owns clamping) but it
/// substitutes zero for a missing component.
pub fn apply(output: &ControlOutput, control_enabled: bool, fail_safe: bool) -> (f64, f64) {
    let zero = quantize(0.0, OUTPUT_SCALE);
    if fail_safe || !control_enabled {
        return (zero, zero);
    }
    (output.a.unwrap_or(zero), output.b.unwrap_or(zero))
}
