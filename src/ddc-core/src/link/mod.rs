// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wire vocabulary for the cycle-bus handshake.
//!
//! The host exchanges one request/response pair with the microcontroller per
//! cycle pulse. Every message carries a sequence token and a status; the
//! response additionally carries the two raw cumulative encoder totals.

use serde::{Deserialize, Serialize};

pub mod handshake;

/// Only the low 32 bits of the sequence token are significant on the wire.
pub const TOKEN_MASK: u64 = 0xFFFF_FFFF;

/// Mask a token down to its wire-significant bits.
pub fn masked(token: u64) -> u64 {
    token & TOKEN_MASK
}

/// Uppercase hex rendering of the wire-significant token bits.
pub fn token_hex(token: u64) -> String {
    format!("{:X}", masked(token))
}

/// Status vocabulary shared between host and microcontroller.
///
/// - `Nop`: no communication (before the first start)
/// - `Initial`: first exchange of a run, host sends token 0
/// - `Success`: previous exchange was acknowledged
/// - `Error`: token or status mismatch on either side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireStatus {
    Nop,
    Initial,
    Success,
    Error,
}

impl WireStatus {
    /// Single-byte wire encoding of the status.
    pub fn code(self) -> u8 {
        match self {
            WireStatus::Nop => 0,
            WireStatus::Initial => 1,
            WireStatus::Success => 2,
            WireStatus::Error => 3,
        }
    }

    /// Decode a status byte; unknown codes map to `Error`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => WireStatus::Nop,
            1 => WireStatus::Initial,
            2 => WireStatus::Success,
            _ => WireStatus::Error,
        }
    }
}

/// One response frame from the microcontroller: the next sequence token,
/// its status, and the raw cumulative encoder totals of both motors.
///
/// The totals are directly subtractable cumulative counts; no wraparound
/// correction is applied on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReply {
    pub token: u64,
    pub status: WireStatus,
    pub total_a: i64,
    pub total_b: i64,
}
