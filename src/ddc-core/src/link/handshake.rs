// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sequence-token handshake validation.
//!
//! The microcontroller increments the token it receives and sends it back
//! with the next reply. A reply is valid iff the returned token is exactly
//! one ahead of the sent token (mod 2^32) and carries `Success`. Anything
//! else desynchronizes the link until an external start command re-arms it.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::{masked, token_hex, ExchangeReply, WireStatus, TOKEN_MASK};

/// Host-side view of the bus link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    /// No active run; exchanges are skipped entirely.
    Idle,
    /// Start was requested; the next exchange sends token 0.
    AwaitingFirst,
    /// Last exchange validated.
    Synchronized,
    /// Last exchange failed; outputs are fail-safed until the next start.
    Desynchronized,
}

impl LinkState {
    /// Wire status sent alongside the token while in this state.
    pub fn wire_status(self) -> WireStatus {
        match self {
            LinkState::Idle => WireStatus::Nop,
            LinkState::AwaitingFirst => WireStatus::Initial,
            LinkState::Synchronized => WireStatus::Success,
            LinkState::Desynchronized => WireStatus::Error,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Idle => write!(f, "Idle"),
            LinkState::AwaitingFirst => write!(f, "AwaitingFirst"),
            LinkState::Synchronized => write!(f, "Synchronized"),
            LinkState::Desynchronized => write!(f, "Desynchronized"),
        }
    }
}

/// Fault raised by a failed exchange.
#[derive(Debug, Clone, Error)]
pub enum LinkFault {
    #[error("token desync: sent {sent:#010X}, received {received:#010X} with status {status:?}")]
    Desync {
        sent: u64,
        received: u64,
        status: WireStatus,
    },
    #[error("bus transport fault: {0}")]
    Transport(String),
}

/// What a staged exchange puts on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeAttempt {
    pub token: u64,
    pub status: WireStatus,
}

/// Owns the sequence token and link status across cycles.
#[derive(Debug, Clone)]
pub struct HandshakeLink {
    state: LinkState,
    token: u64,
}

impl Default for HandshakeLink {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeLink {
    pub fn new() -> Self {
        Self {
            state: LinkState::Idle,
            token: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The stored token, always masked to its wire-significant bits.
    pub fn token(&self) -> u64 {
        masked(self.token)
    }

    pub fn token_hex(&self) -> String {
        token_hex(self.token)
    }

    /// Arm the link for a new run. The token is not touched here; it is
    /// forced to zero by [`prepare`] on the first exchange.
    pub fn begin_run(&mut self) {
        self.state = LinkState::AwaitingFirst;
    }

    /// Put the link to rest; subsequent [`prepare`] calls return `None`.
    pub fn go_idle(&mut self) {
        self.state = LinkState::Idle;
    }

    pub fn clear_token(&mut self) {
        self.token = 0;
    }

    /// Stage the next exchange. Returns `None` while the link is idle, in
    /// which case no bus traffic may happen this cycle.
    pub fn prepare(&mut self) -> Option<ExchangeAttempt> {
        if self.state == LinkState::Idle {
            return None;
        }
        if self.state == LinkState::AwaitingFirst {
            self.token = 0;
        }
        Some(ExchangeAttempt {
            token: masked(self.token),
            status: self.state.wire_status(),
        })
    }

    /// Validate the reply for the attempt staged by [`prepare`].
    ///
    /// On success the link synchronizes, adopts the received token, and the
    /// raw encoder totals are handed back for position tracking. On failure
    /// the stored token is left untouched so diagnostics can relate the next
    /// attempt to the last known-good exchange.
    pub fn accept(
        &mut self,
        sent_token: u64,
        reply: &ExchangeReply,
    ) -> Result<(i64, i64), LinkFault> {
        let sent = masked(sent_token);
        let received = masked(reply.token);
        let delta = received.wrapping_sub(sent) & TOKEN_MASK;
        if delta == 1 && reply.status == WireStatus::Success {
            self.state = LinkState::Synchronized;
            self.token = received;
            Ok((reply.total_a, reply.total_b))
        } else {
            self.state = LinkState::Desynchronized;
            Err(LinkFault::Desync {
                sent,
                received,
                status: reply.status,
            })
        }
    }

    /// Record a transport failure. The stored token is left untouched; the
    /// next cycle retries with it unless a start command intervenes.
    pub fn fault(&mut self) {
        self.state = LinkState::Desynchronized;
    }
}
