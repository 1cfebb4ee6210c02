// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::drive::snapshot::TickSnapshot;
use crate::drive::MotorId;

/// Command received from network clients (JSON).
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    GetState,
    Start,
    Stop,
    Reset,
    Shutdown,
    SetControlEnabled { enabled: bool },
    SetLimit { motor: MotorId, value: f64 },
    SetDestination { turns: f64 },
    SetGain { gain: f64 },
    SetManualOutput { motor: MotorId, value: f64 },
}

/// Response sent to network clients over TCP.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientResponse {
    pub success: bool,
    pub state: Option<TickSnapshot>,
    pub error: Option<String>,
}
