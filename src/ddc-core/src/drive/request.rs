// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use tokio::sync::oneshot;

use crate::{DriveCommand, DriveResult, TickSnapshot};

/// Request sent to the drive task.
#[derive(Debug)]
pub struct DriveRequest {
    pub cmd: DriveCommand,
    pub respond_to: oneshot::Sender<DriveResult<TickSnapshot>>,
}
