// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod client;
pub mod drive;
pub mod link;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use client::{ClientCommand, ClientResponse};
pub use drive::command::DriveCommand;
pub use drive::request::DriveRequest;
pub use drive::response::{DriveError, DriveResult};
pub use drive::snapshot::TickSnapshot;
pub use drive::state::{DriveState, RunStatus};
pub use drive::MotorId;
pub use link::handshake::{HandshakeLink, LinkFault, LinkState};
