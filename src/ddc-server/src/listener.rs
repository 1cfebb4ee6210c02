// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON-over-TCP listener for ddc-server.
//!
//! Accepts client connections speaking line-delimited `ClientCommand` /
//! `ClientResponse` JSON defined in `ddc-core::client`.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, info};

use ddc_core::{ClientCommand, ClientResponse, DriveCommand, DriveRequest, TickSnapshot};

/// Run the JSON TCP listener, accepting client connections.
pub async fn run_listener(
    addr: SocketAddr,
    drive_tx: mpsc::Sender<DriveRequest>,
    snap_rx: watch::Receiver<TickSnapshot>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Client connected: {}", peer);

        let tx = drive_tx.clone();
        let srx = snap_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, peer, tx, srx).await {
                error!("Client {} error: {:?}", peer, e);
            }
        });
    }
}

fn client_to_drive(cmd: ClientCommand) -> DriveCommand {
    match cmd {
        ClientCommand::GetState => DriveCommand::GetSnapshot,
        ClientCommand::Start => DriveCommand::Start,
        ClientCommand::Stop => DriveCommand::Stop,
        ClientCommand::Reset => DriveCommand::Reset,
        ClientCommand::Shutdown => DriveCommand::Shutdown,
        ClientCommand::SetControlEnabled { enabled } => DriveCommand::SetControlEnabled(enabled),
        ClientCommand::SetLimit { motor, value } => DriveCommand::SetLimit { motor, value },
        ClientCommand::SetDestination { turns } => DriveCommand::SetDestination(turns),
        ClientCommand::SetGain { gain } => DriveCommand::SetGain(gain),
        ClientCommand::SetManualOutput { motor, value } => {
            DriveCommand::SetManualOutput { motor, value }
        }
    }
}

async fn write_response(
    writer: &mut (impl AsyncWriteExt + Unpin),
    resp: &ClientResponse,
) -> std::io::Result<()> {
    let line = serde_json::to_string(resp)? + "\n";
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    tx: mpsc::Sender<DriveRequest>,
    snap_rx: watch::Receiver<TickSnapshot>,
) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            info!("Client {} disconnected", addr);
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let cmd = match serde_json::from_str::<ClientCommand>(trimmed) {
            Ok(cmd) => cmd,
            Err(e) => {
                error!("Invalid JSON from {}: {} / {:?}", addr, trimmed, e);
                let resp = ClientResponse {
                    success: false,
                    state: None,
                    error: Some(format!("Invalid JSON: {}", e)),
                };
                write_response(&mut writer, &resp).await?;
                continue;
            }
        };

        let drive_cmd = client_to_drive(cmd);

        // Fast path: serve GetSnapshot straight from the watch channel so
        // clients get an answer even while the drive task is mid-cycle.
        if matches!(drive_cmd, DriveCommand::GetSnapshot) {
            let snapshot = snap_rx.borrow().clone();
            let resp = ClientResponse {
                success: true,
                state: Some(snapshot),
                error: None,
            };
            write_response(&mut writer, &resp).await?;
            continue;
        }

        let (resp_tx, resp_rx) = oneshot::channel();
        let req = DriveRequest {
            cmd: drive_cmd,
            respond_to: resp_tx,
        };

        if let Err(e) = tx.send(req).await {
            error!("Failed to send request to drive task: {:?}", e);
            let resp = ClientResponse {
                success: false,
                state: None,
                error: Some("Internal error: drive task not available".into()),
            };
            write_response(&mut writer, &resp).await?;
            continue;
        }

        let resp = match resp_rx.await {
            Ok(Ok(snapshot)) => ClientResponse {
                success: true,
                state: Some(snapshot),
                error: None,
            },
            Ok(Err(err)) => ClientResponse {
                success: false,
                state: None,
                error: Some(err.0),
            },
            Err(e) => {
                error!("Drive response oneshot recv error: {:?}", e);
                ClientResponse {
                    success: false,
                    state: None,
                    error: Some("Internal error waiting for drive response".into()),
                }
            }
        };
        write_response(&mut writer, &resp).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddc_core::MotorId;

    #[test]
    fn test_client_commands_map_onto_drive_commands() {
        assert!(matches!(
            client_to_drive(ClientCommand::Start),
            DriveCommand::Start
        ));
        assert!(matches!(
            client_to_drive(ClientCommand::SetDestination { turns: 2.0 }),
            DriveCommand::SetDestination(turns) if turns == 2.0
        ));
        assert!(matches!(
            client_to_drive(ClientCommand::SetManualOutput {
                motor: MotorId::B,
                value: -0.25,
            }),
            DriveCommand::SetManualOutput {
                motor: MotorId::B,
                value,
            } if value == -0.25
        ));
    }
}
