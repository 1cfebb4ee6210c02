// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod drive_task;
mod listener;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use ddc_app::{init_logging, normalize_name, ConfigFile};
use ddc_backend::{register_builtin_backends_on, RegistrationContext};
use ddc_core::drive::events::DriveListener;
use ddc_core::drive::ControlLimits;
use ddc_core::link::handshake::{LinkFault, LinkState};
use ddc_core::{DriveRequest, DynResult, MotorId, RunStatus, TickSnapshot};

use config::ServerConfig;
use drive_task::DriveTaskConfig;

const PKG_DESCRIPTION: &str = concat!(
    env!("CARGO_PKG_NAME"),
    " - differential drive control daemon"
);
const DRIVE_TASK_CHANNEL_BUFFER: usize = 32;

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Bench backend to use (e.g. sim)
    #[arg(short = 'b', long = "backend")]
    backend: Option<String>,
    /// IP address for the JSON TCP listener
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the JSON TCP listener
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
}

/// Journals drive transitions for operators tailing the log.
struct TraceListener;

impl DriveListener for TraceListener {
    fn on_run_change(&self, old: RunStatus, new: RunStatus) {
        info!("run: {} -> {}", old, new);
    }

    fn on_link_change(&self, old: LinkState, new: LinkState) {
        info!("link: {} -> {}", old, new);
    }

    fn on_control_enabled_change(&self, old: bool, new: bool) {
        info!("closed-loop control: {} -> {}", old, new);
    }

    fn on_limit_change(&self, motor: MotorId, old: f64, new: f64) {
        info!("limit {}: {} -> {}", motor, old, new);
    }

    fn on_setpoint_change(&self, old: i64, new: i64) {
        info!("setpoint: {} -> {} pulses", old, new);
    }

    fn on_gain_change(&self, old: f64, new: f64) {
        info!("gain: {} -> {}", old, new);
    }

    fn on_fault(&self, fault: &LinkFault) {
        warn!("fault: {}", fault);
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        (ServerConfig::load_from_file(path)?, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let mut registry = RegistrationContext::new();
    register_builtin_backends_on(&mut registry);

    let backend = normalize_name(
        &cli.backend
            .clone()
            .or_else(|| cfg.drive.backend.clone())
            .unwrap_or_else(|| "sim".to_string()),
    );
    if !registry.is_backend_registered(&backend) {
        return Err(format!(
            "Unknown bench backend: {} (available: {})",
            backend,
            registry.registered_backends().join(", ")
        )
        .into());
    }
    let access = cfg
        .drive
        .access
        .to_bench_access()
        .map_err(|e| format!("Invalid [drive.access] configuration: {}", e))?;

    info!(
        "Starting ddc-server (backend: {}, access: {:?})",
        backend, access
    );

    let task_config = DriveTaskConfig {
        registry: Arc::new(registry),
        backend,
        access,
        pulses_per_rev: cfg.drive.pulses_per_rev,
        gain: cfg.drive.gain,
        limits: ControlLimits {
            max_a: cfg.limits.max_a,
            max_b: cfg.limits.max_b,
        },
        listeners: vec![Arc::new(TraceListener) as Arc<dyn DriveListener>],
        prebuilt_bench: None,
    };

    let (tx, rx) = mpsc::channel::<DriveRequest>(DRIVE_TASK_CHANNEL_BUFFER);
    let (snap_tx, snap_rx) = watch::channel(TickSnapshot::empty());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut drive_handle = tokio::spawn(drive_task::run_drive_task(
        task_config,
        rx,
        snap_tx,
        shutdown_rx,
    ));

    let listener_handle = if cfg.listen.enabled {
        let listen_ip = cli.listen.unwrap_or(cfg.listen.listen);
        let listen_port = cli.port.unwrap_or(cfg.listen.port);
        let listen_addr = SocketAddr::from((listen_ip, listen_port));
        let drive_tx = tx.clone();
        let listener_snap_rx = snap_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = listener::run_listener(listen_addr, drive_tx, listener_snap_rx).await {
                error!("Listener error: {:?}", e);
            }
        }))
    } else {
        None
    };

    let finished = tokio::select! {
        signal = signal::ctrl_c() => {
            signal?;
            info!("Ctrl+C received, shutting down");
            let _ = shutdown_tx.send(true);
            drop(tx);
            None
        }
        result = &mut drive_handle => Some(result),
    };
    let drive_result = match finished {
        Some(result) => result,
        None => drive_handle.await,
    };

    if let Some(handle) = listener_handle {
        handle.abort();
        let _ = handle.await;
    }

    // The drive task ending with an error is fatal, e.g. the bench could
    // not be constructed. Every invariant downstream assumes the hardware
    // collaborators exist, so bail out.
    drive_result??;
    Ok(())
}
