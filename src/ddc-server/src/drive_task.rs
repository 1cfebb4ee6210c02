// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Drive task: one cycle of handshake, tracking, control, and output per
//! rising edge on the cycle line.
//!
//! A single task owns every piece of mutable drive state. The command
//! surface reaches it only through the bounded request queue, so commands
//! and cycles are serialized against each other by construction.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use ddc_backend::{
    register_builtin_backends_on, BenchAccess, CycleEdge, DriveBench, RegistrationContext,
};
use ddc_core::drive::controller::ProportionalControl;
use ddc_core::drive::events::{DriveEventEmitter, DriveListener};
use ddc_core::drive::gate;
use ddc_core::drive::{
    is_valid_fraction, ControlLimits, ControlOutput, DEFAULT_PULSES_PER_REV,
};
use ddc_core::link::handshake::LinkFault;
use ddc_core::link::{ExchangeReply, WireStatus};
use ddc_core::{
    DriveCommand, DriveError, DriveRequest, DriveState, DynResult, RunStatus, TickSnapshot,
};

/// Configuration for the drive task.
pub struct DriveTaskConfig {
    pub registry: Arc<RegistrationContext>,
    pub backend: String,
    pub access: BenchAccess,
    pub pulses_per_rev: u32,
    pub gain: f64,
    pub limits: ControlLimits,
    /// Listeners registered on the task's event emitter before the loop arms.
    pub listeners: Vec<Arc<dyn DriveListener>>,
    /// Skip the registry factory and use this bench directly.
    pub prebuilt_bench: Option<DriveBench>,
}

impl Default for DriveTaskConfig {
    fn default() -> Self {
        let mut registry = RegistrationContext::new();
        register_builtin_backends_on(&mut registry);
        Self {
            registry: Arc::new(registry),
            backend: "sim".to_string(),
            access: BenchAccess::Sim {
                period_ms: 100,
                pulse_rate: 50,
            },
            pulses_per_rev: DEFAULT_PULSES_PER_REV,
            gain: 0.0,
            limits: ControlLimits::default(),
            listeners: Vec::new(),
            prebuilt_bench: None,
        }
    }
}

/// Run the drive task until shutdown.
///
/// A bench that cannot be constructed is unrecoverable: the error is
/// returned before the loop arms and the caller is expected to terminate.
pub async fn run_drive_task(
    config: DriveTaskConfig,
    rx: mpsc::Receiver<DriveRequest>,
    snap_tx: watch::Sender<TickSnapshot>,
    shutdown_rx: watch::Receiver<bool>,
) -> DynResult<()> {
    let DriveTaskConfig {
        registry,
        backend,
        access,
        pulses_per_rev,
        gain,
        limits,
        listeners,
        prebuilt_bench,
    } = config;

    let bench = match prebuilt_bench {
        Some(bench) => bench,
        None => {
            info!("Building {} bench", backend);
            registry.build_bench(&backend, access)?
        }
    };
    info!("Bench ready");

    let mut state = DriveState::new(pulses_per_rev);
    state.limits = limits;
    let controller = ProportionalControl::new(gain);

    let mut emitter = DriveEventEmitter::new();
    for listener in listeners {
        emitter.register(listener);
    }

    drive_loop(bench, state, controller, emitter, rx, snap_tx, shutdown_rx).await
}

async fn drive_loop(
    mut bench: DriveBench,
    mut state: DriveState,
    mut controller: ProportionalControl,
    emitter: DriveEventEmitter,
    mut rx: mpsc::Receiver<DriveRequest>,
    snap_tx: watch::Sender<TickSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> DynResult<()> {
    let mut edges = bench.cycle_line.subscribe();

    loop {
        tokio::select! {
            edge = edges.recv() => match edge {
                Ok(CycleEdge::Rising) => {
                    run_cycle(&mut state, &mut controller, &mut bench, &snap_tx, &emitter).await;
                }
                Ok(CycleEdge::Falling) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Cycle line lagged, {} edges dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    error!("Cycle line closed");
                    break;
                }
            },
            maybe_req = rx.recv() => {
                let Some(req) = maybe_req else { break; };
                let shutdown = process_request(
                    req, &mut state, &mut controller, &mut bench, &snap_tx, &emitter,
                ).await;
                if shutdown {
                    break;
                }
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            },
        }
    }

    // Leave the motors safe no matter which path ended the loop.
    do_stop(&mut state, &mut bench, &emitter).await;
    info!("drive task shutting down");
    Ok(())
}

/// One control cycle, fired on the rising edge of the cycle line.
async fn run_cycle(
    state: &mut DriveState,
    controller: &mut ProportionalControl,
    bench: &mut DriveBench,
    snap_tx: &watch::Sender<TickSnapshot>,
    emitter: &DriveEventEmitter,
) {
    state.measure_cycle(Instant::now());
    state.advance_counter();
    // Observers always see a fresh cycle marker, even when the exchange
    // below fails or is skipped.
    publish(state, snap_tx, emitter);

    let old_link = state.link.state();
    let exchanged = match state.link.prepare() {
        // No active run: no bus traffic this cycle.
        None => false,
        Some(attempt) => {
            debug!("tx token {:#X} status {:?}", attempt.token, attempt.status);
            match exchange(bench, attempt.token, attempt.status).await {
                Ok(reply) => {
                    debug!("rx {:?}", reply);
                    match state.link.accept(attempt.token, &reply) {
                        Ok((raw_a, raw_b)) => {
                            let (pos_a, pos_b) = state.tracking.update(raw_a, raw_b);
                            debug!(
                                "setpoint={} positions: {} {}, limits: {} {}",
                                state.setpoint_pulses,
                                pos_a,
                                pos_b,
                                state.limits.max_a,
                                state.limits.max_b
                            );
                            true
                        }
                        Err(fault) => {
                            warn!("{}", fault);
                            emitter.notify_fault(&fault);
                            false
                        }
                    }
                }
                Err(e) => {
                    state.link.fault();
                    let fault = LinkFault::Transport(e.to_string());
                    error!("{}", fault);
                    emitter.notify_fault(&fault);
                    false
                }
            }
        }
    };
    let new_link = state.link.state();
    if old_link != new_link {
        emitter.notify_link_change(old_link, new_link);
    }

    let output = if exchanged {
        controller.compute(
            state.setpoint_pulses,
            state.tracking.a.position(),
            state.tracking.b.position(),
            &state.limits,
        )
    } else {
        ControlOutput::default()
    };

    let (final_a, final_b) = gate::apply(&output, state.control_enabled, !exchanged);
    if exchanged {
        // The gated values are what actually drove the motors; they become
        // the integration sign for the next cycle's delta.
        state.tracking.record_outputs(final_a, final_b);
    }
    state.output_a = final_a;
    state.output_b = final_b;
    push_outputs(bench, final_a, final_b).await;

    publish(state, snap_tx, emitter);
}

async fn exchange(
    bench: &mut DriveBench,
    token: u64,
    status: WireStatus,
) -> DynResult<ExchangeReply> {
    bench.bus.send(token, status).await?;
    bench.bus.receive().await
}

/// Handle one command from the request queue. Returns true on shutdown.
async fn process_request(
    req: DriveRequest,
    state: &mut DriveState,
    controller: &mut ProportionalControl,
    bench: &mut DriveBench,
    snap_tx: &watch::Sender<TickSnapshot>,
    emitter: &DriveEventEmitter,
) -> bool {
    let DriveRequest { cmd, respond_to } = req;
    let mut shutdown = false;

    let result = match cmd {
        DriveCommand::GetSnapshot => Ok(state.snapshot()),
        DriveCommand::Start => {
            do_start(state, snap_tx, emitter);
            Ok(state.snapshot())
        }
        DriveCommand::Stop => {
            do_stop(state, bench, emitter).await;
            Ok(state.snapshot())
        }
        DriveCommand::Reset => {
            do_reset(state, snap_tx, emitter);
            Ok(state.snapshot())
        }
        DriveCommand::Shutdown => {
            info!("shutdown");
            do_stop(state, bench, emitter).await;
            shutdown = true;
            Ok(state.snapshot())
        }
        DriveCommand::SetControlEnabled(enabled) => {
            let old = state.control_enabled;
            state.control_enabled = enabled;
            if old != enabled {
                emitter.notify_control_enabled_change(old, enabled);
            }
            debug!("control enabled: {}", enabled);
            Ok(state.snapshot())
        }
        DriveCommand::SetLimit { motor, value } => {
            if is_valid_fraction(value) {
                let old = state.limits.get(motor);
                state.limits.set(motor, value);
                if old != value {
                    emitter.notify_limit_change(motor, old, value);
                }
                debug!("limit {}: {}", motor, value);
                Ok(state.snapshot())
            } else {
                warn!("Ignoring limit {} for motor {}: out of range", value, motor);
                Err(DriveError::from(format!("limit out of range: {}", value)))
            }
        }
        DriveCommand::SetDestination(turns) => {
            if turns.is_finite() {
                let old = state.setpoint_pulses;
                let new = state.set_destination(turns);
                if old != new {
                    emitter.notify_setpoint_change(old, new);
                }
                debug!("destination {} turns -> setpoint {} pulses", turns, new);
                Ok(state.snapshot())
            } else {
                warn!("Ignoring non-finite destination");
                Err(DriveError::from("destination must be finite"))
            }
        }
        DriveCommand::SetGain(gain) => {
            if gain.is_finite() && gain >= 0.0 {
                let old = controller.gain();
                controller.set_gain(gain);
                if old != gain {
                    emitter.notify_gain_change(old, gain);
                }
                debug!("gain: {}", gain);
                Ok(state.snapshot())
            } else {
                warn!("Ignoring gain {}: must be finite and non-negative", gain);
                Err(DriveError::from(format!("invalid gain: {}", gain)))
            }
        }
        DriveCommand::SetManualOutput { motor, value } => {
            if is_valid_fraction(value) {
                // Direct path to the driver, bypassing the gate. While a run
                // has closed-loop control enabled the next cycle overwrites
                // this with the gated output.
                match bench.actuator.set_output(motor, value as f32).await {
                    Ok(()) => {
                        debug!("manual output {}: {}", motor, value);
                        Ok(state.snapshot())
                    }
                    Err(e) => {
                        error!("Manual output for motor {} failed: {}", motor, e);
                        Err(DriveError::from(format!("actuator fault: {}", e)))
                    }
                }
            } else {
                warn!(
                    "Ignoring manual output {} for motor {}: out of range",
                    value, motor
                );
                Err(DriveError::from(format!("output out of range: {}", value)))
            }
        }
    };

    let _ = respond_to.send(result);
    shutdown
}

fn do_start(
    state: &mut DriveState,
    snap_tx: &watch::Sender<TickSnapshot>,
    emitter: &DriveEventEmitter,
) {
    info!("start");
    let old_run = state.run;
    let old_link = state.link.state();
    state.run = RunStatus::Running;
    state.link.begin_run();
    if old_run != state.run {
        emitter.notify_run_change(old_run, state.run);
    }
    if old_link != state.link.state() {
        emitter.notify_link_change(old_link, state.link.state());
    }
    // Observers get an immediate snapshot with whatever values are current,
    // stale or not; the next cycle refreshes them.
    publish(state, snap_tx, emitter);
}

async fn do_stop(state: &mut DriveState, bench: &mut DriveBench, emitter: &DriveEventEmitter) {
    info!("stop");
    let old_run = state.run;
    let old_link = state.link.state();
    state.run = RunStatus::Stopped;
    state.link.go_idle();
    state.clear_tracking();
    if old_run != state.run {
        emitter.notify_run_change(old_run, state.run);
    }
    if old_link != state.link.state() {
        emitter.notify_link_change(old_link, state.link.state());
    }
    // Fail-safe the motors now rather than waiting for the next cycle.
    push_outputs(bench, state.output_a, state.output_b).await;
}

fn do_reset(
    state: &mut DriveState,
    snap_tx: &watch::Sender<TickSnapshot>,
    emitter: &DriveEventEmitter,
) {
    info!("reset");
    state.link.clear_token();
    state.clear_tracking();
    let old = state.control_enabled;
    state.control_enabled = false;
    if old {
        emitter.notify_control_enabled_change(old, false);
    }
    publish(state, snap_tx, emitter);
}

async fn push_outputs(bench: &mut DriveBench, output_a: f64, output_b: f64) {
    use ddc_core::MotorId;

    if let Err(e) = bench.actuator.set_output(MotorId::A, output_a as f32).await {
        error!("Motor A output failed: {}", e);
    }
    if let Err(e) = bench.actuator.set_output(MotorId::B, output_b as f32).await {
        error!("Motor B output failed: {}", e);
    }
}

fn publish(
    state: &DriveState,
    snap_tx: &watch::Sender<TickSnapshot>,
    emitter: &DriveEventEmitter,
) {
    let snapshot = state.snapshot();
    emitter.notify_tick(&snapshot);
    let _ = snap_tx.send(snapshot);
}
