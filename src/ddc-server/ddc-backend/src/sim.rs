// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated bench for development and testing.
//!
//! Emulates the microcontroller end of the bus: a ticker pulses the cycle
//! line, every exchange answers with an incremented token and `Success`,
//! and the encoder totals accrue in proportion to the magnitude of the last
//! actuator outputs. The counters are directionless, exactly like the real
//! hardware: they only ever grow while a motor is driven.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;
use tracing::debug;

use ddc_core::drive::MotorId;
use ddc_core::link::{masked, ExchangeReply, WireStatus};
use ddc_core::DynResult;

use crate::{BoxFuture, CycleBus, CycleEdge, CycleLine, DriveBench, MotorActuator};

#[derive(Debug)]
struct SimShared {
    /// Token and status most recently written by the host.
    last_sent: Option<(u64, WireStatus)>,
    total_a: i64,
    total_b: i64,
    output_a: f32,
    output_b: f32,
    /// Pulses accrued per exchange at full output.
    pulse_rate: u32,
}

impl SimShared {
    fn accrue(&mut self) {
        let rate = f64::from(self.pulse_rate);
        self.total_a += (rate * f64::from(self.output_a.abs())).round() as i64;
        self.total_b += (rate * f64::from(self.output_b.abs())).round() as i64;
    }
}

struct SimBus {
    shared: Arc<Mutex<SimShared>>,
}

impl CycleBus for SimBus {
    fn send<'a>(&'a mut self, token: u64, status: WireStatus) -> BoxFuture<'a, DynResult<()>> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            let mut sim = shared.lock().expect("sim state poisoned");
            sim.last_sent = Some((masked(token), status));
            Ok(())
        })
    }

    fn receive<'a>(&'a mut self) -> BoxFuture<'a, DynResult<ExchangeReply>> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            let mut sim = shared.lock().expect("sim state poisoned");
            let Some((token, _status)) = sim.last_sent.take() else {
                return Err("receive without a preceding send".into());
            };
            sim.accrue();
            let reply = ExchangeReply {
                token: masked(token.wrapping_add(1)),
                status: WireStatus::Success,
                total_a: sim.total_a,
                total_b: sim.total_b,
            };
            debug!("sim exchange: {:?}", reply);
            Ok(reply)
        })
    }
}

struct SimActuator {
    shared: Arc<Mutex<SimShared>>,
}

impl MotorActuator for SimActuator {
    fn set_output<'a>(&'a mut self, motor: MotorId, fraction: f32) -> BoxFuture<'a, DynResult<()>> {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            let mut sim = shared.lock().expect("sim state poisoned");
            match motor {
                MotorId::A => sim.output_a = fraction,
                MotorId::B => sim.output_b = fraction,
            }
            Ok(())
        })
    }
}

struct SimCycleLine {
    edge_tx: broadcast::Sender<CycleEdge>,
}

impl CycleLine for SimCycleLine {
    fn subscribe(&self) -> broadcast::Receiver<CycleEdge> {
        self.edge_tx.subscribe()
    }
}

/// The simulated bench. See the module docs for behavior.
pub struct SimBench;

impl SimBench {
    /// Build a bench whose cycle line pulses every `period_ms` and whose
    /// encoders accrue up to `pulse_rate` pulses per exchange.
    ///
    /// Must be called from within a tokio runtime; the edge generator runs
    /// as a spawned task for the lifetime of the runtime.
    pub fn build(period_ms: u64, pulse_rate: u32) -> DriveBench {
        let shared = Arc::new(Mutex::new(SimShared {
            last_sent: None,
            total_a: 0,
            total_b: 0,
            output_a: 0.0,
            output_b: 0.0,
            pulse_rate,
        }));

        let (edge_tx, _) = broadcast::channel(32);
        let pulse_tx = edge_tx.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_millis(period_ms.max(1)));
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Subscribers may not exist yet; pulses before the first
                // subscribe are simply lost, like real edges would be.
                let _ = pulse_tx.send(CycleEdge::Rising);
                let _ = pulse_tx.send(CycleEdge::Falling);
            }
        });

        DriveBench {
            bus: Box::new(SimBus {
                shared: Arc::clone(&shared),
            }),
            actuator: Box::new(SimActuator { shared }),
            cycle_line: Box::new(SimCycleLine { edge_tx }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_increments_token() {
        let mut bench = SimBench::build(1000, 10);
        bench.bus.send(0, WireStatus::Initial).await.unwrap();
        let reply = bench.bus.receive().await.unwrap();
        assert_eq!(reply.token, 1);
        assert_eq!(reply.status, WireStatus::Success);

        bench.bus.send(1, WireStatus::Success).await.unwrap();
        let reply = bench.bus.receive().await.unwrap();
        assert_eq!(reply.token, 2);
    }

    #[tokio::test]
    async fn test_receive_requires_send() {
        let mut bench = SimBench::build(1000, 10);
        assert!(bench.bus.receive().await.is_err());
    }

    #[tokio::test]
    async fn test_totals_accrue_with_output_magnitude() {
        let mut bench = SimBench::build(1000, 10);
        bench.actuator.set_output(MotorId::A, 1.0).await.unwrap();
        bench.actuator.set_output(MotorId::B, -0.5).await.unwrap();

        bench.bus.send(0, WireStatus::Initial).await.unwrap();
        let reply = bench.bus.receive().await.unwrap();
        // Counters are directionless: B accrues despite a negative output.
        assert_eq!(reply.total_a, 10);
        assert_eq!(reply.total_b, 5);

        bench.actuator.set_output(MotorId::A, 0.0).await.unwrap();
        bench.bus.send(1, WireStatus::Success).await.unwrap();
        let reply = bench.bus.receive().await.unwrap();
        assert_eq!(reply.total_a, 10);
        assert_eq!(reply.total_b, 10);
    }

    #[tokio::test]
    async fn test_cycle_line_pulses() {
        let bench = SimBench::build(5, 10);
        let mut edges = bench.cycle_line.subscribe();
        let first = time::timeout(Duration::from_secs(1), edges.recv())
            .await
            .expect("edge must arrive")
            .unwrap();
        let second = time::timeout(Duration::from_secs(1), edges.recv())
            .await
            .expect("edge must arrive")
            .unwrap();
        assert_eq!(
            [first, second],
            [CycleEdge::Rising, CycleEdge::Falling]
        );
    }
}
