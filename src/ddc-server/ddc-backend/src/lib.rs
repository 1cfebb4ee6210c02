// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Hardware collaborators behind the drive loop.
//!
//! Three pieces make up a bench: the cycle line that paces the loop, the
//! request/response bus to the microcontroller that owns the encoders, and
//! the motor driver output stage. Backends are registered by name and
//! instantiated through [`RegistrationContext`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::broadcast;

use ddc_core::drive::MotorId;
use ddc_core::link::{ExchangeReply, WireStatus};
use ddc_core::DynResult;

mod sim;

pub use sim::SimBench;

/// Alias to reduce type complexity in the bus traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Edge observed on the cycle line. The drive loop reacts to rising edges
/// only; falling edges are delivered so backends don't have to filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEdge {
    Rising,
    Falling,
}

/// Interrupt line the microcontroller pulses once per control cycle.
pub trait CycleLine: Send {
    fn subscribe(&self) -> broadcast::Receiver<CycleEdge>;
}

/// Request/response bus to the microcontroller.
///
/// The transport is assumed synchronous, bounded, and cooperative: both
/// calls must return well before the next cycle pulse can fire.
pub trait CycleBus: Send {
    fn send<'a>(&'a mut self, token: u64, status: WireStatus) -> BoxFuture<'a, DynResult<()>>;

    fn receive<'a>(&'a mut self) -> BoxFuture<'a, DynResult<ExchangeReply>>;
}

/// Motor driver output stage. Outputs are fractions in [-1, 1], one call
/// per motor.
pub trait MotorActuator: Send {
    fn set_output<'a>(&'a mut self, motor: MotorId, fraction: f32) -> BoxFuture<'a, DynResult<()>>;
}

/// Hardware bundle a backend factory hands to the drive task.
pub struct DriveBench {
    pub bus: Box<dyn CycleBus>,
    pub actuator: Box<dyn MotorActuator>,
    pub cycle_line: Box<dyn CycleLine>,
}

/// Connection details for instantiating a bench backend.
#[derive(Debug, Clone)]
pub enum BenchAccess {
    /// I2C bus with the microcontroller and motor driver addresses.
    I2c {
        bus: u8,
        controller_addr: u16,
        driver_addr: u16,
    },
    /// In-process simulation: cycle period and full-throttle pulse rate.
    Sim { period_ms: u64, pulse_rate: u32 },
}

pub type BackendFactory = fn(BenchAccess) -> DynResult<DriveBench>;

/// Context for registering and instantiating bench backends.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, BackendFactory>,
}

impl RegistrationContext {
    /// Create a new empty registration context.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory under a stable name (e.g. "sim").
    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        let key = normalize_name(name);
        self.factories.insert(key, factory);
    }

    /// Check whether a backend name is registered.
    pub fn is_backend_registered(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.factories.contains_key(&key)
    }

    /// List registered backend names.
    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a bench based on the selected name and access method.
    pub fn build_bench(&self, name: &str, access: BenchAccess) -> DynResult<DriveBench> {
        let key = normalize_name(name);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| format!("Unknown bench backend: {}", name))?;
        factory(access)
    }

    /// Merge another registration context into this one.
    pub fn extend_from(&mut self, other: &RegistrationContext) {
        for (name, factory) in &other.factories {
            self.factories.insert(name.clone(), *factory);
        }
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Register all built-in backends on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    context.register_backend("sim", sim_factory);
}

fn sim_factory(access: BenchAccess) -> DynResult<DriveBench> {
    match access {
        BenchAccess::Sim {
            period_ms,
            pulse_rate,
        } => Ok(SimBench::build(period_ms, pulse_rate)),
        BenchAccess::I2c { .. } => Err("sim backend requires sim access parameters".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_is_name_normalized() {
        let mut ctx = RegistrationContext::new();
        register_builtin_backends_on(&mut ctx);
        assert!(ctx.is_backend_registered("sim"));
        assert!(ctx.is_backend_registered("SIM"));
        assert!(!ctx.is_backend_registered("mdhat"));
        assert_eq!(ctx.registered_backends(), vec!["sim".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_an_error() {
        let ctx = RegistrationContext::new();
        let err = ctx
            .build_bench(
                "nope",
                BenchAccess::Sim {
                    period_ms: 10,
                    pulse_rate: 10,
                },
            )
            .err()
            .expect("must fail");
        assert!(err.to_string().contains("Unknown bench backend"));
    }

    #[tokio::test]
    async fn test_sim_rejects_i2c_access() {
        let mut ctx = RegistrationContext::new();
        register_builtin_backends_on(&mut ctx);
        let result = ctx.build_bench(
            "sim",
            BenchAccess::I2c {
                bus: 1,
                controller_addr: 0x08,
                driver_addr: 0x40,
            },
        );
        assert!(result.is_err());
    }
}
