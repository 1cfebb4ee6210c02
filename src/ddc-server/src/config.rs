// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for ddc-server.
//!
//! Config is loaded from the `[ddc-server]` section of `ddc-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./ddc-rs.toml`
//! 3. `~/.config/ddc-rs/ddc-rs.toml`
//! 4. `/etc/ddc-rs/ddc-rs.toml`

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use ddc_app::ConfigFile;
use ddc_backend::BenchAccess;
use ddc_core::drive::{is_valid_fraction, DEFAULT_PULSES_PER_REV};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Bench backend configuration
    pub drive: DriveConfig,
    /// Per-motor output limits applied at startup
    pub limits: LimitsConfig,
    /// TCP listener configuration
    pub listen: ListenConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Bench backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Bench backend name (e.g. "sim")
    pub backend: Option<String>,
    /// Encoder pulses per motor revolution
    pub pulses_per_rev: u32,
    /// Initial proportional controller gain
    pub gain: f64,
    /// Access method for the bench hardware
    pub access: AccessConfig,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            backend: Some("sim".to_string()),
            pulses_per_rev: DEFAULT_PULSES_PER_REV,
            gain: 0.0,
            access: AccessConfig::default(),
        }
    }
}

/// Access method to reach the bench hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// "sim" or "i2c"
    #[serde(rename = "type")]
    pub access_type: Option<String>,
    /// Sim: cycle period in milliseconds
    pub period_ms: u64,
    /// Sim: pulses accrued per cycle at full output
    pub pulse_rate: u32,
    /// I2C: bus number
    pub bus: u8,
    /// I2C: microcontroller address
    pub controller_addr: u16,
    /// I2C: motor driver address
    pub driver_addr: u16,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            access_type: Some("sim".to_string()),
            period_ms: 100,
            pulse_rate: 50,
            bus: 1,
            controller_addr: 0x08,
            driver_addr: 0x40,
        }
    }
}

impl AccessConfig {
    /// Resolve the configured access method into a bench access value.
    pub fn to_bench_access(&self) -> Result<BenchAccess, String> {
        match self.access_type.as_deref() {
            Some("sim") | None => Ok(BenchAccess::Sim {
                period_ms: self.period_ms,
                pulse_rate: self.pulse_rate,
            }),
            Some("i2c") => Ok(BenchAccess::I2c {
                bus: self.bus,
                controller_addr: self.controller_addr,
                driver_addr: self.driver_addr,
            }),
            Some(other) => Err(format!("Unknown access type: {}", other)),
        }
    }
}

/// Per-motor output limits applied at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_a: f64,
    pub max_b: f64,
}

/// TCP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub enabled: bool,
    pub listen: IpAddr,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::from([127, 0, 0, 1]),
            port: 4810,
        }
    }
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "ddc-server"
    }
}

impl ServerConfig {
    /// Check semantic constraints a bare parse cannot.
    pub fn validate(&self) -> Result<(), String> {
        if self.drive.pulses_per_rev == 0 {
            return Err("[drive].pulses_per_rev must be positive".into());
        }
        if !(self.drive.gain.is_finite() && self.drive.gain >= 0.0) {
            return Err("[drive].gain must be finite and non-negative".into());
        }
        for (name, value) in [("max_a", self.limits.max_a), ("max_b", self.limits.max_b)] {
            if !is_valid_fraction(value) {
                return Err(format!("[limits].{} must be in [-1.0, 1.0]", name));
            }
        }
        Ok(())
    }

    /// Render an example `ddc-rs.toml` with all defaults spelled out.
    pub fn example_toml() -> String {
        let mut table = toml::Table::new();
        let section = toml::Value::try_from(ServerConfig::default())
            .expect("default config must serialize");
        table.insert(Self::section_key().to_string(), section);
        toml::to_string_pretty(&table).expect("default config must render")
    }
}
