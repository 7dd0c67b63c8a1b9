// ==============================================================================
// config.rs — SIMULATION CONFIGURATION
// ------------------------------------------------------------------------------
// Every section deserializes with defaults, so a config file only needs the
// values it overrides. Defaults reproduce the stock car tuning.
// ==============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub tick_rate_hz: f32,
    pub gravity: [f32; 3],
    /// Any chassis coordinate beyond this magnitude triggers a reset.
    pub world_bound: f32,
    /// Fail construction when a rear or front-right wheel role is unmatched.
    pub require_all_wheels: bool,
    pub listen_addr: String,
    pub weights_path: PathBuf,
    /// Learned vehicles the server spawns on startup.
    pub learned_vehicles: usize,

    pub chassis: ChassisConfig,
    pub drivetrain: DrivetrainConfig,
    pub steering: SteeringConfig,
    pub suspension: SuspensionConfig,
    pub sensor: SensorConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub mass: f32,            // mass units
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    pub max_engine_force: f32,  // N
    pub max_braking_force: f32, // N
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub increment: f32, // rad per tick
    pub clamp: f32,     // rad
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionConfig {
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub compression: f32,
    pub friction: f32,
    /// Kept for car data files; the ray-cast controller does not expose it.
    pub roll_influence: f32,
    pub max_travel: f32,
    pub max_force: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub cast_distance: f32,
    pub unit_offset: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            gravity: [0.0, -9.81, 0.0],
            world_bound: 1_000.0,
            require_all_wheels: true,
            listen_addr: "0.0.0.0:9001".to_string(),
            weights_path: PathBuf::from("best_network.json"),
            learned_vehicles: 4,
            chassis: ChassisConfig::default(),
            drivetrain: DrivetrainConfig::default(),
            steering: SteeringConfig::default(),
            suspension: SuspensionConfig::default(),
            sensor: SensorConfig::default(),
        }
    }
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            mass: 2000.0,
            linear_damping: 0.2,
            angular_damping: 0.2,
            friction: 0.5,
        }
    }
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        Self {
            max_engine_force: 3000.0,
            max_braking_force: 1000.0,
        }
    }
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            increment: 0.01,
            clamp: 0.15,
        }
    }
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        Self {
            rest_length: 0.026,
            stiffness: 1000.0,
            damping: 200.0,
            compression: 500.4,
            friction: 0.45,
            roll_influence: 0.04,
            max_travel: 5.0,
            max_force: 6000.0,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            cast_distance: 100.0,
            unit_offset: 1.0,
        }
    }
}

impl SimConfig {
    /// Reads a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.tick_rate_hz > 0.0, "tick_rate_hz must be positive");
        anyhow::ensure!(self.chassis.mass > 0.0, "chassis.mass must be positive");
        anyhow::ensure!(self.sensor.cast_distance > 0.0, "sensor.cast_distance must be positive");
        anyhow::ensure!(self.steering.clamp >= 0.0, "steering.clamp must not be negative");
        Ok(())
    }

    pub fn dt(&self) -> Real {
        1.0 / self.tick_rate_hz
    }

    pub fn gravity(&self) -> Vector<Real> {
        let [x, y, z] = self.gravity;
        vector![x, y, z]
    }
}
