//! Engine configuration
//!
//! Every section has defaults, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! dt = 0.01
//!
//! [protocol]
//! kind = "pulse"
//! amplitude = 15.0
//! period = 25.0
//! width = 1.0
//!
//! [acquisition]
//! noise_std = 0.0
//! ```

use crate::acquisition::AcquisitionConfig;
use crate::stimulus::StimulusProtocol;
use axonion_core::{AxonionError, IntegrationMethod, Result, Time};
use axonion_neuron::NeuronConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Background runner pacing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Wall-clock time between ticks
    pub tick_interval_ms: u64,
    /// Simulated ms per wall-clock ms
    pub speed: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 20,
            speed: 1.0,
        }
    }
}

impl RunnerConfig {
    /// Integration steps needed per tick to keep pace at `speed`; at least one.
    pub fn steps_per_tick(&self, dt: Time) -> usize {
        let simulated = self.speed * self.tick_interval_ms as f64;
        ((simulated / dt).round() as usize).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Integration time step (ms)
    pub dt: Time,
    pub method: IntegrationMethod,
    pub protocol: StimulusProtocol,
    pub neuron: NeuronConfig,
    pub acquisition: AcquisitionConfig,
    pub runner: RunnerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dt: 0.025,
            method: IntegrationMethod::default(),
            protocol: StimulusProtocol::default(),
            neuron: NeuronConfig::default(),
            acquisition: AcquisitionConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| AxonionError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AxonionError::ConfigParse(e.to_string()))
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !(self.dt.is_finite() && self.dt > 0.0) {
            problems.push(format!("dt must be positive and finite, got {}", self.dt));
        }
        if let Err(AxonionError::Configuration(msg)) = self.protocol.validate() {
            problems.push(format!("protocol: {}", msg));
        }
        self.neuron.collect_problems(&mut problems);
        self.acquisition.collect_problems(&mut problems);
        if self.runner.tick_interval_ms == 0 {
            problems.push("runner.tick_interval_ms must be at least 1".to_string());
        }
        if !(self.runner.speed.is_finite() && self.runner.speed > 0.0) {
            problems.push(format!("runner.speed must be positive, got {}", self.runner.speed));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            let listed = problems.iter().map(|p| format!("  - {}", p)).collect::<Vec<_>>().join("\n");
            Err(AxonionError::Configuration(format!("invalid engine configuration:\n{}", listed)))
        }
    }
}
