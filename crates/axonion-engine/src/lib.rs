//! # Axonion Engine
//!
//! Drives a single [`axonion_neuron::Integrator`] under a stimulus protocol
//! and records it the way an acquisition rig would.
//!
//! ## Pipeline (per integration step)
//!
//! ```text
//! StimulusGenerator ─► Integrator ─► AcquisitionSimulator ─► live / history buffers
//!                          │
//!                          └─► spike feed, metabolic alerts
//! ```
//!
//! [`SimulationEngine`] runs the pipeline synchronously; [`EngineRunner`]
//! paces it from a background thread and accepts [`ControlMessage`]s.

pub mod acquisition;
pub mod alerts;
pub mod config;
pub mod engine;
pub mod runner;
pub mod stimulus;

pub use acquisition::{
    AcquisitionConfig, AcquisitionSimulator, AdcConfig, Channel, HistoryBuffer, LiveBuffer, Sample,
};
pub use alerts::{Alert, AlertKind, AlertMonitor, AlertThresholds};
pub use config::{EngineConfig, RunnerConfig};
pub use engine::{SimulationEngine, MAX_PENDING_SPIKES};
pub use runner::{ControlMessage, EngineRunner};
pub use stimulus::{StimulusGenerator, StimulusProtocol};

pub use axonion_core::{AxonionError, IntegrationMethod, Result};
pub use axonion_neuron::{NeuronConfig, NeuronState, SpikeEvent, ViabilityPolicy};
