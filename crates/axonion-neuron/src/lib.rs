//! # Axonion Neuron
//!
//! A single Hodgkin-Huxley compartment whose firing drives a slow metabolic
//! state: intracellular calcium, ATP, mitochondrial stress and irreversible
//! structural damage.
//!
//! ## Components
//!
//! 1. **Channels**: Na/K/leak currents and m/h/n gate kinetics
//! 2. **Metabolism**: calcium clearance, ATP budget, stress and damage
//! 3. **Integrator**: fixed-step Euler or RK4 over the coupled 8-variable system
//! 4. **Spike detection**: threshold crossing with hysteresis
//!
//! ## Viability
//!
//! Once damage reaches the failure threshold the neuron is non-viable. Under
//! the default [`ViabilityPolicy::Collapse`] the active conductances vanish
//! and the membrane relaxes toward 0 mV.

pub mod channels;
pub mod integrator;
pub mod metabolism;
pub mod spike;
pub mod state;

pub use channels::{ChannelParameters, GatingVariables, IonChannelModel, IonicCurrents};
pub use integrator::{
    CoupledSystem, Integrator, NeuronConfig, StepOutcome, ViabilityConfig, ViabilityPolicy,
};
pub use metabolism::{MetabolicInputs, MetabolicModel, MetabolicParameters, MetabolicRates};
pub use spike::{SpikeDetector, SpikeDetectorConfig, SpikeEvent};
pub use state::{NeuronState, RESTING_POTENTIAL};
