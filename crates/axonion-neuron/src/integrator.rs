//! Fixed-step integration of the coupled membrane/metabolism system
//!
//! The integrator owns the [`NeuronState`]. Each step advances all nine
//! components together, then corrects numerical overshoot by clamping:
//! nothing in the step path can fail.

use crate::channels::{ChannelParameters, IonChannelModel};
use crate::metabolism::{MetabolicInputs, MetabolicModel, MetabolicParameters};
use crate::spike::{SpikeDetector, SpikeDetectorConfig, SpikeEvent};
use crate::state::{index, NeuronState};
use axonion_core::{
    validate_time_step, AxonionError, Current, IntegrationMethod, OdeSystem, Result, StateVector, Time,
    Voltage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hard bound on reported membrane potential (mV)
const VOLTAGE_LIMIT: Voltage = 250.0;

/// What happens to the electrical dynamics once damage crosses the failure threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViabilityPolicy {
    /// Dynamics continue unchanged; only the viability flag changes
    Sustain,
    /// Na/K conductances vanish, leak reverses at 0 mV, ATP synthesis stops,
    /// spike detection is disabled
    #[default]
    Collapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViabilityConfig {
    pub policy: ViabilityPolicy,
    /// Structural damage at which the neuron becomes non-viable
    pub failure_threshold: f64,
}

impl Default for ViabilityConfig {
    fn default() -> Self {
        Self {
            policy: ViabilityPolicy::default(),
            failure_threshold: 1.0,
        }
    }
}

/// Everything needed to build an [`Integrator`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuronConfig {
    pub channels: ChannelParameters,
    pub metabolism: MetabolicParameters,
    pub spike: SpikeDetectorConfig,
    pub viability: ViabilityConfig,
}

impl NeuronConfig {
    /// Append every invalid parameter to `problems`.
    pub fn collect_problems(&self, problems: &mut Vec<String>) {
        let c = &self.channels;
        if !(c.c_m.is_finite() && c.c_m > 0.0) {
            problems.push(format!("channels.c_m must be positive, got {}", c.c_m));
        }
        for (name, g) in [("g_na", c.g_na), ("g_k", c.g_k), ("g_leak", c.g_leak)] {
            if !(g.is_finite() && g >= 0.0) {
                problems.push(format!("channels.{} must be non-negative, got {}", name, g));
            }
        }
        for (name, e) in [("e_na", c.e_na), ("e_k", c.e_k), ("e_leak", c.e_leak)] {
            if !e.is_finite() {
                problems.push(format!("channels.{} must be finite", name));
            }
        }

        let m = &self.metabolism;
        if !(m.atp_max.is_finite() && m.atp_max > 0.0) {
            problems.push(format!("metabolism.atp_max must be positive, got {}", m.atp_max));
        }
        if !(m.atp_half_saturation.is_finite() && m.atp_half_saturation > 0.0) {
            problems.push(format!(
                "metabolism.atp_half_saturation must be positive, got {}",
                m.atp_half_saturation
            ));
        }
        let rates = [
            ("calcium_per_spike", m.calcium_per_spike),
            ("calcium_clearance_rate", m.calcium_clearance_rate),
            ("atp_regen_rate", m.atp_regen_rate),
            ("clearance_atp_cost", m.clearance_atp_cost),
            ("pump_atp_cost", m.pump_atp_cost),
            ("stress_calcium_gain", m.stress_calcium_gain),
            ("stress_atp_gain", m.stress_atp_gain),
            ("stress_recovery_rate", m.stress_recovery_rate),
            ("fatigue_coupling", m.fatigue_coupling),
            ("residual_stress_fraction", m.residual_stress_fraction),
            ("damage_rate", m.damage_rate),
        ];
        for (name, value) in rates {
            if !(value.is_finite() && value >= 0.0) {
                problems.push(format!("metabolism.{} must be non-negative, got {}", name, value));
            }
        }
        if m.residual_stress_fraction >= 1.0 {
            problems.push(format!(
                "metabolism.residual_stress_fraction must be below 1, got {}",
                m.residual_stress_fraction
            ));
        }

        if !(self.spike.hysteresis.is_finite() && self.spike.hysteresis >= 0.0) {
            problems.push(format!("spike.hysteresis must be non-negative, got {}", self.spike.hysteresis));
        }
        if !self.spike.threshold.is_finite() {
            problems.push("spike.threshold must be finite".to_string());
        }
        if !(self.viability.failure_threshold.is_finite() && self.viability.failure_threshold > 0.0) {
            problems.push(format!(
                "viability.failure_threshold must be positive, got {}",
                self.viability.failure_threshold
            ));
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        self.collect_problems(&mut problems);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AxonionError::Configuration(problems.join("; ")))
        }
    }
}

/// Combined right-hand side over `[V, m, h, n, Ca, ATP, stress, damage, peak stress]`
pub struct CoupledSystem<'a> {
    pub channels: &'a IonChannelModel,
    pub metabolism: &'a MetabolicModel,
    pub injected: Current,
}

impl OdeSystem for CoupledSystem<'_> {
    fn dimension(&self) -> usize {
        index::DIMENSION
    }

    fn derivatives(&self, t: Time, y: &StateVector) -> StateVector {
        let state = NeuronState::from_vector(y, t);
        let v = state.membrane_potential;

        let membrane = self.channels.derivatives(v, &state.gating, self.injected);
        let sodium = self.channels.currents(v, &state.gating).sodium;
        let metabolic = self.metabolism.derivatives(&MetabolicInputs {
            calcium: state.intracellular_calcium,
            atp: state.atp_level,
            stress: state.mitochondrial_stress,
            damage: state.structural_damage,
            peak_stress: state.peak_stress,
            spike_occurred: false,
            sodium_current: sodium,
        });

        let mut dy = StateVector::zeros(index::DIMENSION);
        dy[index::VOLTAGE] = membrane.d_voltage;
        dy[index::M] = membrane.d_gating.m;
        dy[index::H] = membrane.d_gating.h;
        dy[index::N] = membrane.d_gating.n;
        dy[index::CALCIUM] = metabolic.d_calcium;
        dy[index::ATP] = metabolic.d_atp;
        dy[index::STRESS] = metabolic.d_stress;
        dy[index::DAMAGE] = metabolic.d_damage;
        // Peak stress moves only through the post-step clamp
        dy[index::PEAK_STRESS] = 0.0;
        dy
    }
}

/// Result of one [`Integrator::step`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepOutcome {
    pub spike: Option<SpikeEvent>,
    /// True only on the step where damage first crossed the failure threshold
    pub lost_viability: bool,
}

#[derive(Debug, Clone)]
pub struct Integrator {
    channels: IonChannelModel,
    metabolism: MetabolicModel,
    collapsed_channels: IonChannelModel,
    collapsed_metabolism: MetabolicModel,
    viability: ViabilityConfig,
    method: IntegrationMethod,
    dt: Time,
    state: NeuronState,
    detector: SpikeDetector,
}

impl Integrator {
    pub fn new(config: &NeuronConfig, method: IntegrationMethod, dt: Time) -> Result<Self> {
        validate_time_step(dt)?;
        config.validate()?;

        let channels = IonChannelModel::new(config.channels);
        let metabolism = MetabolicModel::new(config.metabolism);
        let state = NeuronState::resting(&channels, &metabolism);
        debug!(
            "Integrator ready: method={} dt={} ms resting V={} mV",
            method.name(),
            dt,
            state.membrane_potential
        );

        Ok(Self {
            collapsed_channels: channels.collapsed(),
            collapsed_metabolism: metabolism.collapsed(),
            channels,
            metabolism,
            viability: config.viability,
            method,
            dt,
            state,
            detector: SpikeDetector::new(config.spike),
        })
    }

    pub fn state(&self) -> &NeuronState {
        &self.state
    }

    pub fn dt(&self) -> Time {
        self.dt
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    pub fn viability(&self) -> &ViabilityConfig {
        &self.viability
    }

    pub fn metabolism(&self) -> &MetabolicModel {
        &self.metabolism
    }

    pub fn set_dt(&mut self, dt: Time) -> Result<()> {
        validate_time_step(dt)?;
        self.dt = dt;
        Ok(())
    }

    /// Viable while damage stays below the failure threshold; damage never
    /// decreases so loss of viability is permanent until reset.
    pub fn is_viable(&self) -> bool {
        Self::state_is_viable(&self.viability, &self.state)
    }

    fn state_is_viable(viability: &ViabilityConfig, state: &NeuronState) -> bool {
        state.structural_damage < viability.failure_threshold
    }

    fn collapsed(&self, state: &NeuronState) -> bool {
        self.viability.policy == ViabilityPolicy::Collapse && !Self::state_is_viable(&self.viability, state)
    }

    fn models_for(&self, state: &NeuronState) -> (&IonChannelModel, &MetabolicModel) {
        if self.collapsed(state) {
            (&self.collapsed_channels, &self.collapsed_metabolism)
        } else {
            (&self.channels, &self.metabolism)
        }
    }

    /// Pure single step: integrate, then clamp. No spike bookkeeping.
    pub fn advance(&self, state: &NeuronState, injected: Current, dt: Time) -> NeuronState {
        let (channels, metabolism) = self.models_for(state);
        let system = CoupledSystem { channels, metabolism, injected };
        let y = self.method.step(&system, state.simulation_time, &state.to_vector(), dt);
        let candidate = NeuronState::from_vector(&y, state.simulation_time + dt);
        Self::clamp(candidate, state, metabolism.params.atp_max)
    }

    fn clamp(candidate: NeuronState, previous: &NeuronState, atp_max: f64) -> NeuronState {
        let finite_or = |value: f64, fallback: f64| if value.is_finite() { value } else { fallback };

        let mut next = candidate;
        next.membrane_potential =
            finite_or(next.membrane_potential, previous.membrane_potential).clamp(-VOLTAGE_LIMIT, VOLTAGE_LIMIT);
        next.gating.m = finite_or(next.gating.m, previous.gating.m);
        next.gating.h = finite_or(next.gating.h, previous.gating.h);
        next.gating.n = finite_or(next.gating.n, previous.gating.n);
        next.gating = next.gating.clamped();
        next.intracellular_calcium = finite_or(next.intracellular_calcium, previous.intracellular_calcium).max(0.0);
        next.atp_level = finite_or(next.atp_level, previous.atp_level).clamp(0.0, atp_max);
        next.mitochondrial_stress = finite_or(next.mitochondrial_stress, previous.mitochondrial_stress).max(0.0);
        next.structural_damage =
            finite_or(next.structural_damage, previous.structural_damage).max(previous.structural_damage);
        next.peak_stress = previous.peak_stress.max(next.mitochondrial_stress);
        next
    }

    /// Advance the owned state by one `dt` under `injected` current.
    pub fn step(&mut self, injected: Current) -> StepOutcome {
        let was_viable = self.is_viable();
        let mut next = self.advance(&self.state, injected, self.dt);

        let spike = if self.collapsed(&next) {
            None
        } else {
            self.detector.observe(next.simulation_time, next.membrane_potential)
        };

        if spike.is_some() {
            let (_, metabolism) = self.models_for(&next);
            let rates = metabolism.derivatives(&MetabolicInputs {
                calcium: next.intracellular_calcium,
                atp: next.atp_level,
                stress: next.mitochondrial_stress,
                damage: next.structural_damage,
                peak_stress: next.peak_stress,
                spike_occurred: true,
                sodium_current: 0.0,
            });
            next.intracellular_calcium += rates.calcium_jump;
        }

        self.state = next;

        let lost_viability = was_viable && !self.is_viable();
        if lost_viability {
            warn!(
                "Neuron lost viability at t={:.3} ms (damage {:.3} >= {:.3}, policy {:?})",
                self.state.simulation_time,
                self.state.structural_damage,
                self.viability.failure_threshold,
                self.viability.policy
            );
        }

        StepOutcome { spike, lost_viability }
    }

    /// Force structural failure, keeping damage monotone.
    pub fn kill(&mut self) {
        let threshold = self.viability.failure_threshold;
        self.state.structural_damage = self.state.structural_damage.max(threshold);
        warn!("Neuron killed at t={:.3} ms", self.state.simulation_time);
    }

    /// Replace the owned state wholesale with the resting default.
    pub fn reset(&mut self) {
        self.state = NeuronState::resting(&self.channels, &self.metabolism);
        self.detector.reset();
    }

    /// Replace the owned state wholesale with a caller-provided snapshot.
    pub fn restore(&mut self, state: NeuronState) {
        self.state = state;
        self.detector.reset();
    }
}
