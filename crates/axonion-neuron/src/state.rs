//! Aggregate neuron state

use crate::channels::{GatingVariables, IonChannelModel};
use crate::metabolism::MetabolicModel;
use axonion_core::{Concentration, StateVector, Time, Voltage};
use serde::{Deserialize, Serialize};

/// Resting membrane potential of the default parameter set (mV)
pub const RESTING_POTENTIAL: Voltage = -65.0;

/// Layout of the differentiable part of [`NeuronState`] as a [`StateVector`]
pub mod index {
    pub const VOLTAGE: usize = 0;
    pub const M: usize = 1;
    pub const H: usize = 2;
    pub const N: usize = 3;
    pub const CALCIUM: usize = 4;
    pub const ATP: usize = 5;
    pub const STRESS: usize = 6;
    pub const DAMAGE: usize = 7;
    pub const PEAK_STRESS: usize = 8;
    pub const DIMENSION: usize = 9;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuronState {
    /// mV
    pub membrane_potential: Voltage,
    pub gating: GatingVariables,
    pub intracellular_calcium: Concentration,
    pub atp_level: f64,
    pub mitochondrial_stress: f64,
    /// Irreversible; never decreases within a run
    pub structural_damage: f64,
    /// Highest mitochondrial stress reached; never decreases within a run
    pub peak_stress: f64,
    /// ms
    pub simulation_time: Time,
}

impl NeuronState {
    /// Resting state: gates at steady state for -65 mV, full ATP, no load.
    pub fn resting(channels: &IonChannelModel, metabolism: &MetabolicModel) -> Self {
        Self {
            membrane_potential: RESTING_POTENTIAL,
            gating: channels.steady_state_gating(RESTING_POTENTIAL),
            intracellular_calcium: 0.0,
            atp_level: metabolism.params.atp_max,
            mitochondrial_stress: 0.0,
            structural_damage: 0.0,
            peak_stress: 0.0,
            simulation_time: 0.0,
        }
    }

    pub fn to_vector(&self) -> StateVector {
        let mut y = StateVector::zeros(index::DIMENSION);
        y[index::VOLTAGE] = self.membrane_potential;
        y[index::M] = self.gating.m;
        y[index::H] = self.gating.h;
        y[index::N] = self.gating.n;
        y[index::CALCIUM] = self.intracellular_calcium;
        y[index::ATP] = self.atp_level;
        y[index::STRESS] = self.mitochondrial_stress;
        y[index::DAMAGE] = self.structural_damage;
        y[index::PEAK_STRESS] = self.peak_stress;
        y
    }

    /// Rebuild a state from a vector produced by [`NeuronState::to_vector`]
    pub fn from_vector(y: &StateVector, simulation_time: Time) -> Self {
        Self {
            membrane_potential: y[index::VOLTAGE],
            gating: GatingVariables {
                m: y[index::M],
                h: y[index::H],
                n: y[index::N],
            },
            intracellular_calcium: y[index::CALCIUM],
            atp_level: y[index::ATP],
            mitochondrial_stress: y[index::STRESS],
            structural_damage: y[index::DAMAGE],
            peak_stress: y[index::PEAK_STRESS],
            simulation_time,
        }
    }
}
