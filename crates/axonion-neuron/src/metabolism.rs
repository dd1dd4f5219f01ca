//! Calcium / ATP / mitochondrial stress / structural damage
//!
//! Rate constants are configured per second and converted to per-millisecond
//! derivatives so they share the electrical model's time base.
//!
//! ```text
//! f(ATP)      = ATP / (ATP + K_half)                   pump availability
//! clearance   = k_clear * Ca * f(ATP)
//! dCa/dt      = -clearance                              (+ jump per spike)
//! dATP/dt     = regen/(1+S) [ATP < ATP_max]
//!               - c_clear * clearance - c_pump * |I_Na| * f(ATP)
//! dS/dt       = g_ca * (Ca - Ca_s)+ + g_atp * (ATP_s - ATP)+
//!               - k_rec * (S - floor)+
//! floor       = fatigue * D + residual * S_peak
//! dD/dt       = k_dmg * (S - S_d)+
//! ```

use axonion_core::{Concentration, Current};
use serde::{Deserialize, Serialize};

const MS_PER_S: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetabolicParameters {
    /// Calcium added per spike event
    pub calcium_per_spike: Concentration,
    /// Maximal calcium clearance rate (1/s)
    pub calcium_clearance_rate: f64,
    /// ATP ceiling
    pub atp_max: f64,
    /// ATP level at which pumps run at half speed
    pub atp_half_saturation: f64,
    /// Baseline ATP regeneration (ATP/s)
    pub atp_regen_rate: f64,
    /// ATP spent per unit of calcium cleared
    pub clearance_atp_cost: f64,
    /// ATP spent per second per µA/cm^2 of sodium current pumped
    pub pump_atp_cost: f64,
    /// Calcium above which mitochondria load up
    pub calcium_stress_threshold: Concentration,
    /// Stress gain per unit of calcium excess (1/s)
    pub stress_calcium_gain: f64,
    /// ATP below which mitochondria load up
    pub atp_stress_threshold: f64,
    /// Stress gain per unit of ATP deficit (1/s)
    pub stress_atp_gain: f64,
    /// Stress recovery rate (1/s)
    pub stress_recovery_rate: f64,
    /// Residual stress per unit of structural damage
    pub fatigue_coupling: f64,
    /// Fraction of the highest stress reached that never recovers
    pub residual_stress_fraction: f64,
    /// Stress above which damage accumulates
    pub stress_damage_threshold: f64,
    /// Damage per second per unit of stress excess
    pub damage_rate: f64,
}

impl Default for MetabolicParameters {
    fn default() -> Self {
        Self {
            calcium_per_spike: 0.02,
            calcium_clearance_rate: 2.0,
            atp_max: 1.0,
            atp_half_saturation: 0.1,
            atp_regen_rate: 0.02,
            clearance_atp_cost: 0.005,
            pump_atp_cost: 0.0004,
            calcium_stress_threshold: 0.3,
            stress_calcium_gain: 0.1,
            atp_stress_threshold: 0.5,
            stress_atp_gain: 0.2,
            stress_recovery_rate: 0.02,
            fatigue_coupling: 0.5,
            residual_stress_fraction: 0.25,
            stress_damage_threshold: 0.5,
            damage_rate: 0.05,
        }
    }
}

/// Inputs of [`MetabolicModel::derivatives`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetabolicInputs {
    pub calcium: Concentration,
    pub atp: f64,
    pub stress: f64,
    pub damage: f64,
    /// Highest stress reached so far in the run
    pub peak_stress: f64,
    pub spike_occurred: bool,
    /// Sodium current that the Na/K pump has to move back (µA/cm^2)
    pub sodium_current: Current,
}

/// Per-millisecond derivatives plus the discrete spike-triggered calcium jump
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetabolicRates {
    pub d_calcium: f64,
    pub d_atp: f64,
    pub d_stress: f64,
    pub d_damage: f64,
    pub calcium_jump: Concentration,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetabolicModel {
    pub params: MetabolicParameters,
}

impl MetabolicModel {
    pub fn new(params: MetabolicParameters) -> Self {
        Self { params }
    }

    /// Metabolism of a non-viable cell: no further ATP synthesis.
    pub fn collapsed(&self) -> Self {
        let mut params = self.params;
        params.atp_regen_rate = 0.0;
        Self { params }
    }

    /// Fraction of pump capacity available at this ATP level; exactly 0 at ATP = 0.
    pub fn atp_availability(&self, atp: f64) -> f64 {
        let atp = atp.max(0.0);
        if atp == 0.0 {
            return 0.0;
        }
        atp / (atp + self.params.atp_half_saturation)
    }

    /// Calcium cleared per millisecond
    pub fn clearance_flux(&self, calcium: Concentration, atp: f64) -> f64 {
        self.params.calcium_clearance_rate / MS_PER_S * calcium.max(0.0) * self.atp_availability(atp)
    }

    /// Stress level below which recovery stops. Both terms only grow over a
    /// run, so every stress episode leaves some fatigue behind.
    pub fn fatigue_floor(&self, damage: f64, peak_stress: f64) -> f64 {
        self.params.fatigue_coupling * damage.max(0.0) + self.params.residual_stress_fraction * peak_stress.max(0.0)
    }

    pub fn derivatives(&self, inputs: &MetabolicInputs) -> MetabolicRates {
        let p = &self.params;
        let availability = self.atp_availability(inputs.atp);
        let clearance = self.clearance_flux(inputs.calcium, inputs.atp);

        let regeneration = if inputs.atp < p.atp_max {
            p.atp_regen_rate / (1.0 + inputs.stress.max(0.0))
        } else {
            0.0
        };
        let pumping = p.pump_atp_cost * inputs.sodium_current.abs() * availability;
        let d_atp = regeneration / MS_PER_S - p.clearance_atp_cost * clearance - pumping / MS_PER_S;

        let calcium_load = p.stress_calcium_gain * (inputs.calcium - p.calcium_stress_threshold).max(0.0);
        let energy_deficit = p.stress_atp_gain * (p.atp_stress_threshold - inputs.atp).max(0.0);
        let floor = self.fatigue_floor(inputs.damage, inputs.peak_stress);
        let recovery = p.stress_recovery_rate * (inputs.stress - floor).max(0.0);
        let d_stress = (calcium_load + energy_deficit - recovery) / MS_PER_S;

        let d_damage = p.damage_rate * (inputs.stress - p.stress_damage_threshold).max(0.0) / MS_PER_S;

        MetabolicRates {
            d_calcium: -clearance,
            d_atp,
            d_stress,
            d_damage,
            calcium_jump: if inputs.spike_occurred { p.calcium_per_spike } else { 0.0 },
        }
    }
}
