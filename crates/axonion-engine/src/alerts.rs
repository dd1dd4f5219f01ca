//! Once-per-run metabolic alerts

use axonion_core::{Current, Time};
use axonion_neuron::NeuronState;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    AtpLow,
    CalciumOverload,
    MitochondrialStress,
    DamageAccumulating,
    ExcitotoxicCascade,
    CellDeath,
}

impl AlertKind {
    pub const ALL: [AlertKind; 6] = [
        AlertKind::AtpLow,
        AlertKind::CalciumOverload,
        AlertKind::MitochondrialStress,
        AlertKind::DamageAccumulating,
        AlertKind::ExcitotoxicCascade,
        AlertKind::CellDeath,
    ];

    fn bit(self) -> u8 {
        1 << self as u8
    }

    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::AtpLow => "ATP low: ion pumps slowing",
            AlertKind::CalciumOverload => "Calcium overload",
            AlertKind::MitochondrialStress => "Mitochondrial stress rising",
            AlertKind::DamageAccumulating => "Structural damage accumulating",
            AlertKind::ExcitotoxicCascade => "Excitotoxic cascade: energy failure under calcium load",
            AlertKind::CellDeath => "Cell death: membrane no longer excitable",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    /// ms
    pub time: Time,
}

/// Trip levels; ATP and damage levels are fractions of their ceilings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub atp_low_fraction: f64,
    pub calcium_overload: f64,
    pub mitochondrial_stress: f64,
    pub damage_fraction: f64,
    pub cascade_atp_fraction: f64,
    pub cascade_calcium: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            atp_low_fraction: 0.3,
            calcium_overload: 1.0,
            mitochondrial_stress: 0.5,
            damage_fraction: 0.2,
            cascade_atp_fraction: 0.2,
            cascade_calcium: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertMonitor {
    thresholds: AlertThresholds,
    atp_max: f64,
    failure_threshold: f64,
    latched: u8,
}

impl AlertMonitor {
    pub fn new(thresholds: AlertThresholds, atp_max: f64, failure_threshold: f64) -> Self {
        Self {
            thresholds,
            atp_max,
            failure_threshold,
            latched: 0,
        }
    }

    pub fn is_latched(&self, kind: AlertKind) -> bool {
        self.latched & kind.bit() != 0
    }

    fn tripped(&self, kind: AlertKind, state: &NeuronState, stimulus: Current) -> bool {
        let t = &self.thresholds;
        match kind {
            AlertKind::AtpLow => state.atp_level < t.atp_low_fraction * self.atp_max,
            AlertKind::CalciumOverload => state.intracellular_calcium > t.calcium_overload,
            AlertKind::MitochondrialStress => state.mitochondrial_stress > t.mitochondrial_stress,
            AlertKind::DamageAccumulating => state.structural_damage > t.damage_fraction * self.failure_threshold,
            AlertKind::ExcitotoxicCascade => {
                stimulus != 0.0
                    && state.atp_level < t.cascade_atp_fraction * self.atp_max
                    && state.intracellular_calcium > t.cascade_calcium
            }
            // Raised from the integrator's viability transition, see `cell_death`
            AlertKind::CellDeath => false,
        }
    }

    fn latch(&mut self, kind: AlertKind, time: Time) -> Option<Alert> {
        if self.is_latched(kind) {
            return None;
        }
        self.latched |= kind.bit();
        if kind == AlertKind::CellDeath {
            error!("[t={:.1} ms] {}", time, kind);
        } else {
            warn!("[t={:.1} ms] {}", time, kind);
        }
        Some(Alert { kind, time })
    }

    /// Returns the threshold alerts raised for the first time by this state.
    pub fn check(&mut self, state: &NeuronState, stimulus: Current) -> Vec<Alert> {
        let mut raised = Vec::new();
        for kind in AlertKind::ALL {
            if !self.is_latched(kind) && self.tripped(kind, state, stimulus) {
                raised.extend(self.latch(kind, state.simulation_time));
            }
        }
        raised
    }

    /// Record the loss of viability; `None` if already reported this run.
    pub fn cell_death(&mut self, time: Time) -> Option<Alert> {
        self.latch(AlertKind::CellDeath, time)
    }

    pub fn reset(&mut self) {
        self.latched = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axonion_neuron::{IonChannelModel, MetabolicModel};

    fn monitor() -> AlertMonitor {
        AlertMonitor::new(AlertThresholds::default(), 1.0, 1.0)
    }

    fn resting() -> NeuronState {
        NeuronState::resting(&IonChannelModel::default(), &MetabolicModel::default())
    }

    #[test]
    fn test_quiet_state_raises_nothing() {
        assert!(monitor().check(&resting(), 10.0).is_empty());
    }

    #[test]
    fn test_alert_latches_once() {
        let mut monitor = monitor();
        let mut state = resting();
        state.intracellular_calcium = 1.5;

        let first = monitor.check(&state, 0.0);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, AlertKind::CalciumOverload);
        assert!(monitor.check(&state, 0.0).is_empty());

        monitor.reset();
        assert_eq!(monitor.check(&state, 0.0).len(), 1);
    }

    #[test]
    fn test_cascade_requires_stimulus() {
        let mut monitor = monitor();
        let mut state = resting();
        state.atp_level = 0.1;
        state.intracellular_calcium = 0.8;

        let kinds: Vec<AlertKind> = monitor.check(&state, 0.0).iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::AtpLow]);

        let kinds: Vec<AlertKind> = monitor.check(&state, 5.0).iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::ExcitotoxicCascade]);
    }

    #[test]
    fn test_cell_death_reported_once() {
        let mut monitor = monitor();
        let mut state = resting();
        state.structural_damage = 1.0;
        let kinds: Vec<AlertKind> = monitor.check(&state, 0.0).iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::DamageAccumulating]);
        assert!(!monitor.is_latched(AlertKind::CellDeath));

        let death = monitor.cell_death(12.5).unwrap();
        assert_eq!(death, Alert { kind: AlertKind::CellDeath, time: 12.5 });
        assert!(monitor.cell_death(13.0).is_none());
        assert!(monitor.is_latched(AlertKind::CellDeath));
    }
}
