//! Single-writer simulation loop: stimulus, integration, acquisition, events

use crate::acquisition::{AcquisitionSimulator, HistoryBuffer, Sample};
use crate::alerts::{Alert, AlertMonitor, AlertThresholds};
use crate::config::EngineConfig;
use crate::stimulus::{StimulusGenerator, StimulusProtocol};
use axonion_core::{validate_time_step, Current, Result, Time};
use axonion_neuron::{Integrator, NeuronState, SpikeEvent};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Unpolled spike events beyond this are dropped oldest-first
pub const MAX_PENDING_SPIKES: usize = 10_000;

pub struct SimulationEngine {
    config: EngineConfig,
    integrator: Integrator,
    stimulus: StimulusGenerator,
    acquisition: AcquisitionSimulator,
    alerts: AlertMonitor,
    pending_spikes: VecDeque<SpikeEvent>,
    pending_alerts: Vec<Alert>,
    spike_count: usize,
    last_current: Current,
}

impl SimulationEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let integrator = Integrator::new(&config.neuron, config.method, config.dt)?;
        let stimulus = StimulusGenerator::new(config.protocol, config.dt)?;
        let failure_threshold = config.neuron.viability.failure_threshold;
        let acquisition = AcquisitionSimulator::new(config.acquisition.clone(), failure_threshold)?;
        let alerts = AlertMonitor::new(
            AlertThresholds::default(),
            config.neuron.metabolism.atp_max,
            failure_threshold,
        );

        info!(
            "Simulation engine created: dt={} ms, method={}, protocol={}, viability={:?}",
            config.dt,
            config.method.name(),
            config.protocol,
            config.neuron.viability.policy
        );

        Ok(Self {
            config,
            integrator,
            stimulus,
            acquisition,
            alerts,
            pending_spikes: VecDeque::new(),
            pending_alerts: Vec::new(),
            spike_count: 0,
            last_current: 0.0,
        })
    }

    /// One integration step; returns the sample if this step was acquired.
    pub fn step(&mut self) -> Option<Sample> {
        let current = self.stimulus.next_current();
        self.last_current = current;

        let outcome = self.integrator.step(current);
        let state = *self.integrator.state();

        if let Some(spike) = outcome.spike {
            self.spike_count += 1;
            if self.pending_spikes.len() >= MAX_PENDING_SPIKES {
                self.pending_spikes.pop_front();
            }
            self.pending_spikes.push_back(spike);
        }

        let sample = self.acquisition.acquire(&state, current, outcome.spike.is_some());
        let raised = self.alerts.check(&state, current);
        self.pending_alerts.extend(raised);
        if outcome.lost_viability {
            self.pending_alerts.extend(self.alerts.cell_death(state.simulation_time));
        }
        sample
    }

    pub fn run_steps(&mut self, steps: usize) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Advance by `duration` ms of simulated time; returns the number of steps taken.
    pub fn run_for(&mut self, duration: Time) -> usize {
        if !(duration.is_finite() && duration > 0.0) {
            return 0;
        }
        let steps = (duration / self.integrator.dt()).round() as usize;
        self.run_steps(steps);
        steps
    }

    pub fn set_protocol(&mut self, protocol: StimulusProtocol) -> Result<()> {
        self.stimulus.set_protocol(protocol)?;
        self.config.protocol = protocol;
        info!("Stimulus protocol set to {}", protocol);
        Ok(())
    }

    pub fn set_time_step(&mut self, dt: Time) -> Result<()> {
        validate_time_step(dt)?;
        self.integrator.set_dt(dt)?;
        self.stimulus.set_dt(dt)?;
        self.config.dt = dt;
        info!("Time step set to {} ms", dt);
        Ok(())
    }

    /// Fresh resting neuron, empty buffers and event feeds. The protocol is
    /// kept but its phase restarts.
    pub fn reset(&mut self) {
        self.integrator.reset();
        self.stimulus.restart();
        self.acquisition.reset();
        self.alerts.reset();
        self.pending_spikes.clear();
        self.pending_alerts.clear();
        self.spike_count = 0;
        self.last_current = 0.0;
        info!("Simulation reset");
    }

    /// Force structural failure.
    pub fn kill(&mut self) {
        self.integrator.kill();
        let state = *self.integrator.state();
        let raised = self.alerts.check(&state, self.last_current);
        self.pending_alerts.extend(raised);
        self.pending_alerts.extend(self.alerts.cell_death(state.simulation_time));
    }

    pub fn live_window(&self) -> Vec<Sample> {
        self.acquisition.live().snapshot()
    }

    pub fn query_history(&self, t0: Time, t1: Time) -> Vec<Sample> {
        self.acquisition.history().range(t0, t1)
    }

    pub fn history(&self) -> &HistoryBuffer {
        self.acquisition.history()
    }

    /// Spike events since the previous call
    pub fn drain_spikes(&mut self) -> Vec<SpikeEvent> {
        let spikes: Vec<SpikeEvent> = self.pending_spikes.drain(..).collect();
        if !spikes.is_empty() {
            debug!("Drained {} spike events", spikes.len());
        }
        spikes
    }

    /// Alerts raised since the previous call
    pub fn drain_alerts(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.pending_alerts)
    }

    pub fn state(&self) -> &NeuronState {
        self.integrator.state()
    }

    pub fn time(&self) -> Time {
        self.integrator.state().simulation_time
    }

    pub fn dt(&self) -> Time {
        self.integrator.dt()
    }

    pub fn is_viable(&self) -> bool {
        self.integrator.is_viable()
    }

    pub fn protocol(&self) -> &StimulusProtocol {
        self.stimulus.protocol()
    }

    /// Stimulus applied on the most recent step
    pub fn last_current(&self) -> Current {
        self.last_current
    }

    /// Spikes detected since construction or the last reset
    pub fn spike_count(&self) -> usize {
        self.spike_count
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;

    fn quiet_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.acquisition.noise_std = 0.0;
        config.acquisition.sample_rate = 4;
        config
    }

    #[test]
    fn test_run_for_advances_time() {
        let mut engine = SimulationEngine::new(quiet_config()).unwrap();
        assert_eq!(engine.run_for(10.0), 400);
        assert!((engine.time() - 10.0).abs() < 1e-9);
        assert_eq!(engine.history().len(), 100);
        assert_eq!(engine.run_for(-1.0), 0);
    }

    #[test]
    fn test_spikes_are_drained_once() {
        let mut engine = SimulationEngine::new(quiet_config()).unwrap();
        engine.set_protocol(StimulusProtocol::Constant { amplitude: 10.0 }).unwrap();
        engine.run_for(100.0);
        let spikes = engine.drain_spikes();
        assert!(spikes.len() >= 5);
        assert_eq!(spikes.len(), engine.spike_count());
        assert!(engine.drain_spikes().is_empty());
        assert!(engine.history().samples().iter().any(|s| s.spike));
    }

    #[test]
    fn test_reset_keeps_protocol_and_clears_buffers() {
        let mut engine = SimulationEngine::new(quiet_config()).unwrap();
        let protocol = StimulusProtocol::Constant { amplitude: 10.0 };
        engine.set_protocol(protocol).unwrap();
        engine.run_for(50.0);
        engine.kill();
        engine.reset();

        assert_eq!(*engine.protocol(), protocol);
        assert_eq!(engine.time(), 0.0);
        assert!(engine.is_viable());
        assert!(engine.live_window().is_empty());
        assert!(engine.history().is_empty());
        assert!(engine.drain_spikes().is_empty());
        assert!(engine.drain_alerts().is_empty());
        assert_eq!(engine.spike_count(), 0);
    }

    #[test]
    fn test_kill_raises_cell_death() {
        let mut engine = SimulationEngine::new(quiet_config()).unwrap();
        engine.kill();
        let kinds: Vec<AlertKind> = engine.drain_alerts().iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AlertKind::CellDeath));
        assert!(!engine.is_viable());

        engine.run_for(5.0);
        assert!(engine.live_window().iter().all(|s| !s.viable));
    }

    #[test]
    fn test_damage_crossing_raises_cell_death_once() {
        let mut config = quiet_config();
        // ATP can never satisfy this threshold, so stress and damage climb from t = 0
        config.neuron.metabolism.atp_stress_threshold = 2.0;
        config.neuron.metabolism.stress_damage_threshold = 0.0;
        config.neuron.viability.failure_threshold = 1e-6;
        let mut engine = SimulationEngine::new(config).unwrap();
        engine.run_for(50.0);
        assert!(!engine.is_viable());

        let deaths: Vec<Alert> = engine
            .drain_alerts()
            .into_iter()
            .filter(|a| a.kind == AlertKind::CellDeath)
            .collect();
        assert_eq!(deaths.len(), 1);
        assert!(deaths[0].time > 10.0 && deaths[0].time < 20.0, "died at {}", deaths[0].time);

        engine.kill();
        engine.run_for(5.0);
        assert!(engine.drain_alerts().iter().all(|a| a.kind != AlertKind::CellDeath));
    }

    #[test]
    fn test_set_time_step() {
        let mut engine = SimulationEngine::new(quiet_config()).unwrap();
        assert!(engine.set_time_step(0.0).is_err());
        assert!(engine.set_time_step(f64::NAN).is_err());
        assert_eq!(engine.dt(), 0.025);

        engine.set_time_step(0.01).unwrap();
        assert_eq!(engine.run_for(1.0), 100);
        assert_eq!(engine.config().dt, 0.01);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = quiet_config();
        config.acquisition.live_window_size = 0;
        assert!(SimulationEngine::new(config).is_err());
    }
}
