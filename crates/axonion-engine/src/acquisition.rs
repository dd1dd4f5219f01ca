//! Simulated data acquisition: downsampling, measurement noise, ADC
//! quantization, plus the live and history sample buffers.

use axonion_core::{AxonionError, Current, Result, Time, TimeSeries, Voltage};
use axonion_neuron::NeuronState;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// One acquired observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// ms
    pub time: Time,
    /// mV
    pub membrane_potential: Voltage,
    pub calcium: f64,
    pub atp: f64,
    pub stress: f64,
    pub damage: f64,
    /// µA/cm²
    pub injected_current: Current,
    /// A spike was detected since the previous sample
    pub spike: bool,
    pub viable: bool,
}

/// Analog-to-digital converter emulation for the voltage channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdcConfig {
    pub bits: u32,
    pub v_min: Voltage,
    pub v_max: Voltage,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            bits: 12,
            v_min: -100.0,
            v_max: 100.0,
        }
    }
}

impl AdcConfig {
    pub fn step_size(&self) -> Voltage {
        (self.v_max - self.v_min) / 2f64.powi(self.bits as i32)
    }

    /// Clamp to the input range, then round to the nearest code.
    pub fn quantize(&self, v: Voltage) -> Voltage {
        let step = self.step_size();
        let clamped = v.clamp(self.v_min, self.v_max);
        ((clamped - self.v_min) / step).round() * step + self.v_min
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Integration steps per acquired sample
    pub sample_rate: usize,
    /// Standard deviation of additive Gaussian noise (mV on the voltage channel)
    pub noise_std: f64,
    /// Also add noise to the metabolic channels, in their own units
    pub noise_all_channels: bool,
    pub adc: Option<AdcConfig>,
    /// Capacity of the live sliding window
    pub live_window_size: usize,
    /// None keeps the full run at full resolution
    pub history_capacity: Option<usize>,
    /// Fixed RNG seed for reproducible noise
    pub seed: Option<u64>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 40,
            noise_std: 0.5,
            noise_all_channels: false,
            adc: None,
            live_window_size: 2000,
            history_capacity: None,
            seed: None,
        }
    }
}

impl AcquisitionConfig {
    pub fn collect_problems(&self, problems: &mut Vec<String>) {
        if self.sample_rate == 0 {
            problems.push("acquisition.sample_rate must be at least 1".to_string());
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            problems.push(format!("acquisition.noise_std must be non-negative, got {}", self.noise_std));
        }
        if self.live_window_size == 0 {
            problems.push("acquisition.live_window_size must be at least 1".to_string());
        }
        if let Some(capacity) = self.history_capacity {
            if capacity < 2 {
                problems.push(format!("acquisition.history_capacity must be at least 2, got {}", capacity));
            }
        }
        if let Some(adc) = &self.adc {
            if adc.bits == 0 || adc.bits > 24 {
                problems.push(format!("acquisition.adc.bits must be in 1..=24, got {}", adc.bits));
            }
            if !(adc.v_min.is_finite() && adc.v_max.is_finite() && adc.v_max > adc.v_min) {
                problems.push("acquisition.adc range must satisfy v_min < v_max".to_string());
            }
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

/// Fixed-capacity sliding window; the oldest sample is evicted first.
#[derive(Debug, Clone)]
pub struct LiveBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl LiveBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Chronological copy of the window
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Exportable sample channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    MembranePotential,
    Calcium,
    Atp,
    Stress,
    Damage,
    InjectedCurrent,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::MembranePotential,
        Channel::Calcium,
        Channel::Atp,
        Channel::Stress,
        Channel::Damage,
        Channel::InjectedCurrent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::MembranePotential => "membrane_potential",
            Channel::Calcium => "calcium",
            Channel::Atp => "atp",
            Channel::Stress => "stress",
            Channel::Damage => "damage",
            Channel::InjectedCurrent => "injected_current",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Channel::MembranePotential => "mV",
            Channel::InjectedCurrent => "uA/cm2",
            _ => "a.u.",
        }
    }

    pub fn value(&self, sample: &Sample) -> f64 {
        match self {
            Channel::MembranePotential => sample.membrane_potential,
            Channel::Calcium => sample.calcium,
            Channel::Atp => sample.atp,
            Channel::Stress => sample.stress,
            Channel::Damage => sample.damage,
            Channel::InjectedCurrent => sample.injected_current,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = AxonionError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| AxonionError::Configuration(format!("unknown channel: {}", s)))
    }
}

/// Append-only chronological record of the run.
///
/// With a capacity set, a full buffer drops every other sample and doubles
/// its admission stride, so the whole run stays covered at lower resolution.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: Vec<Sample>,
    capacity: Option<usize>,
    stride: usize,
    offered: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            samples: Vec::new(),
            capacity,
            stride: 1,
            offered: 0,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        let admit = self.offered % self.stride == 0;
        self.offered += 1;
        if !admit {
            return;
        }

        if let Some(capacity) = self.capacity {
            if self.samples.len() >= capacity {
                self.decimate();
            }
        }
        self.samples.push(sample);
    }

    fn decimate(&mut self) {
        let mut index = 0;
        self.samples.retain(|_| {
            let keep = index % 2 == 0;
            index += 1;
            keep
        });
        self.stride *= 2;
        self.offered = 1;
    }

    /// Samples with `t0 <= time <= t1`; empty when `t0 > t1` or out of range.
    pub fn range(&self, t0: Time, t1: Time) -> Vec<Sample> {
        if t0.is_nan() || t1.is_nan() || t0 > t1 {
            return Vec::new();
        }
        let lo = self.samples.partition_point(|s| s.time < t0);
        let hi = self.samples.partition_point(|s| s.time <= t1);
        if lo >= hi {
            return Vec::new();
        }
        self.samples[lo..hi].to_vec()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn channel(&self, channel: Channel) -> TimeSeries {
        let mut series = TimeSeries::new(channel.name()).with_units(channel.units());
        for sample in &self.samples {
            series.push(sample.time, channel.value(sample));
        }
        series
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.stride = 1;
        self.offered = 0;
    }
}

pub struct AcquisitionSimulator {
    config: AcquisitionConfig,
    failure_threshold: f64,
    noise: Option<Normal<f64>>,
    rng: StdRng,
    steps_since_sample: usize,
    pending_spike: bool,
    live: LiveBuffer,
    history: HistoryBuffer,
}

impl AcquisitionSimulator {
    pub fn new(config: AcquisitionConfig, failure_threshold: f64) -> Result<Self> {
        config.validate()?;
        let noise = if config.noise_std > 0.0 {
            let normal = Normal::new(0.0, config.noise_std)
                .map_err(|e| AxonionError::Configuration(format!("noise distribution: {}", e)))?;
            Some(normal)
        } else {
            None
        };

        Ok(Self {
            rng: Self::make_rng(config.seed),
            noise,
            failure_threshold,
            steps_since_sample: 0,
            pending_spike: false,
            live: LiveBuffer::new(config.live_window_size),
            history: HistoryBuffer::new(config.history_capacity),
            config,
        })
    }

    fn make_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Observe `state` through the measurement chain. Does not touch the buffers.
    pub fn sample(&mut self, state: &NeuronState, injected: Current) -> Sample {
        let mut sample = Sample {
            time: state.simulation_time,
            membrane_potential: state.membrane_potential,
            calcium: state.intracellular_calcium,
            atp: state.atp_level,
            stress: state.mitochondrial_stress,
            damage: state.structural_damage,
            injected_current: injected,
            spike: false,
            viable: state.structural_damage < self.failure_threshold,
        };

        if let Some(noise) = &self.noise {
            sample.membrane_potential += noise.sample(&mut self.rng);
            if self.config.noise_all_channels {
                sample.calcium = (sample.calcium + noise.sample(&mut self.rng)).max(0.0);
                sample.atp = (sample.atp + noise.sample(&mut self.rng)).max(0.0);
                sample.stress = (sample.stress + noise.sample(&mut self.rng)).max(0.0);
                sample.damage = (sample.damage + noise.sample(&mut self.rng)).max(0.0);
            }
        }
        if let Some(adc) = &self.config.adc {
            sample.membrane_potential = adc.quantize(sample.membrane_potential);
        }
        sample
    }

    /// Called once per integration step; records every `sample_rate`th state.
    pub fn acquire(&mut self, state: &NeuronState, injected: Current, spike: bool) -> Option<Sample> {
        self.pending_spike |= spike;
        self.steps_since_sample += 1;
        if self.steps_since_sample < self.config.sample_rate {
            return None;
        }
        self.steps_since_sample = 0;

        let mut sample = self.sample(state, injected);
        sample.spike = std::mem::take(&mut self.pending_spike);
        self.live.push(sample);
        self.history.push(sample);
        Some(sample)
    }

    pub fn live(&self) -> &LiveBuffer {
        &self.live
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Empty both buffers and restart the downsampling counter.
    pub fn reset(&mut self) {
        self.live.clear();
        self.history.clear();
        self.steps_since_sample = 0;
        self.pending_spike = false;
        if self.config.seed.is_some() {
            self.rng = Self::make_rng(self.config.seed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axonion_neuron::{IonChannelModel, MetabolicModel};

    fn resting() -> NeuronState {
        NeuronState::resting(&IonChannelModel::default(), &MetabolicModel::default())
    }

    fn sample_at(time: f64) -> Sample {
        Sample {
            time,
            membrane_potential: -65.0 + time,
            calcium: 0.0,
            atp: 1.0,
            stress: 0.0,
            damage: 0.0,
            injected_current: 0.0,
            spike: false,
            viable: true,
        }
    }

    fn quiet_config() -> AcquisitionConfig {
        AcquisitionConfig {
            sample_rate: 1,
            noise_std: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_noise_reports_true_state() {
        let mut acq = AcquisitionSimulator::new(quiet_config(), 1.0).unwrap();
        let state = resting();
        let s = acq.sample(&state, 3.0);
        assert_eq!(s.membrane_potential, state.membrane_potential);
        assert_eq!(s.atp, state.atp_level);
        assert_eq!(s.injected_current, 3.0);
        assert!(s.viable);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let config = AcquisitionConfig { noise_std: 1.0, seed: Some(7), ..quiet_config() };
        let mut a = AcquisitionSimulator::new(config.clone(), 1.0).unwrap();
        let mut b = AcquisitionSimulator::new(config, 1.0).unwrap();
        let state = resting();
        for _ in 0..10 {
            assert_eq!(a.sample(&state, 0.0), b.sample(&state, 0.0));
        }
        assert_ne!(a.sample(&state, 0.0).membrane_potential, state.membrane_potential);
    }

    #[test]
    fn test_metabolic_noise_never_negative() {
        let config = AcquisitionConfig { noise_std: 5.0, noise_all_channels: true, seed: Some(1), ..quiet_config() };
        let mut acq = AcquisitionSimulator::new(config, 1.0).unwrap();
        let state = resting();
        for _ in 0..200 {
            let s = acq.sample(&state, 0.0);
            assert!(s.calcium >= 0.0 && s.atp >= 0.0 && s.stress >= 0.0 && s.damage >= 0.0);
        }
    }

    #[test]
    fn test_adc_quantization() {
        let adc = AdcConfig::default();
        let step = adc.step_size();
        assert!((step - 200.0 / 4096.0).abs() < 1e-12);
        assert_eq!(adc.quantize(250.0), 100.0);
        assert_eq!(adc.quantize(-300.0), -100.0);
        let q = adc.quantize(-64.98);
        assert!((q - -64.98).abs() <= step / 2.0 + 1e-12);
        let codes = (q - adc.v_min) / step;
        assert!((codes - codes.round()).abs() < 1e-9);
    }

    #[test]
    fn test_downsampling_and_spike_flag() {
        let config = AcquisitionConfig { sample_rate: 4, ..quiet_config() };
        let mut acq = AcquisitionSimulator::new(config, 1.0).unwrap();
        let mut state = resting();
        let mut recorded = Vec::new();
        for i in 0..12 {
            state.simulation_time = (i + 1) as f64 * 0.025;
            if let Some(s) = acq.acquire(&state, 0.0, i == 1) {
                recorded.push(s);
            }
        }
        assert_eq!(recorded.len(), 3);
        assert!(recorded[0].spike);
        assert!(!recorded[1].spike);
        assert_eq!(acq.history().len(), 3);
        assert_eq!(acq.live().len(), 3);
    }

    #[test]
    fn test_live_buffer_evicts_oldest() {
        let mut live = LiveBuffer::new(3);
        for i in 0..5 {
            live.push(sample_at(i as f64));
        }
        let times: Vec<f64> = live.snapshot().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
        assert_eq!(live.latest().map(|s| s.time), Some(4.0));
    }

    #[test]
    fn test_history_range_is_inclusive() {
        let mut history = HistoryBuffer::new(None);
        for i in 0..100 {
            history.push(sample_at(i as f64));
        }
        let window = history.range(10.0, 20.0);
        assert_eq!(window.len(), 11);
        assert_eq!(window[0].time, 10.0);
        assert_eq!(window[10].time, 20.0);

        assert!(history.range(20.0, 10.0).is_empty());
        assert!(history.range(500.0, 600.0).is_empty());
        assert_eq!(history.range(-10.0, 1000.0).len(), 100);
    }

    #[test]
    fn test_history_decimation_keeps_coverage() {
        let mut history = HistoryBuffer::new(Some(8));
        for i in 0..64 {
            history.push(sample_at(i as f64));
        }
        assert!(history.len() <= 8);
        assert!(history.stride() > 1);
        let times: Vec<f64> = history.samples().iter().map(|s| s.time).collect();
        assert_eq!(times[0], 0.0);
        assert!(*times.last().unwrap() >= 48.0);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_history_channel_export() {
        let mut history = HistoryBuffer::new(None);
        for i in 0..5 {
            history.push(sample_at(i as f64));
        }
        let series = history.channel(Channel::MembranePotential);
        assert_eq!(series.len(), 5);
        assert_eq!(series.units.as_deref(), Some("mV"));
        assert_eq!("atp".parse::<Channel>().unwrap(), Channel::Atp);
        assert!("voltage".parse::<Channel>().is_err());
    }

    #[test]
    fn test_config_validation() {
        let config = AcquisitionConfig {
            sample_rate: 0,
            noise_std: -1.0,
            live_window_size: 0,
            history_capacity: Some(1),
            ..Default::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        for field in ["sample_rate", "noise_std", "live_window_size", "history_capacity"] {
            assert!(msg.contains(field), "missing {} in {}", field, msg);
        }
    }
}
