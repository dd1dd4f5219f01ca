//! Threshold-crossing spike detection with hysteresis

use axonion_core::{Time, Voltage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeDetectorConfig {
    /// Voltage must rise strictly above this level (mV)
    pub threshold: Voltage,
    /// Voltage must fall below `threshold - hysteresis` before re-arming (mV)
    pub hysteresis: Voltage,
}

impl Default for SpikeDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            hysteresis: 10.0,
        }
    }
}

/// One action potential
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvent {
    /// Time of the upward threshold crossing (ms)
    pub time: Time,
    /// Highest voltage reached during the upswing (mV)
    pub peak_voltage: Voltage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Armed,
    Rising { onset: Time, peak: Voltage },
    /// Event already emitted; waiting for the re-arm level
    Latched,
}

/// Emits exactly one [`SpikeEvent`] per crossing, once the peak is passed.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeDetector {
    config: SpikeDetectorConfig,
    phase: Phase,
}

impl SpikeDetector {
    pub fn new(config: SpikeDetectorConfig) -> Self {
        Self {
            config,
            phase: Phase::Armed,
        }
    }

    pub fn config(&self) -> &SpikeDetectorConfig {
        &self.config
    }

    fn rearm_level(&self) -> Voltage {
        self.config.threshold - self.config.hysteresis
    }

    /// Feed one voltage sample; returns the event on the sample that ends the upswing.
    pub fn observe(&mut self, t: Time, v: Voltage) -> Option<SpikeEvent> {
        match self.phase {
            Phase::Armed => {
                if v > self.config.threshold {
                    self.phase = Phase::Rising { onset: t, peak: v };
                }
                None
            }
            Phase::Rising { onset, peak } => {
                if v > peak {
                    self.phase = Phase::Rising { onset, peak: v };
                    None
                } else {
                    self.phase = if v < self.rearm_level() { Phase::Armed } else { Phase::Latched };
                    Some(SpikeEvent { time: onset, peak_voltage: peak })
                }
            }
            Phase::Latched => {
                if v < self.rearm_level() {
                    self.phase = Phase::Armed;
                }
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Armed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut SpikeDetector, trace: &[f64]) -> Vec<SpikeEvent> {
        trace
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| detector.observe(i as f64, v))
            .collect()
    }

    #[test]
    fn test_single_spike() {
        let mut detector = SpikeDetector::new(SpikeDetectorConfig::default());
        let events = feed(&mut detector, &[-65.0, -30.0, 5.0, 30.0, 20.0, -20.0, -70.0]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, 2.0);
        assert_eq!(events[0].peak_voltage, 30.0);
    }

    #[test]
    fn test_hysteresis_suppresses_chatter() {
        let mut detector = SpikeDetector::new(SpikeDetectorConfig::default());
        // Wobbles around threshold without dropping below -10 mV
        let events = feed(&mut detector, &[-65.0, 1.0, 3.0, -2.0, 2.0, -5.0, 4.0, -8.0, 1.0]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_rearms_after_falling_below_margin() {
        let mut detector = SpikeDetector::new(SpikeDetectorConfig::default());
        let events = feed(&mut detector, &[-65.0, 10.0, 5.0, -15.0, 12.0, 8.0, -60.0]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].peak_voltage, 12.0);
    }

    #[test]
    fn test_subthreshold_trace_is_silent() {
        let mut detector = SpikeDetector::new(SpikeDetectorConfig::default());
        assert!(feed(&mut detector, &[-65.0, -50.0, -1.0, -40.0]).is_empty());
    }
}
