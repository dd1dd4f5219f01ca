//! Injected-current protocols and their phase clock

use axonion_core::{validate_time_step, AxonionError, Current, Result, Time};
use serde::{Deserialize, Serialize};
use std::fmt;

const MS_PER_S: f64 = 1000.0;

/// Injected current protocol. Currents in µA/cm², times in ms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StimulusProtocol {
    #[default]
    Off,
    Constant {
        amplitude: Current,
    },
    Step {
        baseline: Current,
        step_amplitude: Current,
        onset: Time,
    },
    /// `amplitude` during the first `width` ms of every `period`
    Pulse {
        amplitude: Current,
        period: Time,
        width: Time,
    },
}

impl StimulusProtocol {
    /// Pulse train specified by repetition frequency (Hz) rather than period.
    pub fn pulse_from_frequency(amplitude: Current, frequency_hz: f64, width: Time) -> Result<Self> {
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            return Err(AxonionError::Configuration(format!(
                "pulse frequency must be positive, got {} Hz",
                frequency_hz
            )));
        }
        let protocol = StimulusProtocol::Pulse {
            amplitude,
            period: MS_PER_S / frequency_hz,
            width,
        };
        protocol.validate()?;
        Ok(protocol)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StimulusProtocol::Off => "off",
            StimulusProtocol::Constant { .. } => "constant",
            StimulusProtocol::Step { .. } => "step",
            StimulusProtocol::Pulse { .. } => "pulse",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let problem = match *self {
            StimulusProtocol::Off => None,
            StimulusProtocol::Constant { amplitude } => {
                (!amplitude.is_finite()).then(|| "constant amplitude must be finite".to_string())
            }
            StimulusProtocol::Step { baseline, step_amplitude, onset } => {
                if !(baseline.is_finite() && step_amplitude.is_finite() && onset.is_finite()) {
                    Some("step parameters must be finite".to_string())
                } else if onset < 0.0 {
                    Some(format!("step onset must be non-negative, got {}", onset))
                } else {
                    None
                }
            }
            StimulusProtocol::Pulse { amplitude, period, width } => {
                if !(amplitude.is_finite() && period.is_finite() && width.is_finite()) {
                    Some("pulse parameters must be finite".to_string())
                } else if period <= 0.0 {
                    Some(format!("pulse period must be positive, got {}", period))
                } else if width < 0.0 {
                    Some(format!("pulse width must be non-negative, got {}", width))
                } else {
                    None
                }
            }
        };

        match problem {
            Some(msg) => Err(AxonionError::Configuration(msg)),
            None => Ok(()),
        }
    }

    /// Current at `t` ms after the protocol was selected.
    pub fn current_at(&self, t: Time) -> Current {
        match *self {
            StimulusProtocol::Off => 0.0,
            StimulusProtocol::Constant { amplitude } => amplitude,
            StimulusProtocol::Step { baseline, step_amplitude, onset } => {
                if t < onset {
                    baseline
                } else {
                    baseline + step_amplitude
                }
            }
            StimulusProtocol::Pulse { amplitude, period, width } => {
                let width = width.min(period);
                if t.rem_euclid(period) < width {
                    amplitude
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for StimulusProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StimulusProtocol::Off => write!(f, "off"),
            StimulusProtocol::Constant { amplitude } => write!(f, "constant {} uA/cm2", amplitude),
            StimulusProtocol::Step { baseline, step_amplitude, onset } => {
                write!(f, "step {} -> {} uA/cm2 at {} ms", baseline, baseline + step_amplitude, onset)
            }
            StimulusProtocol::Pulse { amplitude, period, width } => {
                write!(f, "pulse {} uA/cm2, {} ms every {} ms", amplitude, width, period)
            }
        }
    }
}

/// Steps closer than this fraction of `dt` to a protocol edge count as on it.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Evaluates the active protocol on its own phase clock.
///
/// The clock counts whole steps and derives the phase as `steps * dt`, so
/// edges that fall on the step grid are hit exactly however long the run.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusGenerator {
    protocol: StimulusProtocol,
    /// Phase elapsed under earlier time steps
    base_phase: Time,
    steps: u64,
    dt: Time,
}

impl StimulusGenerator {
    pub fn new(protocol: StimulusProtocol, dt: Time) -> Result<Self> {
        protocol.validate()?;
        validate_time_step(dt)?;
        Ok(Self { protocol, base_phase: 0.0, steps: 0, dt })
    }

    pub fn protocol(&self) -> &StimulusProtocol {
        &self.protocol
    }

    pub fn phase(&self) -> Time {
        self.base_phase + self.steps as f64 * self.dt
    }

    /// Swap protocols and restart the phase clock.
    pub fn set_protocol(&mut self, protocol: StimulusProtocol) -> Result<()> {
        protocol.validate()?;
        self.protocol = protocol;
        self.restart();
        Ok(())
    }

    /// Change the step size without moving the phase.
    pub fn set_dt(&mut self, dt: Time) -> Result<()> {
        validate_time_step(dt)?;
        self.base_phase = self.phase();
        self.steps = 0;
        self.dt = dt;
        Ok(())
    }

    pub fn restart(&mut self) {
        self.base_phase = 0.0;
        self.steps = 0;
    }

    pub fn current_at(&self, t_phase: Time) -> Current {
        self.protocol.current_at(t_phase)
    }

    /// Current for the coming step, then advance the clock by one step.
    pub fn next_current(&mut self) -> Current {
        let current = self.protocol.current_at(self.phase() + self.dt * EDGE_TOLERANCE);
        self.steps += 1;
        current
    }
}
