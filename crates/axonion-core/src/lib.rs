//! # Axonion Core
//!
//! Shared types and numerics for the Axonion single-neuron simulator.
//!
//! ## Contents
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`AxonionError`] | Setup-time error taxonomy shared by every crate |
//! | [`OdeSystem`] | Right-hand side of a system of ODEs |
//! | [`IntegrationMethod`] | Fixed-step explicit solvers (Euler, RK4) |
//! | [`RateFunction`] | Voltage-dependent gate rate expressions |
//! | [`GateKinetics`] | α/β kinetics of one gating particle |
//! | [`TimeSeries`] | Single-channel export format |
//!
//! ## Units
//!
//! Time is in milliseconds, voltage in millivolts, current densities in
//! µA/cm², conductances in mS/cm².

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common errors
///
/// Only setup-time problems are errors. Numeric excursions during stepping
/// are corrected by clamping and never surface here.
#[derive(Debug, Error)]
pub enum AxonionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AxonionError>;

/// Time point (ms)
pub type Time = f64;

/// Voltage (mV)
pub type Voltage = f64;

/// Current density (µA/cm^2)
pub type Current = f64;

/// Conductance (mS/cm^2)
pub type Conductance = f64;

/// Concentration (arbitrary units, normalized)
pub type Concentration = f64;

/// State vector for ODE systems
pub type StateVector = Array1<f64>;

/// Reject a non-positive or non-finite time step.
pub fn validate_time_step(dt: Time) -> Result<()> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(AxonionError::Configuration(format!(
            "time step must be a positive finite number of ms, got {}",
            dt
        )));
    }
    Ok(())
}

/// Time series data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Time points
    pub time: Vec<Time>,
    /// Values at each time point
    pub values: Vec<f64>,
    /// Variable name
    pub name: String,
    /// Units
    pub units: Option<String>,
}

impl TimeSeries {
    pub fn new(name: &str) -> Self {
        Self {
            time: Vec::new(),
            values: Vec::new(),
            name: name.to_string(),
            units: None,
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn push(&mut self, t: Time, v: f64) {
        self.time.push(t);
        self.values.push(v);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Smallest and largest recorded value
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// ODE system trait
pub trait OdeSystem {
    /// System dimension
    fn dimension(&self) -> usize;

    /// Compute derivatives: dy/dt = f(t, y)
    fn derivatives(&self, t: Time, y: &StateVector) -> StateVector;
}

/// Fixed-step explicit integration methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Forward Euler
    Euler,
    /// Classic 4th-order Runge-Kutta
    #[default]
    RungeKutta4,
}

impl IntegrationMethod {
    /// Advance `y` from `t` to `t + dt`.
    ///
    /// Deterministic: the same inputs always produce the same output.
    pub fn step<S: OdeSystem>(&self, system: &S, t: Time, y: &StateVector, dt: Time) -> StateVector {
        debug_assert_eq!(y.len(), system.dimension());
        match self {
            Self::Euler => {
                let k1 = system.derivatives(t, y);
                y + &(k1 * dt)
            }
            Self::RungeKutta4 => {
                let half = 0.5 * dt;
                let k1 = system.derivatives(t, y);
                let k2 = system.derivatives(t + half, &(y + &(&k1 * half)));
                let k3 = system.derivatives(t + half, &(y + &(&k2 * half)));
                let k4 = system.derivatives(t + dt, &(y + &(&k3 * dt)));
                let slope = k1 + &(k2 * 2.0) + &(k3 * 2.0) + &k4;
                y + &(slope * (dt / 6.0))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Euler => "euler",
            Self::RungeKutta4 => "rk4",
        }
    }
}

/// Rate function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RateFunction {
    /// Standard HH form: A*(V+B)/(exp((V+B)/C)-1)
    HodgkinHuxley { a: f64, b: f64, c: f64 },
    /// Exponential: A*exp((V+B)/C)
    Exponential { a: f64, b: f64, c: f64 },
    /// Sigmoid: A/(1+exp((V+B)/C))
    Sigmoid { a: f64, b: f64, c: f64 },
}

impl RateFunction {
    /// Width of the band around the removable singularity of the HH form
    const SINGULARITY_TOLERANCE: f64 = 1e-6;

    /// Evaluate rate at given voltage
    pub fn eval(&self, v: Voltage) -> f64 {
        match *self {
            Self::HodgkinHuxley { a, b, c } => {
                let x = (v + b) / c;
                if x.abs() < Self::SINGULARITY_TOLERANCE {
                    // L'Hopital's rule for x -> 0
                    a * c
                } else {
                    a * (v + b) / (x.exp() - 1.0)
                }
            }
            Self::Exponential { a, b, c } => a * ((v + b) / c).exp(),
            Self::Sigmoid { a, b, c } => a / (1.0 + ((v + b) / c).exp()),
        }
    }
}

/// α/β kinetics of one gating particle (m, h, n in Hodgkin-Huxley)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateKinetics {
    /// Power (exponent in the conductance product)
    pub power: i32,
    /// Opening rate
    pub alpha: RateFunction,
    /// Closing rate
    pub beta: RateFunction,
}

impl GateKinetics {
    /// (α, β) at voltage `v`
    pub fn rates(&self, v: Voltage) -> (f64, f64) {
        (self.alpha.eval(v), self.beta.eval(v))
    }

    /// dx/dt = α(1 - x) - βx
    pub fn derivative(&self, v: Voltage, x: f64) -> f64 {
        let (alpha, beta) = self.rates(v);
        alpha * (1.0 - x) - beta * x
    }

    /// Steady-state open fraction α/(α+β)
    pub fn steady_state(&self, v: Voltage) -> f64 {
        let (alpha, beta) = self.rates(v);
        let total = alpha + beta;
        if total > 0.0 {
            alpha / total
        } else {
            0.0
        }
    }

    /// x^power, the gate's contribution to channel conductance
    pub fn activation(&self, x: f64) -> f64 {
        x.powi(self.power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay {
        k: f64,
    }

    impl OdeSystem for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn derivatives(&self, _t: Time, y: &StateVector) -> StateVector {
            y * -self.k
        }
    }

    #[test]
    fn test_rate_functions() {
        let hh = RateFunction::HodgkinHuxley { a: -0.1, b: 40.0, c: -10.0 };
        let rate = hh.eval(-65.0);
        assert!(rate > 0.0);

        let exp = RateFunction::Exponential { a: 0.125, b: 65.0, c: -80.0 };
        assert!((exp.eval(-65.0) - 0.125).abs() < 1e-12);

        let sig = RateFunction::Sigmoid { a: 1.0, b: 35.0, c: -10.0 };
        assert!((sig.eval(-35.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_removable_singularity_uses_limit() {
        let alpha_m = RateFunction::HodgkinHuxley { a: -0.1, b: 40.0, c: -10.0 };
        assert_eq!(alpha_m.eval(-40.0), 1.0);
        // Continuous across the singular point
        assert!((alpha_m.eval(-40.0 + 1e-4) - 1.0).abs() < 1e-4);
        assert!((alpha_m.eval(-40.0 - 1e-4) - 1.0).abs() < 1e-4);

        let alpha_n = RateFunction::HodgkinHuxley { a: -0.01, b: 55.0, c: -10.0 };
        assert!((alpha_n.eval(-55.0) - 0.1).abs() < 1e-12);
        assert!(alpha_n.eval(-55.0).is_finite());
    }

    #[test]
    fn test_gate_steady_state() {
        let gate = GateKinetics {
            power: 4,
            alpha: RateFunction::HodgkinHuxley { a: -0.01, b: 55.0, c: -10.0 },
            beta: RateFunction::Exponential { a: 0.125, b: 65.0, c: -80.0 },
        };
        let x_inf = gate.steady_state(-65.0);
        assert!((x_inf - 0.3177).abs() < 1e-3);
        assert!(gate.derivative(-65.0, x_inf).abs() < 1e-12);
        assert!((gate.activation(0.5) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_rk4_exponential_decay() {
        let system = Decay { k: 1.0 };
        let mut y = StateVector::from(vec![1.0]);
        let dt = 0.1;
        for i in 0..10 {
            y = IntegrationMethod::RungeKutta4.step(&system, i as f64 * dt, &y, dt);
        }
        assert!((y[0] - (-1.0f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_euler_is_first_order() {
        let system = Decay { k: 2.0 };
        let y = StateVector::from(vec![1.0]);
        let next = IntegrationMethod::Euler.step(&system, 0.0, &y, 0.1);
        assert!((next[0] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_validate_time_step() {
        assert!(validate_time_step(0.025).is_ok());
        assert!(validate_time_step(0.0).is_err());
        assert!(validate_time_step(-1.0).is_err());
        assert!(validate_time_step(f64::NAN).is_err());
    }

    #[test]
    fn test_time_series() {
        let mut ts = TimeSeries::new("voltage").with_units("mV");
        ts.push(0.0, -65.0);
        ts.push(0.1, -64.0);
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.value_range(), Some((-65.0, -64.0)));
        assert_eq!(ts.units.as_deref(), Some("mV"));
    }
}
