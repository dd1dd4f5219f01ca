//! Hodgkin-Huxley ion channels
//!
//! ```text
//! C_m * dV/dt = I_inj - I_Na - I_K - I_leak
//! I_Na   = g_Na * m^3 * h * (V - E_Na)
//! I_K    = g_K  * n^4     * (V - E_K)
//! I_leak = g_L            * (V - E_L)
//! ```

use axonion_core::{Conductance, Current, GateKinetics, Voltage};
use serde::{Deserialize, Serialize};

/// Membrane parameters of the squid giant axon (1952 values, shifted to -65 mV rest)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelParameters {
    /// Membrane capacitance (µF/cm^2)
    pub c_m: f64,
    /// Sodium conductance (mS/cm^2)
    pub g_na: Conductance,
    /// Potassium conductance (mS/cm^2)
    pub g_k: Conductance,
    /// Leak conductance (mS/cm^2)
    pub g_leak: Conductance,
    /// Sodium reversal (mV)
    pub e_na: Voltage,
    /// Potassium reversal (mV)
    pub e_k: Voltage,
    /// Leak reversal (mV)
    pub e_leak: Voltage,
}

impl Default for ChannelParameters {
    fn default() -> Self {
        Self {
            c_m: 1.0,
            g_na: 120.0,
            g_k: 36.0,
            g_leak: 0.3,
            e_na: 50.0,
            e_k: -77.0,
            e_leak: -54.387,
        }
    }
}

/// HH gating particles, each an open fraction in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatingVariables {
    /// Sodium activation
    pub m: f64,
    /// Sodium inactivation
    pub h: f64,
    /// Potassium activation
    pub n: f64,
}

impl GatingVariables {
    pub fn clamped(self) -> Self {
        Self {
            m: self.m.clamp(0.0, 1.0),
            h: self.h.clamp(0.0, 1.0),
            n: self.n.clamp(0.0, 1.0),
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        [self.m, self.h, self.n]
            .iter()
            .all(|x| (0.0..=1.0).contains(x))
    }
}

/// Instantaneous transmembrane currents (µA/cm^2, positive = outward)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IonicCurrents {
    pub sodium: Current,
    pub potassium: Current,
    pub leak: Current,
}

impl IonicCurrents {
    pub fn total(&self) -> Current {
        self.sodium + self.potassium + self.leak
    }
}

/// Output of [`IonChannelModel::derivatives`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembraneDerivatives {
    /// dV/dt (mV/ms)
    pub d_voltage: f64,
    /// d(m, h, n)/dt (1/ms)
    pub d_gating: GatingVariables,
}

/// Standard HH rate expressions, V in mV, rates in 1/ms
pub mod kinetics {
    use axonion_core::{GateKinetics, RateFunction};

    /// m: α = 0.1(V+40)/(1-exp(-(V+40)/10)), β = 4exp(-(V+65)/18)
    pub fn sodium_activation() -> GateKinetics {
        GateKinetics {
            power: 3,
            alpha: RateFunction::HodgkinHuxley { a: -0.1, b: 40.0, c: -10.0 },
            beta: RateFunction::Exponential { a: 4.0, b: 65.0, c: -18.0 },
        }
    }

    /// h: α = 0.07exp(-(V+65)/20), β = 1/(1+exp(-(V+35)/10))
    pub fn sodium_inactivation() -> GateKinetics {
        GateKinetics {
            power: 1,
            alpha: RateFunction::Exponential { a: 0.07, b: 65.0, c: -20.0 },
            beta: RateFunction::Sigmoid { a: 1.0, b: 35.0, c: -10.0 },
        }
    }

    /// n: α = 0.01(V+55)/(1-exp(-(V+55)/10)), β = 0.125exp(-(V+65)/80)
    pub fn potassium_activation() -> GateKinetics {
        GateKinetics {
            power: 4,
            alpha: RateFunction::HodgkinHuxley { a: -0.01, b: 55.0, c: -10.0 },
            beta: RateFunction::Exponential { a: 0.125, b: 65.0, c: -80.0 },
        }
    }
}

/// Pure HH membrane model
#[derive(Debug, Clone, PartialEq)]
pub struct IonChannelModel {
    pub params: ChannelParameters,
    m: GateKinetics,
    h: GateKinetics,
    n: GateKinetics,
}

impl Default for IonChannelModel {
    fn default() -> Self {
        Self::new(ChannelParameters::default())
    }
}

impl IonChannelModel {
    pub fn new(params: ChannelParameters) -> Self {
        Self {
            params,
            m: kinetics::sodium_activation(),
            h: kinetics::sodium_inactivation(),
            n: kinetics::potassium_activation(),
        }
    }

    /// Membrane after loss of viability: active conductances gone, ionic
    /// gradients dissipated so the leak pulls toward 0 mV.
    pub fn collapsed(&self) -> Self {
        let mut params = self.params;
        params.g_na = 0.0;
        params.g_k = 0.0;
        params.e_leak = 0.0;
        Self { params, ..self.clone() }
    }

    /// Gates at their steady state for a membrane held at `v`
    pub fn steady_state_gating(&self, v: Voltage) -> GatingVariables {
        GatingVariables {
            m: self.m.steady_state(v),
            h: self.h.steady_state(v),
            n: self.n.steady_state(v),
        }
    }

    pub fn currents(&self, v: Voltage, gating: &GatingVariables) -> IonicCurrents {
        let p = &self.params;
        let g_na = p.g_na * self.m.activation(gating.m) * self.h.activation(gating.h);
        let g_k = p.g_k * self.n.activation(gating.n);
        IonicCurrents {
            sodium: g_na * (v - p.e_na),
            potassium: g_k * (v - p.e_k),
            leak: p.g_leak * (v - p.e_leak),
        }
    }

    pub fn derivatives(&self, v: Voltage, gating: &GatingVariables, injected: Current) -> MembraneDerivatives {
        let ionic = self.currents(v, gating);
        MembraneDerivatives {
            d_voltage: (injected - ionic.total()) / self.params.c_m,
            d_gating: GatingVariables {
                m: self.m.derivative(v, gating.m),
                h: self.h.derivative(v, gating.h),
                n: self.n.derivative(v, gating.n),
            },
        }
    }
}
