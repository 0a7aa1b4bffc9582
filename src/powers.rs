//! Energy bookkeeping for a solved stack.
//!
//! All quantities are fractions of the incident Poynting flux through the
//! first interface:
//! - Reflectance and transmittance from the Poynting flux of the reflected
//!   and transmitted modes at the outer interfaces
//! - Per-layer absorption from the exact integral of the dissipated power
//!   density over each interior layer
//! - The energy-balance residual `|1 - R - T - ΣQ|` and its tolerance check
//!
//! # Absorption
//!
//! The time-averaged power dissipated per unit area in a layer of thickness
//! `d` is `(k0/2) ∫₀ᵈ (E* · ε'' E + H̃* · μ'' H̃) dz`, with ε'' and μ'' the
//! anti-Hermitian parts of the material tensors. Inside a layer the field is
//! a sum of four modes `exp(iγz)`, so every cross term integrates in closed
//! form: `∫₀ᵈ exp(i(γn - γm*)z) dz`.

use std::fmt;

use nalgebra::{Complex, Vector4};
use serde::Serialize;

use crate::config::{EXP_LIMIT, SMALL_PHASE};
use crate::error::StackError;
use crate::modes::{self, LayerModes};
use crate::solver::Solution;
use crate::stack::{LayerSpec, Stack};


/// Reflectance, transmittance and absorption of one solved stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Powers {
    pub incident: f64,       // incident flux ½Re(E × H̃*)·ẑ of the unit wave
    pub reflectance: f64,    // reflected fraction
    pub transmittance: f64,  // transmitted fraction
    pub absorption: Vec<f64>, // absorbed fraction per layer, zero in the outer layers
}

impl Powers {
    /// Evaluates the power balance of `solution`.
    ///
    /// Fails with [`StackError::Numerical`] if the incident wave carries no
    /// power into the stack or any fraction is not finite.
    pub fn evaluate(stack: &Stack, solution: &Solution) -> Result<Self, StackError> {
        let incident = solution.incident_flux();
        if incident.is_nan() || incident <= 0.0 {
            return Err(StackError::numerical(format!(
                "incident flux {incident} is not positive"
            )));
        }

        let zero = Complex::from(0.0);
        let first = &solution.modes[0];
        let last = &solution.modes[solution.modes.len() - 1];
        let r = solution.amplitudes.reflected();
        let t = solution.amplitudes.transmitted();
        let reflected = modes::flux(&(first.pi * Vector4::new(zero, zero, r[0], r[1])));
        let transmitted = modes::flux(&(last.pi * Vector4::new(t[0], t[1], zero, zero)));

        let k0 = solution.constants.k0;
        let interior = 1..stack.len() - 1;
        let absorption = (0..stack.len())
            .map(|j| {
                if interior.contains(&j) {
                    layer_absorption(
                        &stack.layers()[j],
                        &solution.modes[j],
                        solution.amplitudes.layer(j),
                        k0,
                        stack.thickness(j),
                    ) / incident
                } else {
                    0.0
                }
            })
            .collect();

        let powers = Self {
            incident,
            reflectance: -reflected / incident,
            transmittance: transmitted / incident,
            absorption,
        };
        if !powers.residual().is_finite() {
            return Err(StackError::numerical(format!(
                "power balance is not finite: R = {}, T = {}, Q = {:?}",
                powers.reflectance, powers.transmittance, powers.absorption
            )));
        }
        Ok(powers)
    }

    pub fn total_absorption(&self) -> f64 {
        self.absorption.iter().sum()
    }

    /// Energy-balance residual `|1 - R - T - ΣQ|`.
    pub fn residual(&self) -> f64 {
        (1.0 - self.reflectance - self.transmittance - self.total_absorption()).abs()
    }

    /// Checks the energy balance against `tolerance`.
    pub fn check(&self, tolerance: f64) -> Result<(), StackError> {
        let residual = self.residual();
        if residual <= tolerance {
            Ok(())
        } else {
            Err(StackError::PhysicalInconsistency {
                reflectance: self.reflectance,
                transmittance: self.transmittance,
                absorption: self.absorption.clone(),
                residual,
                tolerance,
            })
        }
    }
}

/// Power per unit area dissipated in one layer, in units of the incident flux
/// of a unit-amplitude wave (`H̃` normalization).
fn layer_absorption(
    layer: &LayerSpec,
    modes: &LayerModes,
    amplitudes: &Vector4<Complex<f64>>,
    k0: f64,
    thickness: f64,
) -> f64 {
    let eps_loss = layer.epsilon.loss();
    let mu_loss = layer.mu.loss();
    if eps_loss.norm() == 0.0 && mu_loss.norm() == 0.0 {
        return 0.0;
    }

    let fields: Vec<_> = (0..4).map(|m| modes.mode_fields(m)).collect();
    let mut total = Complex::from(0.0);
    for m in 0..4 {
        for n in 0..4 {
            let (em, hm) = &fields[m];
            let (en, hn) = &fields[n];
            let density = em.dotc(&(eps_loss * en)) + hm.dotc(&(mu_loss * hn));
            let kappa = (modes.q[n] - modes.q[m].conj()) * k0;
            total += density * weighted_integral(amplitudes[m].conj(), amplitudes[n], kappa, thickness);
        }
    }
    0.5 * k0 * total.re
}

/// `∫₀ᵈ exp(iκz) dz`, with a series for small `|κd|`.
fn phase_integral(kappa: Complex<f64>, d: f64) -> Complex<f64> {
    let i = Complex::<f64>::i();
    let x = i * kappa * d;
    if x.norm() < SMALL_PHASE {
        (Complex::from(1.0) + x / 2.0 + x * x / 6.0) * d
    } else {
        (x.exp() - 1.0) / (i * kappa)
    }
}

/// `a b ∫₀ᵈ exp(iκz) dz` for mode amplitudes `a`, `b`. The growth of a
/// backward mode across a thick layer is combined with its amplitude in log
/// space instead of overflowing.
fn weighted_integral(a: Complex<f64>, b: Complex<f64>, kappa: Complex<f64>, d: f64) -> Complex<f64> {
    let zero = Complex::from(0.0);
    if a == zero || b == zero {
        return zero;
    }
    let i = Complex::<f64>::i();
    let x = i * kappa * d;
    if x.re <= EXP_LIMIT {
        a * b * phase_integral(kappa, d)
    } else {
        ((a.ln() + b.ln() + x).exp() - a * b) / (i * kappa)
    }
}

impl fmt::Display for Powers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Powers:")?;
        writeln!(f, "  Reflectance:      {:.6}", self.reflectance)?;
        writeln!(f, "  Transmittance:    {:.6}", self.transmittance)?;
        for (index, q) in self.absorption.iter().enumerate() {
            writeln!(f, "  Absorbed [{:>2}]:    {:.6}", index, q)?;
        }
        writeln!(f, "  Absorbed (total): {:.6}", self.total_absorption())?;
        writeln!(f, "  Residual:         {:.3e}", self.residual())
    }
}
