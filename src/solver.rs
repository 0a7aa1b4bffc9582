//! Scattering-matrix solution of a planar stack.
//!
//! The solver proceeds in four steps:
//! - Phase matching: every layer shares the transverse wavevector of the
//!   incident wave.
//! - Layer modes: each layer's dispersion relation gives four normal
//!   wavevectors and the mode matrix Π (see [`crate::modes`]).
//! - Reflection recursion: starting from the substrate, where nothing comes
//!   back, continuity of the tangential fields at each interface gives the
//!   reflection matrix `Γ_j` with `backward_j = Γ_j forward_j` at the top of
//!   every layer, plus the interface transmission matrix. Only decaying
//!   exponentials `exp(iγ⁺d)` and `exp(-iγ⁻d)` enter, so thick absorbing or
//!   evanescent layers do not amplify rounding errors.
//! - Forward pass: the incident amplitudes are known, and the forward
//!   amplitudes of each layer follow from the layer above. The solved fields
//!   are checked for continuity at every interface.

use log::debug;
use nalgebra::{Complex, Matrix2, Matrix4, Matrix4x2, Vector2, Vector4};
use serde::Serialize;

use crate::config::CONTINUITY_TOLERANCE;
use crate::error::StackError;
use crate::modes::{self, LayerModes};
use crate::snell;
use crate::stack::Stack;
use crate::wave::IncidentWave;


/// Transverse and normal wavevector components shared by a solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationConstants {
    /// Free-space wavenumber `2π / λ`.
    pub k0: f64,
    /// Transverse wavevector components `(α₀, β₀)`, identical in every layer.
    pub alpha: f64,
    pub beta: f64,
    /// Normal wavevectors `γ` of each layer, forward modes first.
    pub gamma: Vec<[Complex<f64>; 4]>,
}

impl PropagationConstants {
    /// The first forward normal wavevector of `layer`; for isotropic layers
    /// this is the layer's γ.
    pub fn forward(&self, layer: usize) -> Complex<f64> {
        self.gamma[layer][0]
    }
}

/// Mode amplitudes `[forward₁, forward₂, backward₁, backward₂]` per layer,
/// referenced at each layer's reference plane (see [`Stack::interfaces`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeAmplitudes(Vec<Vector4<Complex<f64>>>);

impl ModeAmplitudes {
    pub fn layer(&self, index: usize) -> &Vector4<Complex<f64>> {
        &self.0[index]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vector4<Complex<f64>>> {
        self.0.iter()
    }

    /// Reflected amplitudes in the superstrate.
    pub fn reflected(&self) -> Vector2<Complex<f64>> {
        let a = &self.0[0];
        Vector2::new(a[2], a[3])
    }

    /// Transmitted amplitudes in the substrate.
    pub fn transmitted(&self) -> Vector2<Complex<f64>> {
        let a = &self.0[self.0.len() - 1];
        Vector2::new(a[0], a[1])
    }
}

/// Everything needed to reconstruct fields and powers for one incident wave.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub wave: IncidentWave,
    pub constants: PropagationConstants,
    pub modes: Vec<LayerModes>,
    pub amplitudes: ModeAmplitudes,
}

impl Solution {
    /// Poynting flux of the incident wave through the first interface, the
    /// normalization of R, T and the absorption.
    pub fn incident_flux(&self) -> f64 {
        let a = self.amplitudes.layer(0);
        let zero = Complex::from(0.0);
        modes::flux(&(self.modes[0].pi * Vector4::new(a[0], a[1], zero, zero)))
    }
}

/// Solves `stack` for the incident `wave`.
///
/// Fails with [`StackError::Numerical`] when a layer's modes cannot be
/// separated, for instance at grazing incidence where γ vanishes, when an
/// interface system is singular, or when the solved fields are not continuous
/// to [`CONTINUITY_TOLERANCE`].
pub fn solve(stack: &Stack, wave: &IncidentWave) -> Result<Solution, StackError> {
    let k0 = wave.k0();
    let (kx, ky) = snell::transverse_wavevector(stack.superstrate_index(), wave.theta(), wave.phi());

    let modes = stack
        .layers()
        .iter()
        .map(|layer| LayerModes::new(layer, kx, ky))
        .collect::<Result<Vec<_>, _>>()?;
    for (layer, m) in stack.layers().iter().zip(&modes) {
        debug!("layer '{}' ({:?}): q = {:?}", layer.name, m.kind, m.q.as_slice());
    }

    let n = modes.len();
    let phases: Vec<_> = (0..n)
        .map(|j| modes[j].decaying_phases(k0, stack.thickness(j)))
        .collect();

    // d_j = Γ_j u_j at the top of every layer, from the substrate upward
    let mut reflection: Vec<Matrix2<Complex<f64>>> = vec![Matrix2::zeros(); n];
    let mut transmission: Vec<Matrix2<Complex<f64>>> = vec![Matrix2::zeros(); n - 1];
    for j in (0..n - 1).rev() {
        let (reflected, transmitted) = interface(&modes[j], &modes[j + 1], &reflection[j + 1]).ok_or_else(|| {
            StackError::numerical(format!(
                "interface between layers '{}' and '{}' is singular for theta = {}, phi = {}",
                stack.layers()[j].name,
                stack.layers()[j + 1].name,
                wave.theta(),
                wave.phi()
            ))
        })?;
        let (forward, backward) = &phases[j];
        reflection[j] = Matrix2::from_diagonal(backward) * reflected * Matrix2::from_diagonal(forward);
        transmission[j] = transmitted;
    }

    let f = wave.tangential_field().map(|x| Complex::new(x, 0.0));
    let mut amplitudes = Vec::with_capacity(n);
    let mut forward = f;
    for j in 0..n {
        let backward = reflection[j] * forward;
        amplitudes.push(Vector4::new(forward[0], forward[1], backward[0], backward[1]));
        if j + 1 < n {
            forward = transmission[j] * phases[j].0.component_mul(&forward);
        }
    }
    if amplitudes
        .iter()
        .flat_map(|a| a.iter())
        .any(|z| !z.re.is_finite() || !z.im.is_finite())
    {
        return Err(StackError::numerical(format!(
            "mode amplitudes are not finite for theta = {}, phi = {}",
            wave.theta(),
            wave.phi()
        )));
    }

    for j in 0..n - 1 {
        let mismatch = continuity_mismatch(
            (&modes[j], &amplitudes[j]),
            (&modes[j + 1], &amplitudes[j + 1]),
            k0,
            stack.thickness(j),
        );
        debug!("interface {}: relative field mismatch {:.3e}", j, mismatch);
        if mismatch.is_nan() || mismatch > CONTINUITY_TOLERANCE {
            return Err(StackError::numerical(format!(
                "tangential fields jump by {:.3e} (relative) at the bottom of layer '{}'",
                mismatch,
                stack.layers()[j].name
            )));
        }
    }

    let constants = PropagationConstants {
        k0,
        alpha: k0 * kx,
        beta: k0 * ky,
        gamma: modes
            .iter()
            .map(|m| [m.q[0] * k0, m.q[1] * k0, m.q[2] * k0, m.q[3] * k0])
            .collect(),
    };

    Ok(Solution {
        wave: *wave,
        constants,
        modes,
        amplitudes: ModeAmplitudes(amplitudes),
    })
}

/// Scattering relations of the interface below `upper`, given the reflection
/// matrix `below` of the lower layer at its top.
///
/// Returns `(Γ, τ)`: the backward amplitudes of `upper` at the interface are
/// `Γ v` and the forward amplitudes of `lower` are `τ v`, where `v` are the
/// forward amplitudes of `upper` arriving at the interface.
fn interface(
    upper: &LayerModes,
    lower: &LayerModes,
    below: &Matrix2<Complex<f64>>,
) -> Option<(Matrix2<Complex<f64>>, Matrix2<Complex<f64>>)> {
    let loaded: Matrix4x2<Complex<f64>> =
        lower.pi.fixed_columns::<2>(0).into_owned() + lower.pi.fixed_columns::<2>(2) * below;
    let mut system = Matrix4::zeros();
    system.fixed_columns_mut::<2>(0).copy_from(&loaded);
    system.fixed_columns_mut::<2>(2).copy_from(&(-upper.pi.fixed_columns::<2>(2).into_owned()));
    let x = system.lu().solve(&upper.pi.fixed_columns::<2>(0).into_owned())?;
    Some((x.fixed_rows::<2>(2).into_owned(), x.fixed_rows::<2>(0).into_owned()))
}

/// Relative jump of the tangential field between the bottom of `upper` and
/// the top of `lower`, scaled by the magnitudes of the individual modes.
fn continuity_mismatch(
    (upper, above): (&LayerModes, &Vector4<Complex<f64>>),
    (lower, below): (&LayerModes, &Vector4<Complex<f64>>),
    k0: f64,
    thickness: f64,
) -> f64 {
    let carried = upper.carry(above, k0, thickness);
    let jump = (upper.pi * carried - lower.pi * below).norm();
    let scale: f64 = (0..4)
        .map(|m| upper.pi.column(m).norm() * carried[m].norm() + lower.pi.column(m).norm() * below[m].norm())
        .sum();
    if scale == 0.0 {
        0.0
    } else {
        jump / scale
    }
}
