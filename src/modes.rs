//! Plane-wave eigenmodes of a homogeneous layer.
//!
//! For a fixed transverse wavevector `(Kx, Ky)` (normalized by `k0`), the
//! tangential field `ψ = (Ex, Ey, H̃x, H̃y)` of a homogeneous layer obeys
//! `dψ/dz = i k0 Δ ψ`, where Δ is the 4x4 Berreman matrix built from ε, μ and
//! `(Kx, Ky)`. Its eigenvalues `q` are the normalized normal wavevectors
//! (`γ = k0 q`) and its eigenvectors the tangential fields of the four modes.
//! `H̃ = Z0 H` is the magnetic field scaled by the vacuum impedance.
//!
//! - Isotropic layers use the closed form `q = ±sqrt(εμ - Kx² - Ky²)` with the
//!   mode basis `[Ex⁺, Ey⁺, Ex⁻, Ey⁻]`.
//! - Anisotropic layers diagonalize Δ numerically. Modes are split into two
//!   forward and two backward modes by the branch policy described in
//!   [`crate::snell`], falling back to the sign of the Poynting flux when the
//!   decay rate vanishes.
//!
//! The normal components follow algebraically from the tangential ones:
//! `Ez` from the z row of Ampère's law and `H̃z` from the z row of Faraday's
//! law, see [`LayerModes::normal`].

use nalgebra::{
    Complex, Matrix2, Matrix2x4, Matrix3, Matrix4, Matrix4x2, RowVector4, Schur, Vector2,
    Vector3, Vector4, SVD,
};
use serde::Serialize;

use crate::config::{
    DECAY_TOLERANCE, DEGENERACY_TOLERANCE, EIGEN_EPSILON, EIGEN_MAX_ITERATIONS, EXP_LIMIT,
    GRAZING_THRESHOLD,
};
use crate::error::StackError;
use crate::snell;
use crate::stack::LayerSpec;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    /// Checks that every column of Π is an eigenvector of Δ with eigenvalue q.
    fn assert_eigenmodes(modes: &LayerModes, eps: &Matrix3<Complex<f64>>, mu: &Matrix3<Complex<f64>>, kx: f64, ky: f64) {
        let delta = berreman_matrix(eps, mu, &modes.normal, kx, ky);
        for m in 0..4 {
            let v = modes.pi.column(m).into_owned();
            let residual = delta * v - v * modes.q[m];
            assert!(residual.norm() < 1e-10, "mode {m}: residual {}", residual.norm());
        }
    }

    #[test]
    fn isotropic_modes_match_berreman() {
        let layer = LayerSpec::slab("film", c(2.3, -0.2), 2.0, 1.0);
        let (kx, ky) = (0.3, 0.2);
        let modes = LayerModes::new(&layer, kx, ky).unwrap();
        assert_eq!(modes.kind, ModeKind::Isotropic);
        assert_eigenmodes(&modes, &layer.epsilon.phasor(), &layer.mu.phasor(), kx, ky);
        // forward modes decay toward +z
        assert!(modes.q[0].im > 0.0 && modes.q[1].im > 0.0);
        assert_eq!(modes.q[2], -modes.q[0]);
    }

    #[test]
    fn vacuum_normal_incidence() {
        let layer = LayerSpec::semi_infinite("air", 1.0, 1.0);
        let modes = LayerModes::new(&layer, 0.0, 0.0).unwrap();
        assert_eq!(modes.q, Vector4::new(c(1.0, 0.0), c(1.0, 0.0), c(-1.0, 0.0), c(-1.0, 0.0)));
        // forward Ex wave carries H̃y = Ex
        assert_relative_eq!(modes.pi[(3, 0)].re, 1.0);
        assert_relative_eq!(flux(&modes.pi.column(0).into_owned()), 0.5);
        assert_relative_eq!(flux(&modes.pi.column(2).into_owned()), -0.5);
    }

    #[test]
    fn grazing_layer_is_numerical_error() {
        let layer = LayerSpec::slab("film", 1.0, 1.0, 1.0);
        let err = LayerModes::new(&layer, 1.0, 0.0);
        assert!(matches!(err, Err(StackError::Numerical(_))));
    }

    #[test]
    fn anisotropic_modes_are_eigenvectors() {
        let eps = Matrix3::new(
            c(2.5, -0.05), c(0.3, 0.0), c(0.1, 0.0),
            c(0.3, 0.0), c(3.1, -0.02), c(0.0, 0.0),
            c(0.1, 0.0), c(0.0, 0.0), c(2.2, -0.01),
        );
        let layer = LayerSpec::slab("crystal", crate::material::Material::tensor(eps), 1.0, 0.8);
        let (kx, ky) = (0.4, -0.1);
        let modes = LayerModes::new(&layer, kx, ky).unwrap();
        assert_eq!(modes.kind, ModeKind::Anisotropic);
        assert_eigenmodes(&modes, &layer.epsilon.phasor(), &layer.mu.phasor(), kx, ky);
        assert!(modes.q[0].im > 0.0 && modes.q[1].im > 0.0);
        assert!(modes.q[2].im < 0.0 && modes.q[3].im < 0.0);
        // tangential E of every mode has unit norm
        for m in 0..4 {
            let e = (modes.pi[(0, m)].norm_sqr() + modes.pi[(1, m)].norm_sqr()).sqrt();
            assert_relative_eq!(e, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn degenerate_lossless_uniaxial_at_normal_incidence() {
        let eps = Matrix3::from_diagonal(&Vector3::new(c(2.0, 0.0), c(2.0, 0.0), c(2.8, 0.0)));
        let layer = LayerSpec::slab("uniaxial", crate::material::Material::tensor(eps), 1.0, 1.0);
        let modes = LayerModes::new(&layer, 0.0, 0.0).unwrap();
        let root = 2.0f64.sqrt();
        for m in 0..2 {
            assert_relative_eq!(modes.q[m].re, root, epsilon = 1e-10);
            assert_relative_eq!(modes.q[m + 2].re, -root, epsilon = 1e-10);
            assert!(flux(&modes.pi.column(m).into_owned()) > 0.0);
        }
        assert!(modes.pi.lu().is_invertible());
    }

    #[test]
    fn anisotropic_flux_splits_lossless_modes() {
        // tilted lossless uniaxial crystal: all four q are real and asymmetric
        let rot = nalgebra::Rotation3::from_axis_angle(&Vector3::y_axis(), 0.5);
        let m = crate::material::Material::tensor(Matrix3::from_diagonal(&Vector3::new(
            c(2.0, 0.0),
            c(2.0, 0.0),
            c(2.8, 0.0),
        )))
        .rotated(&rot);
        let layer = LayerSpec::slab("tilted", m, 1.0, 1.3);
        let modes = LayerModes::new(&layer, 0.5, 0.2).unwrap();
        for m in 0..4 {
            assert!(modes.q[m].im.abs() < 1e-9);
            let s = flux(&modes.pi.column(m).into_owned());
            assert_eq!(s > 0.0, m < 2, "mode {m} flux {s}");
        }
    }

    #[test]
    fn scaled_exp_survives_overflowing_growth() {
        assert_eq!(scaled_exp(c(0.0, 0.0), c(900.0, 0.0)), c(0.0, 0.0));
        let direct = scaled_exp(c(0.5, -0.25), c(1.2, 0.7));
        let expected = c(0.5, -0.25) * c(1.2, 0.7).exp();
        assert_relative_eq!(direct.re, expected.re, epsilon = 1e-15);
        let tiny = c(1e-300, 0.0);
        let value = scaled_exp(tiny, c(710.0, 0.0));
        assert_relative_eq!(value.re.ln(), 1e-300f64.ln() + 710.0, epsilon = 1e-9);
    }

    #[test]
    fn decaying_phases_never_grow() {
        let layer = LayerSpec::slab("metal", c(-10.0, -1.0), 1.0, 2.0);
        let modes = LayerModes::new(&layer, 0.3, 0.0).unwrap();
        let k0 = 2.0 * std::f64::consts::PI;
        let (forward, backward) = modes.decaying_phases(k0, 2.0);
        for z in forward.iter().chain(backward.iter()) {
            assert!(z.norm() < 1e-10);
        }
        let carried = modes.carry(&Vector4::repeat(c(1.0, 0.0)), k0, 2.0);
        assert_eq!(carried[0], forward[0]);
        assert_relative_eq!((carried[2] * backward[0]).re, 1.0, epsilon = 1e-9);
    }
}

/// How the modes of a layer were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeKind {
    /// Closed-form isotropic dispersion relation.
    Isotropic,
    /// Numerical eigendecomposition of the Berreman matrix.
    Anisotropic,
}

/// Eigenmodes of one layer for a fixed transverse wavevector.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerModes {
    /// Normalized normal wavevectors, forward modes first.
    pub q: Vector4<Complex<f64>>,
    /// Mode matrix Π: column `m` is the tangential field `(Ex, Ey, H̃x, H̃y)` of mode `m`.
    pub pi: Matrix4<Complex<f64>>,
    /// Rows mapping a tangential field onto `Ez` (row 0) and `H̃z` (row 1).
    pub normal: Matrix2x4<Complex<f64>>,
    pub kind: ModeKind,
}

impl LayerModes {
    /// Solves the dispersion relation of `layer` for the normalized transverse
    /// wavevector `(kx, ky)`.
    pub fn new(layer: &LayerSpec, kx: f64, ky: f64) -> Result<Self, StackError> {
        let eps = layer.epsilon.phasor();
        let mu = layer.mu.phasor();
        let normal = normal_rows(&eps, &mu, kx, ky);

        let (q, pi, kind) = match (layer.epsilon.scalar(), layer.mu.scalar()) {
            (Some(e), Some(m)) => {
                let (q, pi) = isotropic_modes(e.conj(), m.conj(), kx, ky, &layer.name)?;
                (q, pi, ModeKind::Isotropic)
            }
            _ => {
                let delta = berreman_matrix(&eps, &mu, &normal, kx, ky);
                let (q, pi) = anisotropic_modes(&delta, &layer.name)?;
                (q, pi, ModeKind::Anisotropic)
            }
        };

        if !pi.lu().is_invertible() {
            return Err(StackError::numerical(format!(
                "mode matrix of layer '{}' is singular",
                layer.name
            )));
        }

        Ok(Self {
            q,
            pi,
            normal,
            kind,
        })
    }

    /// Mode amplitudes carried a distance `d` along z, `a_m exp(i k0 q_m d)`.
    pub fn carry(&self, amplitudes: &Vector4<Complex<f64>>, k0: f64, d: f64) -> Vector4<Complex<f64>> {
        let i = Complex::<f64>::i();
        amplitudes.zip_map(&self.q, |a, q| scaled_exp(a, i * q * (k0 * d)))
    }

    /// `exp(i k0 q d)` of the two forward modes and `exp(-i k0 q d)` of the
    /// two backward modes. Neither grows for passive or gain layers.
    pub fn decaying_phases(&self, k0: f64, d: f64) -> (Vector2<Complex<f64>>, Vector2<Complex<f64>>) {
        let i = Complex::<f64>::i();
        let phase = |q: Complex<f64>, sign: f64| (i * q * (sign * k0 * d)).exp();
        (
            Vector2::new(phase(self.q[0], 1.0), phase(self.q[1], 1.0)),
            Vector2::new(phase(self.q[2], -1.0), phase(self.q[3], -1.0)),
        )
    }

    /// Full `(E, H̃)` vectors of a tangential field `psi` in this layer.
    pub fn expand(&self, psi: &Vector4<Complex<f64>>) -> (Vector3<Complex<f64>>, Vector3<Complex<f64>>) {
        let normal = self.normal * psi;
        (
            Vector3::new(psi[0], psi[1], normal[0]),
            Vector3::new(psi[2], psi[3], normal[1]),
        )
    }

    /// Full `(E, H̃)` vectors of mode `m` at its reference plane.
    pub fn mode_fields(&self, m: usize) -> (Vector3<Complex<f64>>, Vector3<Complex<f64>>) {
        self.expand(&self.pi.column(m).into_owned())
    }
}

/// Time-averaged Poynting flux `½ Re(E × H̃*)·ẑ` of a tangential field.
pub fn flux(psi: &Vector4<Complex<f64>>) -> f64 {
    0.5 * (psi[0] * psi[3].conj() - psi[1] * psi[2].conj()).re
}

/// `a exp(x)`, formed in log space when `exp(x)` alone would overflow.
pub fn scaled_exp(a: Complex<f64>, x: Complex<f64>) -> Complex<f64> {
    if a == Complex::from(0.0) {
        Complex::from(0.0)
    } else if x.re <= EXP_LIMIT {
        a * x.exp()
    } else {
        (a.ln() + x).exp()
    }
}

/// Rows `cE`, `cH` with `Ez = cE·ψ` and `H̃z = cH·ψ`.
fn normal_rows(
    eps: &Matrix3<Complex<f64>>,
    mu: &Matrix3<Complex<f64>>,
    kx: f64,
    ky: f64,
) -> Matrix2x4<Complex<f64>> {
    let kx = Complex::from(kx);
    let ky = Complex::from(ky);
    let ezz = eps[(2, 2)];
    let mzz = mu[(2, 2)];
    Matrix2x4::from_rows(&[
        RowVector4::new(-eps[(2, 0)], -eps[(2, 1)], ky, -kx) / ezz,
        RowVector4::new(-ky, kx, -mu[(2, 0)], -mu[(2, 1)]) / mzz,
    ])
}

/// The 4x4 matrix Δ of `dψ/dz = i k0 Δ ψ`.
fn berreman_matrix(
    eps: &Matrix3<Complex<f64>>,
    mu: &Matrix3<Complex<f64>>,
    normal: &Matrix2x4<Complex<f64>>,
    kx: f64,
    ky: f64,
) -> Matrix4<Complex<f64>> {
    let zero = Complex::from(0.0);
    let kx = Complex::from(kx);
    let ky = Complex::from(ky);
    let ez: RowVector4<Complex<f64>> = normal.row(0).into_owned();
    let hz: RowVector4<Complex<f64>> = normal.row(1).into_owned();
    Matrix4::from_rows(&[
        RowVector4::new(zero, zero, mu[(1, 0)], mu[(1, 1)]) + ez * kx + hz * mu[(1, 2)],
        RowVector4::new(zero, zero, -mu[(0, 0)], -mu[(0, 1)]) + ez * ky - hz * mu[(0, 2)],
        RowVector4::new(-eps[(1, 0)], -eps[(1, 1)], zero, zero) - ez * eps[(1, 2)] + hz * kx,
        RowVector4::new(eps[(0, 0)], eps[(0, 1)], zero, zero) + ez * eps[(0, 2)] + hz * ky,
    ])
}

fn isotropic_modes(
    eps: Complex<f64>,
    mu: Complex<f64>,
    kx: f64,
    ky: f64,
    name: &str,
) -> Result<(Vector4<Complex<f64>>, Matrix4<Complex<f64>>), StackError> {
    let q = snell::normal_wavevector(eps * mu, kx * kx + ky * ky);
    if q.norm() <= GRAZING_THRESHOLD * (1.0 + (eps * mu).norm()) {
        return Err(StackError::numerical(format!(
            "normal wavevector vanishes in layer '{name}' (grazing incidence or cutoff)"
        )));
    }

    let kx = Complex::from(kx);
    let ky = Complex::from(ky);
    let mode = |ex: Complex<f64>, ey: Complex<f64>, kz: Complex<f64>| {
        let ez = -(kx * ex + ky * ey) / kz;
        Vector4::new(ex, ey, (ky * ez - kz * ey) / mu, (kz * ex - kx * ez) / mu)
    };
    let one = Complex::from(1.0);
    let zero = Complex::from(0.0);
    let pi = Matrix4::from_columns(&[
        mode(one, zero, q),
        mode(zero, one, q),
        mode(one, zero, -q),
        mode(zero, one, -q),
    ]);
    Ok((Vector4::new(q, q, -q, -q), pi))
}

fn anisotropic_modes(
    delta: &Matrix4<Complex<f64>>,
    name: &str,
) -> Result<(Vector4<Complex<f64>>, Matrix4<Complex<f64>>), StackError> {
    let eigenvalues = Schur::try_new(*delta, EIGEN_EPSILON, EIGEN_MAX_ITERATIONS)
        .and_then(|schur| schur.eigenvalues())
        .ok_or_else(|| {
            StackError::numerical(format!("eigenvalue iteration failed in layer '{name}'"))
        })?;

    let mut forward = Vec::with_capacity(2);
    let mut backward = Vec::with_capacity(2);
    for &q in eigenvalues.iter() {
        if is_forward(delta, q, name)? {
            forward.push(q);
        } else {
            backward.push(q);
        }
    }
    if forward.len() != 2 {
        return Err(StackError::numerical(format!(
            "layer '{}' has {} forward modes instead of 2 (q = {:?})",
            name,
            forward.len(),
            eigenvalues.as_slice()
        )));
    }

    let (qf, vf) = mode_pair(delta, forward[0], forward[1], name)?;
    let (qb, vb) = mode_pair(delta, backward[0], backward[1], name)?;
    Ok((
        Vector4::new(qf[0], qf[1], qb[0], qb[1]),
        Matrix4::from_columns(&[vf[0], vf[1], vb[0], vb[1]]),
    ))
}

/// Branch policy: decaying toward +z, or carrying power toward +z when the
/// decay rate vanishes.
fn is_forward(delta: &Matrix4<Complex<f64>>, q: Complex<f64>, name: &str) -> Result<bool, StackError> {
    if q.im.abs() > DECAY_TOLERANCE * (1.0 + q.norm()) {
        return Ok(q.im > 0.0);
    }
    let shifted = delta - Matrix4::from_diagonal_element(q);
    let v = null_space(&shifted, 1, name)?[0];
    let s = flux(&v);
    if s.abs() <= GRAZING_THRESHOLD * v.norm_squared() {
        return Err(StackError::numerical(format!(
            "mode q = {q} of layer '{name}' carries no power along the stack (grazing incidence)"
        )));
    }
    Ok(s > 0.0)
}

/// Right singular vectors of the `count` smallest singular values.
fn null_space(
    m: &Matrix4<Complex<f64>>,
    count: usize,
    name: &str,
) -> Result<Vec<Vector4<Complex<f64>>>, StackError> {
    let svd = SVD::try_new(*m, false, true, EIGEN_EPSILON, EIGEN_MAX_ITERATIONS);
    let (values, v_t) = match svd {
        Some(SVD {
            singular_values,
            v_t: Some(v_t),
            ..
        }) => (singular_values, v_t),
        _ => {
            return Err(StackError::numerical(format!(
                "singular value iteration failed in layer '{name}'"
            )))
        }
    };
    let mut order: Vec<usize> = (0..4).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    Ok(order
        .into_iter()
        .take(count)
        .map(|k| v_t.row(k).adjoint())
        .collect())
}

/// Eigenpairs of Δ for two eigenvalues travelling in the same direction.
///
/// The pair spans the null space of `(Δ - q1)(Δ - q2)`, which stays well
/// defined when `q1 ≈ q2`. Δ restricted to that plane is diagonalized in
/// closed form; a degenerate, non-defective pair keeps the orthonormal basis.
fn mode_pair(
    delta: &Matrix4<Complex<f64>>,
    q1: Complex<f64>,
    q2: Complex<f64>,
    name: &str,
) -> Result<([Complex<f64>; 2], [Vector4<Complex<f64>>; 2]), StackError> {
    let product =
        (delta - Matrix4::from_diagonal_element(q1)) * (delta - Matrix4::from_diagonal_element(q2));
    let basis = null_space(&product, 2, name)?;
    let plane = Matrix4x2::from_columns(&[basis[0], basis[1]]);
    let reduced: Matrix2<Complex<f64>> = plane.adjoint() * delta * plane;

    let half_trace = (reduced[(0, 0)] + reduced[(1, 1)]) * 0.5;
    let half_gap = (reduced[(0, 0)] - reduced[(1, 1)]) * 0.5;
    let root = (half_gap * half_gap + reduced[(0, 1)] * reduced[(1, 0)]).sqrt();
    let scale = 1.0 + half_trace.norm();

    if root.norm() <= DEGENERACY_TOLERANCE * scale {
        let offset = reduced - Matrix2::from_diagonal_element(half_trace);
        if offset.norm() > DEGENERACY_TOLERANCE.sqrt() * scale {
            return Err(StackError::numerical(format!(
                "layer '{name}' has a defective mode pair at q = {half_trace}"
            )));
        }
        return Ok((
            [half_trace; 2],
            [normalized(basis[0]), normalized(basis[1])],
        ));
    }

    let values = [half_trace + root, half_trace - root];
    let vectors = values.map(|value| normalized(plane * eigenvector_2x2(&reduced, value)));
    // x-like mode first
    if vectors[1][0].norm() > vectors[0][0].norm() {
        Ok(([values[1], values[0]], [vectors[1], vectors[0]]))
    } else {
        Ok((values, vectors))
    }
}

fn eigenvector_2x2(a: &Matrix2<Complex<f64>>, value: Complex<f64>) -> Vector2<Complex<f64>> {
    let first = Vector2::new(a[(0, 1)], value - a[(0, 0)]);
    let second = Vector2::new(value - a[(1, 1)], a[(1, 0)]);
    if first.norm() >= second.norm() {
        first
    } else {
        second
    }
}

/// Scales a mode to unit tangential E and makes its dominant E component real.
fn normalized(v: Vector4<Complex<f64>>) -> Vector4<Complex<f64>> {
    let tangential = (v[0].norm_sqr() + v[1].norm_sqr()).sqrt();
    let size = if tangential > GRAZING_THRESHOLD * v.norm() {
        tangential
    } else {
        v.norm()
    };
    let pivot = if v[0].norm() >= v[1].norm() { v[0] } else { v[1] };
    let phase = if pivot.norm() > 0.0 {
        pivot.conj() / pivot.norm()
    } else {
        Complex::from(1.0)
    };
    v * (phase / size)
}
