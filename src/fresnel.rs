//! Fresnel coefficients of a single planar interface.
//!
//! Closed-form amplitude coefficients for a wave incident from a lossless
//! medium of real index `n1` onto a half-space of complex index `n2`, both
//! non-magnetic. `n2` follows the material convention (loss has `Im n2 < 0`).
//! Coefficients are returned as diagonal matrices `diag(p, s)` acting on the
//! field amplitudes parallel and perpendicular to the plane of incidence.
//!
//! A stack with no interior layers reduces to these formulas, so they serve
//! as a reference for the transfer-matrix solver.

use nalgebra::{Complex, Matrix2, Vector2};

use crate::snell;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn normal_incidence() {
        let r = refl(1.0, Complex::new(1.5, 0.0), 0.0);
        // p and s differ in sign at normal incidence
        assert_relative_eq!(r[(0, 0)].re, 0.2, epsilon = 1e-15);
        assert_relative_eq!(r[(1, 1)].re, -0.2, epsilon = 1e-15);
        let t = refr(1.0, Complex::new(1.5, 0.0), 0.0);
        assert_relative_eq!(t[(1, 1)].re, 0.8, epsilon = 1e-15);
        let power = reflectance(1.0, Complex::new(1.5, 0.0), 0.0);
        assert_relative_eq!(power.x, 0.04, epsilon = 1e-15);
    }

    #[test]
    fn oblique_incidence() {
        let power = reflectance(1.0, Complex::new(1.5, 0.0), FRAC_PI_4);
        assert_relative_eq!(power.x, 0.008466458978947487, epsilon = 1e-12);
        assert_relative_eq!(power.y, 0.09201336304552439, epsilon = 1e-12);
    }

    #[test]
    fn brewster_angle_has_no_p_reflection() {
        let brewster = 1.5f64.atan();
        let power = reflectance(1.0, Complex::new(1.5, 0.0), brewster);
        assert!(power.x < 1e-28);
        assert!(power.y > 0.0);
    }

    #[test]
    fn total_internal_reflection() {
        let power = reflectance(1.5, Complex::new(1.0, 0.0), 0.9);
        assert_relative_eq!(power.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(power.y, 1.0, epsilon = 1e-12);
    }
}

/// Normalized normal wavevectors `(q1, q2)` on both sides of the interface.
fn normal_wavevectors(n1: f64, n2: Complex<f64>, theta_i: f64) -> (Complex<f64>, Complex<f64>) {
    let kt = n1 * theta_i.sin();
    let q1 = Complex::new(n1 * theta_i.cos(), 0.0);
    let q2 = snell::normal_wavevector(n2 * n2, kt * kt);
    (q1, q2)
}

/// Reflection coefficients `diag(r_p, r_s)` for incidence at `theta_i`.
pub fn refl(n1: f64, n2: Complex<f64>, theta_i: f64) -> Matrix2<Complex<f64>> {
    let n2 = n2.conj();
    let (q1, q2) = normal_wavevectors(n1, n2, theta_i);
    let n1_sq = n1 * n1;
    let n2_sq = n2 * n2;
    let f11 = (n2_sq * q1 - q2 * n1_sq) / (n2_sq * q1 + q2 * n1_sq);
    let f22 = (q1 - q2) / (q1 + q2);
    Matrix2::from_diagonal(&Vector2::new(f11, f22))
}

/// Transmission coefficients `diag(t_p, t_s)` for incidence at `theta_i`.
pub fn refr(n1: f64, n2: Complex<f64>, theta_i: f64) -> Matrix2<Complex<f64>> {
    let n2 = n2.conj();
    let (q1, q2) = normal_wavevectors(n1, n2, theta_i);
    let n1_sq = n1 * n1;
    let n2_sq = n2 * n2;
    let f11 = (n2 * q1 * n1 * 2.0) / (n2_sq * q1 + q2 * n1_sq);
    let f22 = (q1 * 2.0) / (q1 + q2);
    Matrix2::from_diagonal(&Vector2::new(f11, f22))
}

/// Reflected power fractions `(R_p, R_s)`.
pub fn reflectance(n1: f64, n2: Complex<f64>, theta_i: f64) -> Vector2<f64> {
    let r = refl(n1, n2, theta_i);
    Vector2::new(r[(0, 0)].norm_sqr(), r[(1, 1)].norm_sqr())
}
