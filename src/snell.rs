//! Phase matching across planar interfaces.
//!
//! Every layer of a planar stack shares the transverse wavevector of the
//! incident wave (the generalized Snell invariant). This module provides:
//! - The normalized transverse wavevector `(Kx, Ky)` of the incident wave
//! - The normal wavevector component of an isotropic layer, with an explicit
//!   branch policy for complex media
//!
//! # Branch policy
//!
//! With e^{-iωt} phasors a wave `exp(iγz)` travels or decays toward `+z` when
//! `Im γ > 0`, or when `Im γ = 0` and `Re γ > 0`. [`normal_wavevector`]
//! always returns this forward root; the backward root is its negative.

use nalgebra::Complex;


/// Normalized transverse wavevector `(Kx, Ky) = n1 sinθ (cosφ, sinφ)` of a
/// wave incident at polar angle `theta` and azimuth `phi` from a medium of
/// real index `n1`. Multiply by `k0` for physical units.
pub fn transverse_wavevector(n1: f64, theta: f64, phi: f64) -> (f64, f64) {
    let kt = n1 * theta.sin();
    (kt * phi.cos(), kt * phi.sin())
}

/// Forward root of `q² = εμ - Kt²` for an isotropic layer, where `eps_mu` is
/// the product of the phasor-convention ε and μ and `kt2 = Kx² + Ky²`.
pub fn normal_wavevector(eps_mu: Complex<f64>, kt2: f64) -> Complex<f64> {
    forward_branch((eps_mu - kt2).sqrt())
}

/// Maps a root `q` or `-q` onto the forward one.
pub fn forward_branch(q: Complex<f64>) -> Complex<f64> {
    if q.im < 0.0 || (q.im == 0.0 && q.re < 0.0) {
        -q
    } else {
        q
    }
}
