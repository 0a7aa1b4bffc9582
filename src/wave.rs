//! The illuminating plane wave.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Vector2, Vector3};
use serde::Serialize;

use crate::error::StackError;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_bad_inputs() {
        assert!(IncidentWave::new(0.0, 0.0, 0.0, 0.0).is_err());
        assert!(IncidentWave::new(-1.0, 0.0, 0.0, 0.0).is_err());
        assert!(IncidentWave::new(f64::NAN, 0.0, 0.0, 0.0).is_err());
        assert!(IncidentWave::new(1.0, -0.1, 0.0, 0.0).is_err());
        assert!(IncidentWave::new(1.0, PI, 0.0, 0.0).is_err());
        assert!(IncidentWave::new(1.0, 0.3, f64::INFINITY, 0.0).is_err());
        assert!(IncidentWave::new(1.0, 0.3, 0.0, f64::NAN).is_err());
        assert!(IncidentWave::new(1.0, 0.3, 7.0, -2.0).is_ok());
    }

    #[test]
    fn polarization_is_a_unit_transverse_vector() {
        let wave = IncidentWave::new(1.0, 0.4, 0.3, 0.7).unwrap();
        let e = wave.polarization();
        let k = Vector3::new(0.4f64.sin() * 0.3f64.cos(), 0.4f64.sin() * 0.3f64.sin(), 0.4f64.cos());
        assert_relative_eq!(e.norm(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(e.dot(&k), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn obtuse_theta_is_transverse_to_the_launched_wave() {
        let (theta, phi, psi) = (PI - 0.6, 0.3, 0.7);
        let wave = IncidentWave::new(1.0, theta, phi, psi).unwrap();
        let e = wave.polarization();
        let k = Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos().abs());
        assert_relative_eq!(e.norm(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(e.dot(&k), 0.0, epsilon = 1e-15);

        let mirrored = IncidentWave::new(1.0, 0.6, phi, PI - psi).unwrap().polarization();
        assert_relative_eq!(e, mirrored, epsilon = 1e-15);
    }

    #[test]
    fn psi_selects_p_and_s() {
        let p = IncidentWave::new(1.0, 0.5, 0.0, 0.0).unwrap().polarization();
        assert_relative_eq!(p.y, 0.0);
        let s = IncidentWave::new(1.0, 0.5, 0.0, PI / 2.0).unwrap().polarization();
        assert_relative_eq!(s.x, 0.0, epsilon = 1e-16);
        assert_relative_eq!(s.y, 1.0);
        assert_relative_eq!(s.z, 0.0, epsilon = 1e-16);
    }

    #[test]
    fn builders_revalidate() {
        let wave = IncidentWave::normal(1.0).unwrap();
        assert_relative_eq!(wave.k0(), 2.0 * PI);
        assert!(wave.with_wavelength(-2.0).is_err());
        assert!(wave.with_theta(4.0).is_err());
        assert_eq!(wave.with_theta(0.2).unwrap().theta(), 0.2);
    }
}

/// A monochromatic plane wave of unit amplitude.
///
/// `theta` is the polar angle in the superstrate, measured from the stack
/// normal, `phi` the azimuth of the plane of incidence and `psi` the
/// polarization angle: `psi = 0` puts E in the plane of incidence (p/TM),
/// `psi = π/2` perpendicular to it (s/TE). All angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IncidentWave {
    wavelength: f64,
    theta: f64,
    phi: f64,
    psi: f64,
}

impl IncidentWave {
    pub fn new(wavelength: f64, theta: f64, phi: f64, psi: f64) -> Result<Self, StackError> {
        if !wavelength.is_finite() || wavelength <= 0.0 {
            return Err(StackError::validation(format!(
                "wavelength must be positive and finite, got {wavelength}"
            )));
        }
        if !(0.0..PI).contains(&theta) {
            return Err(StackError::validation(format!(
                "theta must lie in [0, π), got {theta}"
            )));
        }
        if !phi.is_finite() || !psi.is_finite() {
            return Err(StackError::validation(format!(
                "phi and psi must be finite, got {phi} and {psi}"
            )));
        }
        Ok(Self {
            wavelength,
            theta,
            phi,
            psi,
        })
    }

    /// Normal incidence with `psi = 0`.
    pub fn normal(wavelength: f64) -> Result<Self, StackError> {
        Self::new(wavelength, 0.0, 0.0, 0.0)
    }

    pub fn with_wavelength(&self, wavelength: f64) -> Result<Self, StackError> {
        Self::new(wavelength, self.theta, self.phi, self.psi)
    }

    pub fn with_theta(&self, theta: f64) -> Result<Self, StackError> {
        Self::new(self.wavelength, theta, self.phi, self.psi)
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn psi(&self) -> f64 {
        self.psi
    }

    /// Free-space wavenumber `2π / λ`.
    pub fn k0(&self) -> f64 {
        2.0 * PI / self.wavelength
    }

    /// Tangential electric field `(Ex0, Ey0)` of the incident wave.
    pub fn tangential_field(&self) -> Vector2<f64> {
        let ct = self.theta.cos();
        let (sp, cp) = self.phi.sin_cos();
        let (ss, cs) = self.psi.sin_cos();
        Vector2::new(cs * ct * cp - ss * sp, cs * ct * sp + ss * cp)
    }

    /// Unit electric field vector `(Ex0, Ey0, Ez0)` of the incident wave.
    ///
    /// The wave always travels toward `+z`, with wavevector direction
    /// `(sinθ cosφ, sinθ sinφ, |cosθ|)`, and `Ez0` keeps E transverse to it.
    /// For `theta` in `(π/2, π)` this is the wave incident at `π - theta`
    /// with polarization angle `π - psi`.
    pub fn polarization(&self) -> Vector3<f64> {
        let tangential = self.tangential_field();
        let ez = -self.psi.cos() * self.theta.sin() * self.theta.cos().signum();
        Vector3::new(tangential.x, tangential.y, ez)
    }
}

impl fmt::Display for IncidentWave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incident wave:
  - Wavelength: {:.6}
  - Theta:      {:.4}°
  - Phi:        {:.4}°
  - Psi:        {:.4}°",
            self.wavelength,
            self.theta.to_degrees(),
            self.phi.to_degrees(),
            self.psi.to_degrees()
        )
    }
}
