//! Field reconstruction inside a solved stack.
//!
//! This module expands solved mode amplitudes into electromagnetic fields:
//! - [`FieldReconstructor`] evaluates the full vector fields `(E, H̃)` at any
//!   point, either whole or split into forward and backward parts
//! - [`ScalarProfile`] is the 2-D reduction for TE or TM incidence, carrying
//!   only the out-of-plane component `Ey` or `H̃y`
//! - [`Sampling`] describes a straight sampling path; sampling a path yields a
//!   lazy, finite iterator that can be restarted by sampling again
//!
//! Fields are e^{-iωt} phasors of the unit-amplitude incident wave. `H̃` is
//! `Z0 H`, so `E` and `H̃` share units.

use std::ops::Add;

use nalgebra::{Complex, Point3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::StackError;
use crate::modes::ModeKind;
use crate::solver::Solution;
use crate::stack::Stack;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver;
    use crate::stack::LayerSpec;
    use crate::wave::IncidentWave;
    use approx::assert_relative_eq;

    fn slab_stack() -> Stack {
        Stack::new(vec![
            LayerSpec::semi_infinite("air", 1.0, 1.0),
            LayerSpec::slab("film", Complex::new(2.0, -0.1), 1.0, 0.4),
            LayerSpec::slab("spacer", 3.0, 1.0, 0.25),
            LayerSpec::semi_infinite("glass", 2.25, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn tangential_fields_are_continuous_at_interfaces() {
        let stack = slab_stack();
        let wave = IncidentWave::new(1.0, 0.4, 0.6, 0.2).unwrap();
        let solution = solver::solve(&stack, &wave).unwrap();
        let fields = FieldReconstructor::new(&solution, &stack).unwrap();
        for z in [0.0, 0.4, 0.65] {
            let above = fields.field_at(&Point3::new(0.3, -0.2, z - 1e-12));
            let below = fields.field_at(&Point3::new(0.3, -0.2, z));
            for k in 0..2 {
                assert!((above.e[k] - below.e[k]).norm() < 1e-9, "E at z = {z}");
                assert!((above.h[k] - below.h[k]).norm() < 1e-9, "H at z = {z}");
            }
        }
    }

    #[test]
    fn incident_field_above_the_stack() {
        // single lossless interface at normal incidence: E = e^{ikz} + r e^{-ikz}
        let stack = Stack::new(vec![
            LayerSpec::semi_infinite("air", 1.0, 1.0),
            LayerSpec::semi_infinite("glass", 2.25, 1.0),
        ])
        .unwrap();
        let wave = IncidentWave::normal(1.0).unwrap();
        let solution = solver::solve(&stack, &wave).unwrap();
        let fields = FieldReconstructor::new(&solution, &stack).unwrap();
        let z = -0.3;
        let k = wave.k0();
        let expected = Complex::new(0.0, k * z).exp() - 0.2 * Complex::new(0.0, -k * z).exp();
        let e = fields.field_at(&Point3::new(0.0, 0.0, z)).e;
        assert_relative_eq!(e.x.re, expected.re, epsilon = 1e-12);
        assert_relative_eq!(e.x.im, expected.im, epsilon = 1e-12);
        let (forward, backward) = fields.split_at(&Point3::new(0.0, 0.0, z));
        assert_relative_eq!(forward.e.x.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(backward.e.x.norm(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn flux_matches_reflectance_and_transmittance() {
        let stack = slab_stack();
        let wave = IncidentWave::new(1.0, 0.4, 0.6, 0.2).unwrap();
        let solution = solver::solve(&stack, &wave).unwrap();
        let powers = crate::powers::Powers::evaluate(&stack, &solution).unwrap();
        let fields = FieldReconstructor::new(&solution, &stack).unwrap();
        assert_relative_eq!(fields.flux_at(-0.7), 1.0 - powers.reflectance, epsilon = 1e-10);
        assert_relative_eq!(fields.flux_at(2.0), powers.transmittance, epsilon = 1e-10);
        // the flux drop across the absorbing film is its absorption
        let drop = fields.flux_at(0.0) - fields.flux_at(0.4);
        assert_relative_eq!(drop, powers.absorption[1], epsilon = 1e-10);
    }

    #[test]
    fn thick_metal_fields_stay_finite() {
        let stack = Stack::new(vec![
            LayerSpec::semi_infinite("air", 1.0, 1.0),
            LayerSpec::slab("metal", Complex::new(-10.0, -1.0), 1.0, 5.0),
            LayerSpec::semi_infinite("glass", 2.25, 1.0),
        ])
        .unwrap();
        let wave = IncidentWave::new(1.0, 0.3, 0.0, 0.0).unwrap();
        let solution = solver::solve(&stack, &wave).unwrap();
        let powers = crate::powers::Powers::evaluate(&stack, &solution).unwrap();
        let fields = FieldReconstructor::new(&solution, &stack).unwrap();
        for (point, field) in fields.sample(&Sampling::along_z(-0.5, 6.0, 66).unwrap()) {
            assert!(field.intensity().is_finite(), "|E|² at {point}");
        }
        assert_relative_eq!(fields.flux_at(0.0), 1.0 - powers.reflectance, epsilon = 1e-10);
        assert_relative_eq!(fields.flux_at(0.0) - fields.flux_at(5.0), powers.absorption[1], epsilon = 1e-10);
        assert!(fields.flux_at(5.0).abs() < 1e-30);
    }

    #[test]
    fn sampling_is_finite_and_restartable() {
        let stack = slab_stack();
        let wave = IncidentWave::new(1.0, 0.2, 0.0, 0.0).unwrap();
        let solution = solver::solve(&stack, &wave).unwrap();
        let fields = FieldReconstructor::new(&solution, &stack).unwrap();
        let path = Sampling::along_z(-0.5, 1.0, 31).unwrap();
        let samples = fields.sample(&path);
        assert_eq!(samples.len(), 31);
        let first: Vec<_> = samples.clone().collect();
        let second: Vec<_> = fields.sample(&path).collect();
        assert_eq!(first, second);
        assert_eq!(first[0].0, Point3::new(0.0, 0.0, -0.5));
        assert_relative_eq!(first[30].0.z, 1.0);
        assert_eq!(samples.skip(29).len(), 2);
    }

    #[test]
    fn sampling_rejects_non_finite_points() {
        assert!(Sampling::along_z(0.0, f64::NAN, 3).is_err());
        assert_eq!(Sampling::along_z(0.0, 1.0, 1).unwrap().point(0).z, 0.0);
        assert_eq!(Sampling::along_z(0.0, 1.0, 0).unwrap().len(), 0);
    }

    #[test]
    fn scalar_profiles_match_full_fields() {
        let stack = slab_stack();
        for (psi, polarization) in [
            (std::f64::consts::FRAC_PI_2, Polarization::Te),
            (0.0, Polarization::Tm),
        ] {
            let wave = IncidentWave::new(1.0, 0.3, 0.0, psi).unwrap();
            let solution = solver::solve(&stack, &wave).unwrap();
            let fields = FieldReconstructor::new(&solution, &stack).unwrap();
            let profile = ScalarProfile::new(&solution, &stack, polarization).unwrap();
            let path = Sampling::new(Point3::new(0.2, 0.0, -0.3), Point3::new(0.2, 0.0, 1.2), 16).unwrap();
            for ((point, value), (_, full)) in profile.sample(&path).zip(fields.sample(&path)) {
                let expected = match polarization {
                    Polarization::Te => full.e.y,
                    Polarization::Tm => full.h.y,
                };
                assert!((value - expected).norm() < 1e-12, "{polarization:?} at {point}");
            }
        }
    }

    #[test]
    fn scalar_profile_requires_plane_of_incidence() {
        let stack = slab_stack();
        let wave = IncidentWave::new(1.0, 0.3, 0.5, 0.0).unwrap();
        let solution = solver::solve(&stack, &wave).unwrap();
        assert!(matches!(
            ScalarProfile::new(&solution, &stack, Polarization::Te),
            Err(StackError::Validation(_))
        ));
    }
}

/// Complex electric and normalized magnetic field vectors at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldVector {
    pub e: Vector3<Complex<f64>>,
    pub h: Vector3<Complex<f64>>,
}

impl Add for FieldVector {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            e: self.e + other.e,
            h: self.h + other.h,
        }
    }
}

impl FieldVector {
    /// Electric intensity `|E|²`.
    pub fn intensity(&self) -> f64 {
        self.e.norm_squared()
    }

    /// Time-averaged Poynting vector `½ Re(E × H̃*)`.
    pub fn poynting(&self) -> Vector3<f64> {
        self.e.cross(&self.h.conjugate()).map(|z| 0.5 * z.re)
    }
}

/// Evaluates the full vector field of a solution anywhere in its stack.
#[derive(Debug, Clone, Copy)]
pub struct FieldReconstructor<'a> {
    solution: &'a Solution,
    stack: &'a Stack,
    incident: f64,
}

impl<'a> FieldReconstructor<'a> {
    pub fn new(solution: &'a Solution, stack: &'a Stack) -> Result<Self, StackError> {
        if solution.modes.len() != stack.len() {
            return Err(StackError::validation(format!(
                "solution has {} layers but the stack has {}",
                solution.modes.len(),
                stack.len()
            )));
        }
        Ok(Self {
            solution,
            stack,
            incident: solution.incident_flux(),
        })
    }

    /// Total field at `point`.
    pub fn field_at(&self, point: &Point3<f64>) -> FieldVector {
        let (forward, backward) = self.split_at(point);
        forward + backward
    }

    /// Forward- and backward-travelling parts of the field at `point`.
    pub fn split_at(&self, point: &Point3<f64>) -> (FieldVector, FieldVector) {
        let (layer, zeta) = self.stack.locate(point.z);
        let modes = &self.solution.modes[layer];
        let c = self.mode_coefficients(layer, point.x, point.y, zeta);
        let zero = Complex::from(0.0);
        let part = |coefficients: Vector4<Complex<f64>>| {
            let (e, h) = modes.expand(&(modes.pi * coefficients));
            FieldVector { e, h }
        };
        (
            part(Vector4::new(c[0], c[1], zero, zero)),
            part(Vector4::new(zero, zero, c[2], c[3])),
        )
    }

    /// Poynting flux through the plane `z`, as a fraction of the incident flux.
    pub fn flux_at(&self, z: f64) -> f64 {
        self.field_at(&Point3::new(0.0, 0.0, z)).poynting().z / self.incident
    }

    /// Lazily evaluates the field along `path`.
    pub fn sample(&self, path: &Sampling) -> Samples<'a> {
        Samples {
            fields: *self,
            path: *path,
            next: 0,
            end: path.count,
        }
    }

    /// Mode amplitudes of `layer` carried to local coordinate `zeta` and to
    /// the lateral position `(x, y)`.
    fn mode_coefficients(&self, layer: usize, x: f64, y: f64, zeta: f64) -> Vector4<Complex<f64>> {
        let constants = &self.solution.constants;
        let lateral = Complex::new(0.0, constants.alpha * x + constants.beta * y).exp();
        self.solution.modes[layer].carry(self.solution.amplitudes.layer(layer), constants.k0, zeta) * lateral
    }
}

/// A straight path from `start` to `end` sampled at `count` evenly spaced
/// points, both ends included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    pub count: usize,
}

impl Sampling {
    pub fn new(start: Point3<f64>, end: Point3<f64>, count: usize) -> Result<Self, StackError> {
        if start.iter().chain(end.iter()).any(|v| !v.is_finite()) {
            return Err(StackError::validation(format!(
                "sampling path from {start} to {end} is not finite"
            )));
        }
        Ok(Self { start, end, count })
    }

    /// A path along the stack normal at `x = y = 0`.
    pub fn along_z(start: f64, end: f64, count: usize) -> Result<Self, StackError> {
        Self::new(Point3::new(0.0, 0.0, start), Point3::new(0.0, 0.0, end), count)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn point(&self, index: usize) -> Point3<f64> {
        if self.count < 2 {
            return self.start;
        }
        let t = index as f64 / (self.count - 1) as f64;
        self.start + (self.end - self.start) * t
    }
}

/// Iterator over `(point, field)` pairs along a [`Sampling`] path.
#[derive(Debug, Clone)]
pub struct Samples<'a> {
    fields: FieldReconstructor<'a>,
    path: Sampling,
    next: usize,
    end: usize,
}

impl Iterator for Samples<'_> {
    type Item = (Point3<f64>, FieldVector);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let point = self.path.point(self.next);
        self.next += 1;
        Some((point, self.fields.field_at(&point)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Samples<'_> {}

/// Polarization of a 2-D problem with the plane of incidence `xz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarization {
    /// E along `y`; the profile is `Ey`.
    Te,
    /// H along `y`; the profile is `H̃y`.
    Tm,
}

impl Polarization {
    /// Forward and backward mode carrying this polarization, and the row of Π
    /// holding the out-of-plane component.
    fn modes(self) -> (usize, usize, usize) {
        match self {
            Polarization::Te => (1, 3, 1),
            Polarization::Tm => (0, 2, 3),
        }
    }
}

/// The out-of-plane field component of a TE or TM solution.
///
/// Requires the plane of incidence to be `xz` (`β₀ = 0`) and every layer to
/// be isotropic, so that the two polarizations decouple. Only the two modes
/// of the chosen polarization contribute.
#[derive(Debug, Clone, Copy)]
pub struct ScalarProfile<'a> {
    solution: &'a Solution,
    stack: &'a Stack,
    polarization: Polarization,
}

impl<'a> ScalarProfile<'a> {
    pub fn new(
        solution: &'a Solution,
        stack: &'a Stack,
        polarization: Polarization,
    ) -> Result<Self, StackError> {
        if solution.modes.len() != stack.len() {
            return Err(StackError::validation("solution does not belong to this stack"));
        }
        let constants = &solution.constants;
        if constants.beta.abs() > 1e-12 * constants.k0 {
            return Err(StackError::validation(
                "2-D profiles need the plane of incidence to be xz (phi = 0 or π)",
            ));
        }
        if let Some(index) = solution
            .modes
            .iter()
            .position(|m| m.kind != ModeKind::Isotropic)
        {
            return Err(StackError::validation(format!(
                "2-D profiles need isotropic layers, but layer '{}' is anisotropic",
                stack.layers()[index].name
            )));
        }
        Ok(Self {
            solution,
            stack,
            polarization,
        })
    }

    pub fn polarization(&self) -> Polarization {
        self.polarization
    }

    /// Forward and backward amplitudes of the out-of-plane component at the
    /// reference plane of `layer`.
    pub fn amplitudes(&self, layer: usize) -> (Complex<f64>, Complex<f64>) {
        let (forward, backward, row) = self.polarization.modes();
        let pi = &self.solution.modes[layer].pi;
        let a = self.solution.amplitudes.layer(layer);
        (pi[(row, forward)] * a[forward], pi[(row, backward)] * a[backward])
    }

    /// Out-of-plane component at `(x, z)`.
    pub fn value_at(&self, x: f64, z: f64) -> Complex<f64> {
        let (layer, zeta) = self.stack.locate(z);
        let (forward, backward, row) = self.polarization.modes();
        let constants = &self.solution.constants;
        let modes = &self.solution.modes[layer];
        let c = modes.carry(self.solution.amplitudes.layer(layer), constants.k0, zeta);
        (modes.pi[(row, forward)] * c[forward] + modes.pi[(row, backward)] * c[backward])
            * Complex::new(0.0, constants.alpha * x).exp()
    }

    /// Lazily evaluates the profile along `path`; `y` coordinates are ignored.
    pub fn sample(&self, path: &Sampling) -> impl ExactSizeIterator<Item = (Point3<f64>, Complex<f64>)> + Clone + 'a {
        let profile = *self;
        let path = *path;
        (0..path.count).map(move |index| {
            let point = path.point(index);
            (point, profile.value_at(point.x, point.z))
        })
    }
}
