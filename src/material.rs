//! Permittivity and permeability of a homogeneous layer.
//!
//! Values are given in the engineering sign convention (time dependence
//! e^{+jωt}), in which a passive absorbing medium has a negative imaginary
//! part, e.g. `2.3 - 0.2j`. The solver works with e^{-iωt} phasors, so
//! [`Material::phasor`] returns the complex conjugate of the stored values.

use nalgebra::{Complex, Matrix3, Rotation3};

use crate::config::{ISOTROPY_THRESHOLD, LOSSLESS_THRESHOLD};
use crate::error::StackError;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rows_of_one_is_isotropic() {
        let m = Material::from_rows(&[vec![Complex::new(2.0, -0.1)]]).unwrap();
        assert_eq!(m, Material::Isotropic(Complex::new(2.0, -0.1)));
    }

    #[test]
    fn rows_of_wrong_shape_are_rejected() {
        let rows = vec![vec![Complex::from(1.0); 2]; 2];
        assert!(matches!(
            Material::from_rows(&rows),
            Err(StackError::Validation(_))
        ));
        let ragged = vec![
            vec![Complex::from(1.0); 3],
            vec![Complex::from(1.0); 2],
            vec![Complex::from(1.0); 3],
        ];
        assert!(Material::from_rows(&ragged).is_err());
        assert!(Material::from_rows(&[]).is_err());
    }

    #[test]
    fn scalar_tensor_counts_as_isotropic() {
        let m = Material::Anisotropic(Matrix3::from_diagonal_element(Complex::new(3.0, -0.2)));
        assert!(m.is_isotropic());
        assert_eq!(m.scalar(), Some(Complex::new(3.0, -0.2)));

        let mut t = Matrix3::from_diagonal_element(Complex::from(3.0));
        t[(0, 1)] = Complex::from(0.1);
        assert!(!Material::Anisotropic(t).is_isotropic());
    }

    #[test]
    fn passive_loss_is_positive() {
        let m = Material::isotropic(Complex::new(2.3, -0.2));
        let loss = m.loss();
        assert_relative_eq!(loss[(0, 0)].re, 0.2, epsilon = 1e-15);
        assert_relative_eq!(loss[(0, 0)].im, 0.0, epsilon = 1e-15);
        assert!(!m.is_lossless());
        assert!(Material::isotropic(3.5).is_lossless());
    }

    #[test]
    fn rotation_keeps_scalars_and_moves_axes() {
        let rot = Rotation3::from_axis_angle(&nalgebra::Vector3::z_axis(), 0.4);
        let iso = Material::isotropic(2.0);
        assert_eq!(iso.rotated(&rot), iso);

        let uni = Material::tensor(Matrix3::from_diagonal(&nalgebra::Vector3::new(
            Complex::from(2.0),
            Complex::from(3.0),
            Complex::from(4.0),
        )));
        let turned = uni.rotated(&rot).matrix();
        // trace and zz entry are invariant under rotations about z
        assert_relative_eq!(turned.trace().re, 9.0, epsilon = 1e-12);
        assert_relative_eq!(turned[(2, 2)].re, 4.0, epsilon = 1e-12);
        assert!(turned[(0, 1)].norm() > 0.1);
    }
}

/// A scalar or 3x3 complex material response (relative ε or μ).
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Isotropic(Complex<f64>),
    Anisotropic(Matrix3<Complex<f64>>),
}

impl From<f64> for Material {
    fn from(value: f64) -> Self {
        Material::Isotropic(Complex::from(value))
    }
}

impl From<Complex<f64>> for Material {
    fn from(value: Complex<f64>) -> Self {
        Material::Isotropic(value)
    }
}

impl From<Matrix3<Complex<f64>>> for Material {
    fn from(value: Matrix3<Complex<f64>>) -> Self {
        Material::Anisotropic(value)
    }
}

impl Material {
    pub fn isotropic(value: impl Into<Complex<f64>>) -> Self {
        Material::Isotropic(value.into())
    }

    pub fn tensor(value: Matrix3<Complex<f64>>) -> Self {
        Material::Anisotropic(value)
    }

    /// Builds a material from nested rows, as read from a configuration file.
    /// A 1x1 array is a scalar; anything other than 1x1 or 3x3 is rejected.
    pub fn from_rows(rows: &[Vec<Complex<f64>>]) -> Result<Self, StackError> {
        match rows {
            [row] if row.len() == 1 => Ok(Material::Isotropic(row[0])),
            [a, b, c] if a.len() == 3 && b.len() == 3 && c.len() == 3 => {
                Ok(Material::Anisotropic(Matrix3::from_fn(|i, j| rows[i][j])))
            }
            _ => Err(StackError::validation(format!(
                "material must be a scalar or a 3x3 tensor, got {} row(s) of lengths {:?}",
                rows.len(),
                rows.iter().map(Vec::len).collect::<Vec<_>>()
            ))),
        }
    }

    /// The full 3x3 tensor in the input sign convention.
    pub fn matrix(&self) -> Matrix3<Complex<f64>> {
        match self {
            Material::Isotropic(value) => Matrix3::from_diagonal_element(*value),
            Material::Anisotropic(tensor) => *tensor,
        }
    }

    /// The scalar value if the response is isotropic, including tensors equal
    /// to a multiple of the identity.
    pub fn scalar(&self) -> Option<Complex<f64>> {
        match self {
            Material::Isotropic(value) => Some(*value),
            Material::Anisotropic(tensor) => {
                let diag = tensor[(0, 0)];
                let offset = tensor - Matrix3::from_diagonal_element(diag);
                (offset.norm() <= ISOTROPY_THRESHOLD * (1.0 + diag.norm())).then_some(diag)
            }
        }
    }

    pub fn is_isotropic(&self) -> bool {
        self.scalar().is_some()
    }

    pub fn is_finite(&self) -> bool {
        self.matrix()
            .iter()
            .all(|z| z.re.is_finite() && z.im.is_finite())
    }

    /// The tensor in the e^{-iωt} phasor convention used by the solver.
    pub fn phasor(&self) -> Matrix3<Complex<f64>> {
        self.matrix().map(|z| z.conj())
    }

    /// Anti-Hermitian part `(m - m^H) / 2i` of the phasor tensor.
    ///
    /// Hermitian and positive semi-definite for passive media. For a scalar
    /// `ε' - jε''` it is `ε''` times the identity.
    pub fn loss(&self) -> Matrix3<Complex<f64>> {
        let m = self.phasor();
        (m - m.adjoint()) / Complex::new(0.0, 2.0)
    }

    pub fn is_lossless(&self) -> bool {
        self.loss().norm() <= LOSSLESS_THRESHOLD * (1.0 + self.matrix().norm())
    }

    /// The same medium seen in a frame rotated by `rotation`, i.e. `R m Rᵀ`.
    pub fn rotated(&self, rotation: &Rotation3<f64>) -> Self {
        match self {
            Material::Isotropic(_) => self.clone(),
            Material::Anisotropic(tensor) => {
                let r = rotation.matrix().map(|x| Complex::new(x, 0.0));
                Material::Anisotropic(r * tensor * r.transpose())
            }
        }
    }
}
