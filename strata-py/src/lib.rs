use num_complex::Complex64;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use strata::error::StackError;
use strata::field::{FieldReconstructor, Sampling};
use strata::problem::Problem;
use strata::stack::{LayerSpec, Stack};
use strata::wave::IncidentWave;

/// A layer as passed from Python: `(name, epsilon, mu, thickness)`.
type PyLayer = (String, Complex64, Complex64, Option<f64>);

fn to_py_err(err: StackError) -> PyErr {
    match err {
        StackError::Validation(msg) => PyValueError::new_err(msg),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

fn build_problem(
    layers: Vec<PyLayer>,
    wavelength: f64,
    theta: f64,
    phi: f64,
    psi: f64,
) -> Result<Problem, StackError> {
    let layers = layers
        .into_iter()
        .map(|(name, epsilon, mu, thickness)| LayerSpec {
            name,
            epsilon: epsilon.into(),
            mu: mu.into(),
            thickness,
        })
        .collect();
    let stack = Stack::new(layers)?;
    let wave = IncidentWave::new(wavelength, theta, phi, psi)?;
    Ok(Problem::new(stack, wave))
}

/// Solve a stack of isotropic layers for a plane wave. Angles are in radians.
///
/// Returns `(R, T, absorption per layer, residual)`.
#[pyfunction]
#[pyo3(signature = (layers, wavelength, theta = 0.0, phi = 0.0, psi = 0.0))]
fn solve_stack(
    layers: Vec<PyLayer>,
    wavelength: f64,
    theta: f64,
    phi: f64,
    psi: f64,
) -> PyResult<(f64, f64, Vec<f64>, f64)> {
    let problem = build_problem(layers, wavelength, theta, phi, psi).map_err(to_py_err)?;
    let results = problem.solve().map_err(to_py_err)?;
    let powers = results.powers;
    Ok((
        powers.reflectance,
        powers.transmittance,
        powers.absorption,
        results.residual,
    ))
}

/// Sample `|E|²` along the stack normal from `start` to `end`.
///
/// Returns a list of `(z, |E|²)` pairs.
#[pyfunction]
#[pyo3(signature = (layers, wavelength, start, end, count, theta = 0.0, phi = 0.0, psi = 0.0))]
#[allow(clippy::too_many_arguments)]
fn field_profile(
    layers: Vec<PyLayer>,
    wavelength: f64,
    start: f64,
    end: f64,
    count: usize,
    theta: f64,
    phi: f64,
    psi: f64,
) -> PyResult<Vec<(f64, f64)>> {
    let problem = build_problem(layers, wavelength, theta, phi, psi).map_err(to_py_err)?;
    let results = problem.solve().map_err(to_py_err)?;
    let fields = FieldReconstructor::new(&results.solution, &problem.stack).map_err(to_py_err)?;
    let path = Sampling::along_z(start, end, count).map_err(to_py_err)?;
    Ok(fields
        .sample(&path)
        .map(|(point, field)| (point.z, field.intensity()))
        .collect())
}

/// Transfer-matrix optics of planar multilayers.
#[pymodule]
fn _strata_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(solve_stack, m)?)?;
    m.add_function(wrap_pyfunction!(field_profile, m)?)?;
    Ok(())
}
