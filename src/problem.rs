use log::warn;

use crate::config::DEFAULT_BALANCE_TOLERANCE;
use crate::error::StackError;
use crate::powers::Powers;
use crate::result::Results;
use crate::solver;
use crate::stack::Stack;
use crate::wave::IncidentWave;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::LayerSpec;
    use approx::assert_relative_eq;
    use nalgebra::Complex;

    fn film() -> Stack {
        Stack::new(vec![
            LayerSpec::semi_infinite("air", 1.0, 1.0),
            LayerSpec::slab("film", Complex::new(2.0, -0.1), 1.0, 0.4),
            LayerSpec::semi_infinite("glass", 2.25, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn te_slab() {
        let wave = IncidentWave::new(1.0, 0.3, 0.0, std::f64::consts::FRAC_PI_2).unwrap();
        let results = Problem::new(film(), wave).solve().unwrap();
        assert_relative_eq!(results.powers.reflectance, 0.04400729510279662, epsilon = 1e-10);
        assert_relative_eq!(results.powers.transmittance, 0.7977631237438736, epsilon = 1e-10);
        assert_relative_eq!(results.powers.absorption[1], 0.15822958115332988, epsilon = 1e-10);
        assert!(results.inconsistency.is_none());
        assert!(results.check().is_ok());
    }

    #[test]
    fn inconsistency_is_reported_not_thrown() {
        let wave = IncidentWave::new(1.0, 0.3, 0.0, 0.0).unwrap();
        // no real solve can meet a negative tolerance
        let results = Problem::new(film(), wave)
            .with_tolerance(-1.0)
            .solve()
            .unwrap();
        assert!(matches!(
            results.inconsistency,
            Some(StackError::PhysicalInconsistency { .. })
        ));
        assert!(results.check().is_err());
    }

    #[test]
    fn solving_twice_gives_identical_results() {
        let wave = IncidentWave::new(0.8, 0.5, 1.1, 0.2).unwrap();
        let problem = Problem::new(film(), wave);
        assert_eq!(problem.solve().unwrap(), problem.solve().unwrap());
    }
}

/// An immutable stack and incident wave, solved on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub stack: Stack,
    pub wave: IncidentWave,
    pub tolerance: f64, // allowed energy-balance residual
}

impl Problem {
    pub fn new(stack: Stack, wave: IncidentWave) -> Self {
        Self {
            stack,
            wave,
            tolerance: DEFAULT_BALANCE_TOLERANCE,
        }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    /// The same stack illuminated by `wave`.
    pub fn with_wave(&self, wave: IncidentWave) -> Self {
        Self {
            wave,
            ..self.clone()
        }
    }

    /// Solves the stack and evaluates its power balance.
    ///
    /// Validation and numerical failures are returned as errors. An energy
    /// balance outside the tolerance is logged and recorded in
    /// [`Results::inconsistency`] instead.
    pub fn solve(&self) -> Result<Results, StackError> {
        let solution = solver::solve(&self.stack, &self.wave)?;
        let powers = Powers::evaluate(&self.stack, &solution)?;
        let residual = powers.residual();
        let inconsistency = powers.check(self.tolerance).err();
        if let Some(err) = &inconsistency {
            warn!("{} for {:?}", err, self.wave);
        }
        Ok(Results {
            solution,
            powers,
            residual,
            inconsistency,
        })
    }
}
