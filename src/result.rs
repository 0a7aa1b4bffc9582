use std::fmt;

use nalgebra::Complex;
use serde::Serialize;

use crate::error::StackError;
use crate::powers::Powers;
use crate::solver::{ModeAmplitudes, PropagationConstants, Solution};
use crate::wave::IncidentWave;


/// The outcome of solving one [`Problem`](crate::problem::Problem).
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    pub solution: Solution,
    pub powers: Powers,
    pub residual: f64,                     // |1 - R - T - ΣQ|
    pub inconsistency: Option<StackError>, // set when the residual exceeds the tolerance
}

impl Results {
    pub fn amplitudes(&self) -> &ModeAmplitudes {
        &self.solution.amplitudes
    }

    pub fn constants(&self) -> &PropagationConstants {
        &self.solution.constants
    }

    pub fn wave(&self) -> &IncidentWave {
        &self.solution.wave
    }

    /// Fails with the recorded physical inconsistency, if any.
    pub fn check(&self) -> Result<(), StackError> {
        match &self.inconsistency {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// A flat, serializable view of the results.
    pub fn summary(&self) -> Summary {
        let constants = self.constants();
        let layers = constants
            .gamma
            .iter()
            .zip(self.amplitudes().iter())
            .zip(&self.powers.absorption)
            .map(|((gamma, a), absorption)| LayerSummary {
                gamma: gamma.map(pair),
                forward: [pair(a[0]), pair(a[1])],
                backward: [pair(a[2]), pair(a[3])],
                absorption: *absorption,
            })
            .collect();
        Summary {
            wave: *self.wave(),
            k0: constants.k0,
            alpha: constants.alpha,
            beta: constants.beta,
            reflectance: self.powers.reflectance,
            transmittance: self.powers.transmittance,
            absorption: self.powers.total_absorption(),
            residual: self.residual,
            inconsistency: self.inconsistency.as_ref().map(|err| err.to_string()),
            layers,
        }
    }
}

fn pair(z: Complex<f64>) -> [f64; 2] {
    [z.re, z.im]
}

/// Serializable summary of a [`Results`], complex numbers as `[re, im]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub wave: IncidentWave,
    pub k0: f64,
    pub alpha: f64,
    pub beta: f64,
    pub reflectance: f64,
    pub transmittance: f64,
    pub absorption: f64,
    pub residual: f64,
    pub inconsistency: Option<String>,
    pub layers: Vec<LayerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub gamma: [[f64; 2]; 4],
    pub forward: [[f64; 2]; 2],
    pub backward: [[f64; 2]; 2],
    pub absorption: f64,
}

impl fmt::Display for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.wave())?;
        write!(f, "{}", self.powers)?;
        match &self.inconsistency {
            Some(err) => writeln!(f, "  Warning: {}", err),
            None => Ok(()),
        }
    }
}
