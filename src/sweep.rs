//! Parallel parameter sweeps over a single stack.
//!
//! A [`Sweep`] solves one [`Problem`] for a range of wavelengths or incidence
//! angles. Points are independent and evaluated in parallel with rayon; the
//! results come back in input order. A point that fails validation or
//! solving is recorded with its error and the rest of the sweep continues.

use std::fmt;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::StackError;
use crate::problem::Problem;
use crate::result::Results;


/// The quantity varied by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepParameter {
    Wavelength,
    /// Polar incidence angle, in degrees.
    Theta,
}

impl fmt::Display for SweepParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepParameter::Wavelength => write!(f, "wavelength"),
            SweepParameter::Theta => write!(f, "theta"),
        }
    }
}

/// Evenly spaced values of one parameter, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub parameter: SweepParameter,
    pub start: f64,
    pub stop: f64,
    pub count: usize,
}

impl SweepConfig {
    pub fn values(&self) -> Vec<f64> {
        if self.count == 1 {
            return vec![self.start];
        }
        Array1::linspace(self.start, self.stop, self.count).to_vec()
    }
}

/// One evaluated point of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub value: f64,
    pub outcome: Result<Results, StackError>,
}

/// A problem and the range to sweep it over.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub problem: Problem,
    pub config: SweepConfig,
}

impl Sweep {
    pub fn new(problem: Problem, config: SweepConfig) -> Result<Self, StackError> {
        if config.count == 0 {
            return Err(StackError::validation("a sweep needs at least one point"));
        }
        if !config.start.is_finite() || !config.stop.is_finite() {
            return Err(StackError::validation(format!(
                "sweep range {} to {} is not finite",
                config.start, config.stop
            )));
        }
        Ok(Self { problem, config })
    }

    /// Solves every point of the sweep in parallel.
    pub fn run(&self) -> SweepResults {
        let start = Instant::now();
        let values = self.config.values();

        let pb = ProgressBar::new(values.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
        ) {
            pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
        }
        pb.set_message(self.config.parameter.to_string());

        let points: Vec<SweepPoint> = values
            .par_iter()
            .map(|&value| {
                let outcome = self.point(value).and_then(|problem| problem.solve());
                pb.inc(1);
                SweepPoint { value, outcome }
            })
            .collect();
        pb.finish_and_clear();

        let results = SweepResults {
            parameter: self.config.parameter,
            points,
        };
        info!(
            "{} sweep over {} points finished in {:.2?} ({} failed, {} inconsistent)",
            self.config.parameter,
            results.points.len(),
            start.elapsed(),
            results.failures(),
            results.inconsistencies()
        );
        results
    }

    fn point(&self, value: f64) -> Result<Problem, StackError> {
        let wave = match self.config.parameter {
            SweepParameter::Wavelength => self.problem.wave.with_wavelength(value)?,
            SweepParameter::Theta => self.problem.wave.with_theta(value.to_radians())?,
        };
        Ok(self.problem.with_wave(wave))
    }
}

/// Sweep results in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResults {
    pub parameter: SweepParameter,
    pub points: Vec<SweepPoint>,
}

impl SweepResults {
    /// Number of points that failed to solve.
    pub fn failures(&self) -> usize {
        self.points.iter().filter(|p| p.outcome.is_err()).count()
    }

    /// Number of solved points whose energy balance exceeded the tolerance.
    pub fn inconsistencies(&self) -> usize {
        self.points
            .iter()
            .filter_map(|p| p.outcome.as_ref().ok())
            .filter(|results| results.inconsistency.as_ref().is_some_and(StackError::is_recoverable))
            .count()
    }

    /// Table with columns `[parameter, R, T, A, residual]`; failed points
    /// have NaN in every column but the first.
    pub fn to_array(&self) -> Array2<f64> {
        let mut table = Array2::from_elem((self.points.len(), 5), f64::NAN);
        for (mut row, point) in table.outer_iter_mut().zip(&self.points) {
            row[0] = point.value;
            if let Ok(results) = &point.outcome {
                row[1] = results.powers.reflectance;
                row[2] = results.powers.transmittance;
                row[3] = results.powers.total_absorption();
                row[4] = results.residual;
            }
        }
        table
    }
}
