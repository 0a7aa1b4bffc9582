//! Error taxonomy for stack evaluation.
//!
//! - [`StackError::Validation`]: malformed input, raised before any solve.
//! - [`StackError::Numerical`]: the boundary-matching system could not be
//!   solved reliably for this input. Only the current evaluation is aborted.
//! - [`StackError::PhysicalInconsistency`]: the energy balance is violated
//!   beyond tolerance. It is reported alongside a result rather than thrown, so
//!   sweep callers can flag outliers and keep going.

use thiserror::Error;


/// Errors produced while building or solving a layered stack.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StackError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error(
        "Energy balance residual {residual:.3e} exceeds tolerance {tolerance:.1e} (R = {reflectance:.6}, T = {transmittance:.6}, A = {:.6})",
        .absorption.iter().sum::<f64>()
    )]
    PhysicalInconsistency {
        reflectance: f64,
        transmittance: f64,
        absorption: Vec<f64>,
        residual: f64,
        tolerance: f64,
    },
}

impl StackError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        StackError::Validation(msg.into())
    }

    pub(crate) fn numerical(msg: impl Into<String>) -> Self {
        StackError::Numerical(msg.into())
    }

    /// True for errors that are reported rather than fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StackError::PhysicalInconsistency { .. })
    }
}
