//! Transfer-matrix optics of planar multilayers.
//!
//! `strata` computes how a monochromatic plane wave is reflected, transmitted
//! and absorbed by a stack of homogeneous layers, and reconstructs the fields
//! inside the stack. Layers may be anisotropic and lossy in both their
//! permittivity and permeability tensors.
//!
//! - [`stack`] and [`material`] describe the layered medium
//! - [`wave`] describes the incident plane wave
//! - [`solver`] matches boundary conditions across the stack, using the layer
//!   eigenmodes from [`modes`]
//! - [`field`] evaluates fields anywhere in a solved stack
//! - [`powers`] evaluates reflectance, transmittance and per-layer absorption
//! - [`problem`] bundles a stack and a wave and solves them into [`result::Results`]
//!
//! The application layer adds configuration loading ([`settings`]),
//! parallel parameter sweeps ([`sweep`]) and file output ([`output`]).
//!
//! ```no_run
//! use strata::problem::Problem;
//! use strata::stack::{LayerSpec, Stack};
//! use strata::wave::IncidentWave;
//!
//! let stack = Stack::new(vec![
//!     LayerSpec::semi_infinite("air", 1.0, 1.0),
//!     LayerSpec::slab("film", 2.1, 1.0, 0.35),
//!     LayerSpec::semi_infinite("glass", 2.25, 1.0),
//! ])?;
//! let results = Problem::new(stack, IncidentWave::normal(0.6)?).solve()?;
//! println!("R = {:.4}", results.powers.reflectance);
//! # Ok::<(), strata::error::StackError>(())
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod fresnel;
pub mod material;
pub mod modes;
pub mod output;
pub mod powers;
pub mod problem;
pub mod result;
pub mod settings;
pub mod snell;
pub mod solver;
pub mod stack;
pub mod sweep;
pub mod wave;
