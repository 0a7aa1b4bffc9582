/// Relative size of Im(γ) below which a mode is classified by its Poynting flux instead of its decay.
pub const DECAY_TOLERANCE: f64 = 1e-10;
/// Relative separation below which two normal wavevectors of the same direction are treated as degenerate.
pub const DEGENERACY_TOLERANCE: f64 = 1e-9;
/// Normalized normal wavevector magnitude below which a mode is considered grazing (γ ≈ 0).
pub const GRAZING_THRESHOLD: f64 = 1e-9;
/// Below this |κd| the absorption integral is evaluated from its Taylor series.
pub const SMALL_PHASE: f64 = 1e-6;
/// Relative deviation of a tensor from its scalar diagonal below which it is treated as isotropic.
pub const ISOTROPY_THRESHOLD: f64 = 1e-14;
/// Imaginary part of the superstrate ε·μ allowed before it counts as absorbing.
pub const LOSSLESS_THRESHOLD: f64 = 1e-12;
/// Default tolerance on |1 - R - T - ΣQ|.
pub const DEFAULT_BALANCE_TOLERANCE: f64 = 1e-6;
/// Convergence threshold for the Schur and SVD iterations.
pub const EIGEN_EPSILON: f64 = 1e-15;
/// Iteration cap for the Schur and SVD iterations. Zero means no cap.
pub const EIGEN_MAX_ITERATIONS: usize = 10_000;
/// Largest real exponent evaluated directly; larger growth is combined with its amplitude in log space.
pub const EXP_LIMIT: f64 = 700.0;
/// Relative mismatch of the tangential fields at an interface above which a solution is rejected.
pub const CONTINUITY_TOLERANCE: f64 = 1e-8;
