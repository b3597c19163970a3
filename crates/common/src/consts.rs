use crate::types::Real;

/// Numeric tolerance used throughout to decide equality, collinearity, and
/// on-circle membership. Compared against squared magnitudes.
pub const ATOM: Real = 1e-12;

/// Tolerance against first-power magnitudes; keep `ATOM` for squared ones.
pub const ATOM_SQRT: Real = 1e-6;

pub const DISPLAY_PREC: usize = 12;
