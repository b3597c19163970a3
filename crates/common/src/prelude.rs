pub use crate::consts::{ATOM, ATOM_SQRT};
pub use crate::numerics::{
    collinear, cross, distance, dot, midpoint, normalize, orientation, perp, NumCircle, NumLine,
};
pub use crate::point::{Point, PointId};
pub use crate::types::{Coeff, Cplx, RatNum, Rational, Real};
