pub mod angle;
pub mod dist_add;
pub mod dist_mul;

pub use angle::Angle;
pub use dist_add::DistAdd;
pub use dist_mul::DistMul;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use geometer_common::prelude::{Coeff, Rational, Real};

#[must_use]
pub fn ratio_to_coeff(r: Rational) -> Coeff
{
    Coeff::new(BigInt::from(*r.numer()), BigInt::from(*r.denom()))
}

/// Back-conversion to a small rational; `None` when the coefficient has
/// outgrown 64 bits.
#[must_use]
pub fn coeff_to_ratio(c: &Coeff) -> Option<Rational>
{
    Some(Rational::new(c.numer().to_i64()?, c.denom().to_i64()?))
}

#[must_use]
pub fn coeff_to_real(c: &Coeff) -> Real
{
    c.to_f64().unwrap_or(Real::NAN)
}
