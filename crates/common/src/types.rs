use num_complex::Complex;

pub type Real = f64;
pub type Cplx = Complex<Real>;

/// Integer backing for small exact rationals (parsed constants, scale factors).
pub type RatNum = i64;
pub type Rational = num_rational::Ratio<RatNum>;

/// Coefficient type of the elimination cores. Arbitrary precision: repeated
/// row substitution must never overflow or round.
pub type Coeff = num::BigRational;
