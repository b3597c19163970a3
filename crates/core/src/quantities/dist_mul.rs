use num_traits::ToPrimitive;

use geometer_common::prelude::{Rational, Real};

use super::ratio_to_coeff;
use crate::comb::LinComb;
use crate::var::{factor_rational, Var};

/// A multiplicative distance: a linear combination read in log space, so
/// products and quotients of segment lengths become sums and differences.
/// The identity (ratio one) is the empty combination.
#[derive(Clone, Debug)]
pub struct DistMul
{
    comb: LinComb,
    /// log of the represented ratio; advisory only.
    value: Real,
}

impl DistMul
{
    #[must_use]
    pub const fn new(comb: LinComb, value: Real) -> Self
    {
        Self { comb, value }
    }

    #[must_use]
    pub fn one() -> Self
    {
        Self::new(LinComb::new(), 0.)
    }

    #[must_use]
    pub fn from_var(var: Var, log_value: Real) -> Self
    {
        Self::new(LinComb::singleton(var), log_value)
    }

    /// A constant ratio, expressed through the prime atoms.
    /// `None` for non-positive rationals.
    #[must_use]
    pub fn from_ratio(r: Rational) -> Option<Self>
    {
        let factors = factor_rational(r)?;
        let mut comb = LinComb::new();
        for (var, exp) in factors {
            comb.add_term(var, &ratio_to_coeff(Rational::from_integer(exp)));
        }
        let value = (*r.numer() as Real).ln() - (*r.denom() as Real).ln();
        Some(Self::new(comb, value))
    }

    #[must_use]
    pub const fn comb(&self) -> &LinComb
    {
        &self.comb
    }

    #[must_use]
    pub fn into_comb(self) -> LinComb
    {
        self.comb
    }

    #[must_use]
    pub const fn value(&self) -> Real
    {
        self.value
    }

    #[must_use]
    pub fn is_identity(&self) -> bool
    {
        self.comb.is_empty()
    }

    /// Split off the integer-exponent prime part as a positive rational
    /// coefficient, leaving the remainder. `self = coefficient * remainder`
    /// multiplicatively.
    #[must_use]
    pub fn normalize(&self) -> (Rational, Self)
    {
        let mut coefficient = Rational::from_integer(1);
        let mut rest = self.comb.clone();
        for (var, coeff) in self.comb.iter() {
            let Var::DistMulConst(p) = var else {
                continue;
            };
            if !coeff.is_integer() {
                continue;
            }
            let Some(exp) = coeff.to_integer().to_i64() else {
                continue;
            };
            let Some(pow) = checked_prime_power(*p, exp.unsigned_abs()) else {
                continue;
            };
            if exp.is_negative() {
                coefficient /= pow;
            } else {
                coefficient *= pow;
            }
            rest.remove(*var);
        }
        let log_coeff = (*coefficient.numer() as Real).ln() - (*coefficient.denom() as Real).ln();
        (coefficient, Self::new(rest, self.value - log_coeff))
    }
}

fn checked_prime_power(p: u64, exp: u64) -> Option<Rational>
{
    let exp = u32::try_from(exp).ok()?;
    let base = i64::try_from(p).ok()?;
    base.checked_pow(exp).map(Rational::from_integer)
}

impl std::ops::Mul for DistMul
{
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output
    {
        Self::new(self.comb + rhs.comb, self.value + rhs.value)
    }
}

impl std::ops::Div for DistMul
{
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output
    {
        Self::new(self.comb - rhs.comb, self.value - rhs.value)
    }
}

impl PartialEq for DistMul
{
    fn eq(&self, other: &Self) -> bool
    {
        self.comb == other.comb
    }
}

impl Eq for DistMul {}

impl PartialOrd for DistMul
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering>
    {
        Some(self.cmp(other))
    }
}

impl Ord for DistMul
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering
    {
        self.comb.cmp(&other.comb)
    }
}

impl std::hash::Hash for DistMul
{
    fn hash<H: std::hash::Hasher>(&self, state: &mut H)
    {
        self.comb.hash(state);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use geometer_common::consts::ATOM_SQRT;

    #[test]
    fn ratio_round_trips_through_primes()
    {
        let q = DistMul::from_ratio(Rational::new(12, 5)).unwrap();
        let (k, rest) = q.normalize();
        assert_eq!(k, Rational::new(12, 5));
        assert!(rest.is_identity());
        assert!(rest.value().abs() < ATOM_SQRT);
    }

    #[test]
    fn product_of_inverse_ratios_is_identity()
    {
        let a = DistMul::from_ratio(Rational::new(3, 4)).unwrap();
        let b = DistMul::from_ratio(Rational::new(4, 3)).unwrap();
        assert!((a * b).is_identity());
    }

    #[test]
    fn non_positive_ratios_are_rejected()
    {
        assert!(DistMul::from_ratio(Rational::new(-2, 1)).is_none());
        assert!(DistMul::from_ratio(Rational::new(0, 1)).is_none());
    }

    #[test]
    fn normalize_keeps_unknowns()
    {
        let var = DistMul::from_var(Var::Lhs(0), 1.0);
        let two = DistMul::from_ratio(Rational::from_integer(2)).unwrap();
        let (k, rest) = (var.clone() * two).normalize();
        assert_eq!(k, Rational::from_integer(2));
        assert_eq!(rest, var);
    }
}
